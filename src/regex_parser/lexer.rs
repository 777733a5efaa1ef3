use crate::error::PatternError;

/// Characters that must be escaped to be matched literally.
const OPERATORS: &[char] = &['?', '*', ':', '(', ')', '+', '^', '|', '[', ']', '#'];

pub struct Lexer {
    pattern: Vec<char>,
    current_pos: usize,
    current_token: Option<Token>,
    in_class: bool,
    class_start: bool,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Token {
    Char(char),
    Any,
    Star,
    Plus,
    Question,
    Or,
    Caret,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Embed(String),
    End,
}

impl Token {
    /// Whether an operand may end with this token.
    pub fn ends_operand(&self) -> bool {
        matches!(
            self,
            Token::Char(_)
                | Token::Any
                | Token::Star
                | Token::Plus
                | Token::Question
                | Token::RightParen
                | Token::RightBracket
                | Token::Embed(_)
        )
    }

    /// Whether an operand may start with this token.
    pub fn starts_operand(&self) -> bool {
        matches!(
            self,
            Token::Char(_) | Token::Any | Token::LeftParen | Token::LeftBracket | Token::Embed(_)
        )
    }
}

impl Lexer {
    pub fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.chars().collect(),
            current_pos: 0,
            current_token: None,
            in_class: false,
            class_start: false,
        }
    }

    pub fn next(&mut self) -> Result<Token, PatternError> {
        let token = self.peek()?.clone();
        self.current_token = None;
        Ok(token)
    }

    pub fn peek(&mut self) -> Result<&Token, PatternError> {
        let token = match self.current_token.take() {
            Some(token) => token,
            None => self.get()?,
        };
        Ok(self.current_token.insert(token))
    }

    fn get(&mut self) -> Result<Token, PatternError> {
        if self.in_class {
            let class_start = std::mem::take(&mut self.class_start);
            return self.class_member(class_start);
        }
        match self.char() {
            Some('*') => Ok(Token::Star),
            Some('+') => Ok(Token::Plus),
            Some('?') => Ok(Token::Question),
            Some('|') => Ok(Token::Or),
            Some('(') => Ok(Token::LeftParen),
            Some(')') => Ok(Token::RightParen),
            Some('[') => {
                self.in_class = true;
                self.class_start = true;
                Ok(Token::LeftBracket)
            }
            Some(']') => Err(PatternError::UnopenedClass),
            Some('^') => Err(PatternError::OutsideClass('^')),
            Some(':') => self.embed(),
            Some('.') => Ok(Token::Any),
            Some('\\') => self.escaped(),
            Some(ch) => Ok(Token::Char(ch)),
            None => Ok(Token::End),
        }
    }

    fn class_member(&mut self, class_start: bool) -> Result<Token, PatternError> {
        match self.char() {
            Some(']') => {
                self.in_class = false;
                Ok(Token::RightBracket)
            }
            Some('^') if class_start => Ok(Token::Caret),
            Some('^') => Err(PatternError::MisplacedNegation),
            Some('.') => Ok(Token::Any),
            Some('\\') => self.escaped(),
            Some(ch) if OPERATORS.contains(&ch) && ch != '#' => {
                Err(PatternError::UnescapedInClass(ch))
            }
            Some(ch) => Ok(Token::Char(ch)),
            None => Err(PatternError::UnterminatedClass),
        }
    }

    fn escaped(&mut self) -> Result<Token, PatternError> {
        match self.char() {
            Some('s') => Ok(Token::Char(' ')),
            Some('n') => Ok(Token::Char('\n')),
            Some('r') => Ok(Token::Char('\r')),
            Some('t') => Ok(Token::Char('\t')),
            Some(ch) if ch == '.' || ch == '\\' || OPERATORS.contains(&ch) => Ok(Token::Char(ch)),
            Some(ch) => Err(PatternError::InvalidEscape(ch)),
            None => Err(PatternError::DanglingEscape),
        }
    }

    fn embed(&mut self) -> Result<Token, PatternError> {
        let mut name = String::new();
        loop {
            match self.char() {
                Some(':') => return Ok(Token::Embed(name)),
                Some(ch) => name.push(ch),
                None => return Err(PatternError::UnterminatedEmbed),
            }
        }
    }

    fn char(&mut self) -> Option<char> {
        let ch = self.pattern.get(self.current_pos).copied();
        if ch.is_some() {
            self.current_pos += 1;
        }
        ch
    }
}

#[cfg(test)]
mod test {
    use crate::{
        error::PatternError,
        regex_parser::lexer::{Lexer, Token},
    };

    fn tokens(pattern: &str) -> Result<Vec<Token>, PatternError> {
        let mut lexer = Lexer::new(pattern);
        let mut tokens = vec![];
        loop {
            let token = lexer.next()?;
            if token == Token::End {
                return Ok(tokens);
            }
            tokens.push(token);
        }
    }

    #[test]
    fn main() {
        let mut lexer = Lexer::new("a(bc)");
        assert_eq!(lexer.next().unwrap(), Token::Char('a'));
        assert_eq!(lexer.peek().unwrap(), &Token::LeftParen);
        assert_eq!(lexer.next().unwrap(), Token::LeftParen);
        assert_eq!(lexer.next().unwrap(), Token::Char('b'));
        assert_eq!(lexer.next().unwrap(), Token::Char('c'));
        assert_eq!(lexer.next().unwrap(), Token::RightParen);
        assert_eq!(lexer.next().unwrap(), Token::End);
    }

    #[test]
    fn classes_and_escapes() {
        assert_eq!(
            tokens("[^\\s.]:id:\\*").unwrap(),
            vec![
                Token::LeftBracket,
                Token::Caret,
                Token::Char(' '),
                Token::Any,
                Token::RightBracket,
                Token::Embed("id".to_string()),
                Token::Char('*'),
            ]
        );
    }

    #[test]
    fn errors() {
        assert_eq!(tokens("[a^]"), Err(PatternError::MisplacedNegation));
        assert_eq!(tokens("a^"), Err(PatternError::OutsideClass('^')));
        assert_eq!(tokens("[a*]"), Err(PatternError::UnescapedInClass('*')));
        assert_eq!(tokens("[ab"), Err(PatternError::UnterminatedClass));
        assert_eq!(tokens("ab]"), Err(PatternError::UnopenedClass));
        assert_eq!(tokens("\\q"), Err(PatternError::InvalidEscape('q')));
        assert_eq!(tokens("a\\"), Err(PatternError::DanglingEscape));
        assert_eq!(tokens(":id"), Err(PatternError::UnterminatedEmbed));
    }
}
