use std::{collections::VecDeque, fmt};

use log::trace;

use crate::{config::Config, error::TokenizeError, pattern_set::PatternSet};

/// A matched piece of input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub name: String,
    pub lexeme: String,
    /// 1-based line the token starts on.
    pub line: usize,
}

impl Token {
    pub fn new(name: &str, lexeme: &str, line: usize) -> Self {
        Self {
            name: name.to_string(),
            lexeme: lexeme.to_string(),
            line,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.name, self.lexeme)
    }
}

/// Anything the parser can pull tokens from.
pub trait TokenSource {
    /// Returns the next token. Once the input is exhausted this keeps
    /// returning the end-of-file token.
    fn next_token(&mut self) -> Result<Token, TokenizeError>;

    /// Steps back one token, so the next call to `next_token` returns it
    /// again.
    fn push_token(&mut self) -> Result<(), TokenizeError>;
}

/// Maximal-munch tokenizer driven by the master automaton of a
/// [`PatternSet`].
pub struct Tokenizer<'a> {
    patterns: &'a PatternSet,
    config: Config,
    chars: Vec<char>,
    current_pos: usize,
    line: usize,
    history: VecDeque<Token>,
    pushed_back: usize,
}

impl<'a> Tokenizer<'a> {
    /// Rejects a `config` whose end-of-file name is also the name of a
    /// pattern in `patterns` that produces tokens.
    pub fn new(patterns: &'a PatternSet, input: &str, config: Config) -> Result<Self, TokenizeError> {
        let eof = patterns.pattern(&config.eof_token);
        if eof.is_some_and(|pattern| !pattern.is_internal()) {
            return Err(TokenizeError::ReservedName {
                name: config.eof_token,
            });
        }
        Ok(Self::build(patterns, input, config))
    }

    pub(crate) fn build(patterns: &'a PatternSet, input: &str, config: Config) -> Self {
        Self {
            patterns,
            config,
            chars: input.chars().collect(),
            current_pos: 0,
            line: 1,
            history: VecDeque::new(),
            pushed_back: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Reads every remaining token, the end-of-file token excluded.
    pub fn tokenize(&mut self) -> Result<Vec<Token>, TokenizeError> {
        let mut tokens = vec![];
        loop {
            let token = self.next_token()?;
            if token.name == self.config.eof_token {
                return Ok(tokens);
            }
            tokens.push(token);
        }
    }

    fn get(&mut self) -> Result<Token, TokenizeError> {
        let dfa = self.patterns.dfa();
        loop {
            let start_pos = self.current_pos;
            let line = self.line;
            if start_pos >= self.chars.len() {
                return Ok(Token::new(&self.config.eof_token, "", line));
            }

            let mut state = dfa.start();
            while let Some(&ch) = self.chars.get(self.current_pos) {
                if !is_valid_char(ch) {
                    break;
                }
                match dfa.step(state, ch) {
                    Some(next) => {
                        state = next;
                        self.read_char(ch);
                    }
                    None => break,
                }
            }

            let matched = self.current_pos > start_pos;
            let owner = dfa.state(state).winner().filter(|_| matched);
            let Some(owner) = owner else {
                return Err(self.report_error(start_pos, line));
            };

            let lexeme: String = self.chars[start_pos..self.current_pos].iter().collect();
            if owner.name == self.config.skip_token {
                trace!("skipped {lexeme:?} on line {line}");
                continue;
            }
            let token = Token::new(&owner.name, &lexeme, line);
            trace!("token {token} on line {line}");
            return Ok(token);
        }
    }

    fn report_error(&self, start_pos: usize, line: usize) -> TokenizeError {
        match self.chars.get(self.current_pos) {
            Some(&ch) if !is_valid_char(ch) && self.current_pos == start_pos => {
                TokenizeError::InvalidCharacter { ch, line: self.line }
            }
            next => {
                let mut text: String = self.chars[start_pos..self.current_pos].iter().collect();
                text.extend(next);
                TokenizeError::NoSuchToken { text, line }
            }
        }
    }

    /// Line breaks are `\n`, `\r\n` and a bare `\r`.
    fn read_char(&mut self, ch: char) {
        self.current_pos += 1;
        let next = self.chars.get(self.current_pos);
        if ch == '\n' || (ch == '\r' && next != Some(&'\n')) {
            self.line += 1;
        }
    }
}

impl TokenSource for Tokenizer<'_> {
    fn next_token(&mut self) -> Result<Token, TokenizeError> {
        if self.pushed_back > 0 {
            let idx = self.history.len() - self.pushed_back;
            self.pushed_back -= 1;
            if let Some(token) = self.history.get(idx) {
                return Ok(token.clone());
            }
        }

        let token = self.get()?;
        if self.config.history_depth > 0 {
            if self.history.len() == self.config.history_depth {
                self.history.pop_front();
            }
            self.history.push_back(token.clone());
        }
        Ok(token)
    }

    fn push_token(&mut self) -> Result<(), TokenizeError> {
        if self.pushed_back >= self.history.len() {
            return Err(TokenizeError::TooManyPushbacks {
                depth: self.config.history_depth,
            });
        }
        self.pushed_back += 1;
        Ok(())
    }
}

/// Tab, line breaks and printable ASCII. Tab is accepted so `\t` in a regex
/// can match.
fn is_valid_char(ch: char) -> bool {
    matches!(u32::from(ch), 9..=13 | 32..=126)
}

/// A token source over an already tokenized input.
#[derive(Clone, Debug)]
pub struct TokenList {
    tokens: Vec<Token>,
    current_pos: usize,
    eof_token: String,
}

impl TokenList {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self::with_config(tokens, &Config::default())
    }

    pub fn with_config(tokens: Vec<Token>, config: &Config) -> Self {
        Self {
            tokens,
            current_pos: 0,
            eof_token: config.eof_token.clone(),
        }
    }
}

impl TokenSource for TokenList {
    fn next_token(&mut self) -> Result<Token, TokenizeError> {
        let token = match self.tokens.get(self.current_pos) {
            Some(token) => token.clone(),
            None => {
                let line = self.tokens.last().map_or(1, |token| token.line);
                Token::new(&self.eof_token, "", line)
            }
        };
        self.current_pos += 1;
        Ok(token)
    }

    fn push_token(&mut self) -> Result<(), TokenizeError> {
        if self.current_pos == 0 {
            return Err(TokenizeError::TooManyPushbacks {
                depth: self.tokens.len(),
            });
        }
        self.current_pos -= 1;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::{
        config::Config,
        error::TokenizeError,
        pattern_set::PatternSet,
        tokenizer::{Token, TokenList, TokenSource},
    };

    fn calculator() -> PatternSet {
        PatternSet::parse(
            "
            number: [0123456789]+
            id: [abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789]+
            plus: \\+
            skip: [\\s\\t\\n\\r]+
            skip: \\#[^\\n\\r]*
            ",
        )
        .unwrap()
    }

    #[test]
    fn main() {
        let set = calculator();
        let tokens = set.tokenizer("12 + x3 # note\n+ 4").tokenize().unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::new("number", "12", 1),
                Token::new("plus", "+", 1),
                Token::new("id", "x3", 1),
                Token::new("plus", "+", 2),
                Token::new("number", "4", 2),
            ]
        );
    }

    #[test]
    fn maximal_munch() {
        let set = calculator();
        let tokens = set.tokenizer("x123abc").tokenize().unwrap();
        assert_eq!(tokens, vec![Token::new("id", "x123abc", 1)]);
        // both patterns match "123"; number is defined first
        let tokens = set.tokenizer("123").tokenize().unwrap();
        assert_eq!(tokens, vec![Token::new("number", "123", 1)]);
    }

    #[test]
    fn eof_repeats() {
        let set = calculator();
        let mut tokenizer = set.tokenizer("1\n");
        assert_eq!(tokenizer.next_token().unwrap().name, "number");
        assert_eq!(tokenizer.next_token().unwrap(), Token::new("eof", "", 2));
        assert_eq!(tokenizer.next_token().unwrap(), Token::new("eof", "", 2));
    }

    #[test]
    fn errors() {
        let set = calculator();
        assert_eq!(
            set.tokenizer("1 + ?").tokenize().unwrap_err(),
            TokenizeError::NoSuchToken {
                text: "?".to_string(),
                line: 1
            }
        );
        assert_eq!(
            set.tokenizer("1\n\u{7f}").tokenize().unwrap_err(),
            TokenizeError::InvalidCharacter { ch: '\u{7f}', line: 2 }
        );
        let mut tokenizer = set.tokenizer("1 é");
        assert_eq!(tokenizer.next_token().unwrap().lexeme, "1");
        assert!(matches!(
            tokenizer.next_token(),
            Err(TokenizeError::InvalidCharacter { ch: 'é', .. })
        ));
    }

    #[test]
    fn push_back() {
        let set = calculator();
        let mut tokenizer = set
            .tokenizer_with("1 + 2", Config::default().with_history_depth(2))
            .unwrap();
        let one = tokenizer.next_token().unwrap();
        let plus = tokenizer.next_token().unwrap();
        tokenizer.push_token().unwrap();
        assert_eq!(tokenizer.next_token().unwrap(), plus);
        tokenizer.push_token().unwrap();
        tokenizer.push_token().unwrap();
        assert_eq!(tokenizer.next_token().unwrap(), one);
        assert_eq!(tokenizer.next_token().unwrap(), plus);
        assert_eq!(tokenizer.next_token().unwrap().lexeme, "2");
        tokenizer.push_token().unwrap();
        tokenizer.push_token().unwrap();
        assert_eq!(
            tokenizer.push_token(),
            Err(TokenizeError::TooManyPushbacks { depth: 2 })
        );
    }

    #[test]
    fn line_breaks() {
        let set = calculator();
        let lines: Vec<_> = set
            .tokenizer("1\r2\r\n3\n\r4")
            .tokenize()
            .unwrap()
            .iter()
            .map(|token| token.line)
            .collect();
        assert_eq!(lines, vec![1, 2, 3, 5]);
    }

    #[test]
    fn control_characters() {
        let set = calculator();
        let mut tokenizer = set.tokenizer("1\t+\u{8}");
        assert_eq!(tokenizer.next_token().unwrap().name, "number");
        assert_eq!(tokenizer.next_token().unwrap().name, "plus");
        assert_eq!(
            tokenizer.next_token(),
            Err(TokenizeError::InvalidCharacter { ch: '\u{8}', line: 1 })
        );
    }

    #[test]
    fn eof_name_is_reserved() {
        let set = PatternSet::parse("end: end\nword: [abc]+\nskip: \\s+").unwrap();
        let config = Config::default().with_eof_token("end");
        assert_eq!(
            set.tokenizer_with("a end b", config.clone()).err(),
            Some(TokenizeError::ReservedName {
                name: "end".to_string()
            })
        );
        // internal patterns never produce tokens
        let set = PatternSet::parse(":end: end\nword: :end: [abc]+").unwrap();
        let tokens = set.tokenizer_with("enda", config).unwrap().tokenize().unwrap();
        assert_eq!(tokens, vec![Token::new("word", "enda", 1)]);
    }

    #[test]
    fn token_list() {
        let mut list = TokenList::new(vec![Token::new("number", "1", 3)]);
        assert_eq!(
            list.push_token(),
            Err(TokenizeError::TooManyPushbacks { depth: 1 })
        );
        assert_eq!(list.next_token().unwrap().name, "number");
        assert_eq!(list.next_token().unwrap(), Token::new("eof", "", 3));
        list.push_token().unwrap();
        list.push_token().unwrap();
        assert_eq!(list.next_token().unwrap().name, "number");
    }
}
