use thiserror::Error;

/// A malformed regular expression.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("regular expression cannot be empty")]
    EmptyRegex,
    #[error("could not find beginning subpattern '('")]
    UnopenedGroup,
    #[error("could not find end subpattern ')'")]
    UnterminatedGroup,
    #[error("empty subpattern")]
    EmptyGroup,
    #[error("character class has not been opened with '['")]
    UnopenedClass,
    #[error("character class has not been ended with a ']'")]
    UnterminatedClass,
    #[error("character classes cannot be empty")]
    EmptyClass,
    #[error("missing operand for operator '{0}'")]
    MissingOperand(char),
    #[error("operator '{0}' needs escaping in a character class")]
    UnescapedInClass(char),
    #[error("operator '{0}' must be in a character class")]
    OutsideClass(char),
    #[error("character class negation '^' must come first after '[', or be escaped if literal")]
    MisplacedNegation,
    #[error("nothing following the escape character")]
    DanglingEscape,
    #[error("invalid escaping of character '{0}'")]
    InvalidEscape(char),
    #[error("could not find end ':' of embedded token name")]
    UnterminatedEmbed,
    #[error("cannot find token \"{0}\" for embedding")]
    UndefinedEmbed(String),
    #[error("token name \"{0}\" is reserved")]
    ReservedName(String),
}

/// A token definition file could not be compiled.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("({line}) {kind}")]
pub struct DefinitionError {
    pub line: usize,
    pub kind: DefinitionErrorKind,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DefinitionErrorKind {
    #[error("missing separator ':' after token name")]
    MissingSeparator,
    #[error("token name not defined")]
    MissingName,
    #[error("invalid token name \"{0}\"")]
    InvalidName(String),
    #[error("token name \"{0}\" is reserved")]
    ReservedName(String),
    #[error("regular expression not defined for token \"{0}\"")]
    MissingRegex(String),
    #[error("[{name}] {source}")]
    Pattern {
        name: String,
        #[source]
        source: PatternError,
    },
}

impl DefinitionError {
    pub(crate) fn new(line: usize, kind: DefinitionErrorKind) -> Self {
        Self { line, kind }
    }
}

/// Tokenization of an input failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenizeError {
    #[error("({line}) no such token for \"{text}\"")]
    NoSuchToken { text: String, line: usize },
    #[error("({line}) invalid character {ch:?}")]
    InvalidCharacter { ch: char, line: usize },
    #[error("too many token pushbacks (history holds {depth} tokens)")]
    TooManyPushbacks { depth: usize },
    #[error("pattern \"{name}\" would produce the end-of-file token")]
    ReservedName { name: String },
}

impl TokenizeError {
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::NoSuchToken { line, .. } | Self::InvalidCharacter { line, .. } => Some(*line),
            Self::TooManyPushbacks { .. } | Self::ReservedName { .. } => None,
        }
    }
}

/// A grammar definition file could not be compiled.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("({line}) {kind}")]
pub struct GrammarError {
    pub line: usize,
    pub kind: GrammarErrorKind,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GrammarErrorKind {
    #[error("grammar defines no rules")]
    NoRules,
    #[error("rule does not begin with a valid ID")]
    MissingRuleName,
    #[error("rule separator -> not found after rule name")]
    MissingSeparator,
    #[error("rule \"{0}\" has no definition")]
    EmptyRule(String),
    #[error("not enough operands for operator '{0}'")]
    MissingOperand(char),
    #[error("could not find beginning '('")]
    UnopenedGroup,
    #[error("could not find end ')'")]
    UnterminatedGroup,
    #[error("multi-child marker [>1] must end the rule")]
    MisplacedMultiChild,
    #[error("unexpected \"{0}\" in rule definition")]
    UnexpectedToken(String),
    #[error("left recursion detected for rule \"{rule}\"")]
    LeftRecursion { rule: String },
    #[error("ambiguous grammar detected at rule \"{rule}\" with token \"{token}\"")]
    Ambiguous { rule: String, token: String },
    #[error(transparent)]
    Tokenize(TokenizeError),
    #[error("grammar lexicon failed to compile: {0}")]
    Lexicon(DefinitionError),
}

impl GrammarError {
    pub(crate) fn new(line: usize, kind: GrammarErrorKind) -> Self {
        Self { line, kind }
    }
}

impl From<TokenizeError> for GrammarError {
    fn from(err: TokenizeError) -> Self {
        let line = err.line().unwrap_or_default();
        Self::new(line, GrammarErrorKind::Tokenize(err))
    }
}

/// Parsing an input against a compiled grammar failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("({line}) tokens do not match: read \"{found}\" ({lexeme:?}), expected \"{expected}\"")]
    TokenMismatch {
        expected: String,
        found: String,
        lexeme: String,
        line: usize,
    },
    #[error("({line}) unexpected token \"{found}\" ({lexeme:?}) for rule \"{rule}\"")]
    UnexpectedToken {
        rule: String,
        found: String,
        lexeme: String,
        line: usize,
    },
    #[error("input ended before a parse tree was started")]
    NoTree,
    #[error(transparent)]
    Tokenize(#[from] TokenizeError),
}

impl ParseError {
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::TokenMismatch { line, .. } | Self::UnexpectedToken { line, .. } => Some(*line),
            Self::NoTree => None,
            Self::Tokenize(err) => err.line(),
        }
    }
}
