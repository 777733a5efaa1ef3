/// Name of the token produced once the input is exhausted.
pub const EOF_TOKEN: &str = "eof";

/// Tokens resolving to this name are discarded by the tokenizer.
pub const SKIP_TOKEN: &str = "skip";

/// Runtime knobs shared by the tokenizer and the grammar compiler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Number of tokens kept for `push_token`.
    pub history_depth: usize,
    pub skip_token: String,
    pub eof_token: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            history_depth: 20,
            skip_token: SKIP_TOKEN.to_string(),
            eof_token: EOF_TOKEN.to_string(),
        }
    }
}

impl Config {
    pub fn with_history_depth(mut self, depth: usize) -> Self {
        self.history_depth = depth;
        self
    }

    pub fn with_skip_token(mut self, name: &str) -> Self {
        self.skip_token = name.to_string();
        self
    }

    pub fn with_eof_token(mut self, name: &str) -> Self {
        self.eof_token = name.to_string();
        self
    }
}
