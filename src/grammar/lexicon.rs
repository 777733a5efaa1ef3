//! Token definitions used to read grammar files.

/// Rule names are `[a-zA-Z_][a-zA-Z_0-9]*`. A rule block ends at a line break
/// unless the break is escaped with `\`.
pub const DEFINITIONS: &str = r"
:alpha: [abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ_]
:digit: [0123456789]
:newline: (\n | \r | \r\n)

id: :alpha: (:alpha: | :digit:)*
sep: ->
op: [\* \? \|]
lparen: \(
rparen: \)
multi_child: \[>1\]
eol: :newline:

skip: [\s \t]+
skip: \# [^\n \r]*
skip: \\ :newline:
";

pub const ID: &str = "id";
pub const SEP: &str = "sep";
pub const OP: &str = "op";
pub const LPAREN: &str = "lparen";
pub const RPAREN: &str = "rparen";
pub const MULTI_CHILD: &str = "multi_child";
pub const EOL: &str = "eol";

#[cfg(test)]
mod test {
    use crate::{grammar::lexicon::DEFINITIONS, pattern_set::PatternSet};

    #[test]
    fn main() {
        let set = PatternSet::parse(DEFINITIONS).unwrap();
        let tokens = set
            .tokenizer("Sum -> Value \\\n  (plus Value)* [>1] # sums\n")
            .tokenize()
            .unwrap();
        let names: Vec<_> = tokens.iter().map(|token| token.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "id", "sep", "id", "lparen", "id", "id", "rparen", "op", "multi_child", "eol"
            ]
        );
        assert_eq!(tokens[2].lexeme, "Value");
        assert_eq!(tokens[3].line, 2);
    }
}
