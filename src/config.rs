/// Delimiters and whitespace control used by the lexer.
///
/// The defaults are `{{ }}` for expressions, `{% %}` for statements, `{# #}`
/// for comments and `##` for line statements. The statement opener has two
/// variants derived from it: `{%+` never strips the indentation before the
/// tag and `{%-` always does. `-%}` closes a statement and swallows every
/// whitespace character that follows it.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LexerConfig {
    pub statement_open: String,
    pub statement_open_no_lstrip: String,
    pub statement_open_force_lstrip: String,
    pub statement_close: String,
    pub statement_close_force_rstrip: String,
    pub line_statement: String,
    pub expression_open: String,
    pub expression_close: String,
    pub comment_open: String,
    pub comment_close: String,
    /// Remove the first newline after a statement or comment block.
    pub trim_blocks: bool,
    /// Strip spaces and tabs from the start of a line up to a statement or
    /// comment block.
    pub lstrip_blocks: bool,
}

impl Default for LexerConfig {
    fn default() -> Self {
        Self {
            statement_open: "{%".to_string(),
            statement_open_no_lstrip: "{%+".to_string(),
            statement_open_force_lstrip: "{%-".to_string(),
            statement_close: "%}".to_string(),
            statement_close_force_rstrip: "-%}".to_string(),
            line_statement: "##".to_string(),
            expression_open: "{{".to_string(),
            expression_close: "}}".to_string(),
            comment_open: "{#".to_string(),
            comment_close: "#}".to_string(),
            trim_blocks: false,
            lstrip_blocks: false,
        }
    }
}

impl LexerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Characters which may begin an opening delimiter.
    pub(crate) fn open_chars(&self) -> String {
        let mut open_chars = String::new();
        for open in [
            &self.line_statement,
            &self.statement_open,
            &self.statement_open_no_lstrip,
            &self.statement_open_force_lstrip,
            &self.expression_open,
            &self.comment_open,
        ] {
            if let Some(first) = open.chars().next() {
                if !open_chars.contains(first) {
                    open_chars.push(first);
                }
            }
        }
        open_chars
    }

    /// Sets the statement delimiters. The `+`/`-` variants are derived from
    /// the new pair.
    pub fn with_statement<O: Into<String>, C: Into<String>>(mut self, open: O, close: C) -> Self {
        self.statement_open = open.into();
        self.statement_close = close.into();
        self.statement_open_no_lstrip = format!("{}+", self.statement_open);
        self.statement_open_force_lstrip = format!("{}-", self.statement_open);
        self.statement_close_force_rstrip = format!("-{}", self.statement_close);
        self
    }

    pub fn with_expression<O: Into<String>, C: Into<String>>(mut self, open: O, close: C) -> Self {
        self.expression_open = open.into();
        self.expression_close = close.into();
        self
    }

    pub fn with_comment<O: Into<String>, C: Into<String>>(mut self, open: O, close: C) -> Self {
        self.comment_open = open.into();
        self.comment_close = close.into();
        self
    }

    pub fn with_line_statement<P: Into<String>>(mut self, prefix: P) -> Self {
        self.line_statement = prefix.into();
        self
    }

    pub const fn with_trim_blocks(mut self, trim_blocks: bool) -> Self {
        self.trim_blocks = trim_blocks;
        self
    }

    pub const fn with_lstrip_blocks(mut self, lstrip_blocks: bool) -> Self {
        self.lstrip_blocks = lstrip_blocks;
        self
    }
}

/// Limits applied while rendering.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RenderConfig {
    /// How many includes may be nested inside each other before rendering
    /// fails. Guards against templates that include themselves.
    pub max_include_depth: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_include_depth: 64,
        }
    }
}
