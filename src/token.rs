#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(crate) enum TokenKind {
    Text,
    ExpressionOpen,     // {{
    ExpressionClose,    // }}
    LineStatementOpen,  // ##
    LineStatementClose, // \n
    StatementOpen,      // {%
    StatementClose,     // %}
    CommentOpen,        // {#
    CommentClose,       // #}
    Id,                 // this, this.foo
    Number,             // 1, 2, -1, 5.2, -5.3
    String,             // "this"
    Plus,               // +
    Minus,              // -
    Times,              // *
    Slash,              // /
    Percent,            // %
    Power,              // ^
    Comma,              // ,
    Colon,              // :
    LeftParen,          // (
    RightParen,         // )
    LeftBracket,        // [
    RightBracket,       // ]
    LeftBrace,          // {
    RightBrace,         // }
    Equal,              // ==
    NotEqual,           // !=
    GreaterThan,        // >
    GreaterEqual,       // >=
    LessThan,           // <
    LessEqual,          // <=
    Unknown,
    Eof,
}

/// A slice of the template source tagged with its kind. Tokens never own
/// text, so they live only as long as the source they were scanned from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// Byte offset of `text` in the source.
    pub offset: usize,
}

impl<'a> Token<'a> {
    pub const fn new(kind: TokenKind, text: &'a str, offset: usize) -> Self {
        Self { kind, text, offset }
    }

    /// Byte offset one past the end of the token.
    pub const fn end(&self) -> usize {
        self.offset.saturating_add(self.text.len())
    }

    /// Human readable form used in error messages.
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::Text => "<text>".to_string(),
            TokenKind::LineStatementClose => "<eol>".to_string(),
            TokenKind::Eof => "<eof>".to_string(),
            _ => self.text.to_string(),
        }
    }
}
