use crate::{
    config::LexerConfig,
    error::SourceLocation,
    token::{Token, TokenKind},
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum State {
    Text,
    ExpressionStart,
    ExpressionBody,
    LineStart,
    LineBody,
    StatementStart,
    StatementStartNoLstrip,
    StatementStartForceLstrip,
    StatementBody,
    CommentStart,
    CommentBody,
}

/// Whether a `-` should be read as the binary operator or as the sign of a
/// number. Decided by the previous token: after an operand it is an operator.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum MinusState {
    Operator,
    Number,
}

/// Splits a template into tokens on demand.
///
/// The lexer only guarantees the *shape* of a token. Numbers are scanned
/// permissively, unknown characters become [`TokenKind::Unknown`] and it is up
/// to the parser to reject them.
pub(crate) struct Lexer<'a> {
    config: &'a LexerConfig,
    /// First characters of every opening delimiter.
    open_chars: String,
    input: &'a str,
    state: State,
    minus_state: MinusState,
    /// Start of the token being scanned.
    tok_start: usize,
    /// Scan position, one past the end of the token being scanned.
    pos: usize,
}

#[inline]
fn starts_with_delimiter(haystack: &str, delimiter: &str) -> bool {
    !delimiter.is_empty() && haystack.starts_with(delimiter)
}

/// Removes the last line of `text` if it consists only of spaces and tabs.
/// Never reaches across a line break.
fn clear_final_line_if_whitespace(text: &str) -> &str {
    let trimmed = text.trim_end_matches([' ', '\t']);
    if trimmed.is_empty() || trimmed.ends_with(['\n', '\r']) {
        trimmed
    } else {
        text
    }
}

impl<'a> Lexer<'a> {
    pub fn new(config: &'a LexerConfig, input: &'a str) -> Self {
        Self {
            config,
            open_chars: config.open_chars(),
            input,
            state: State::Text,
            minus_state: MinusState::Number,
            tok_start: 0,
            pos: 0,
        }
    }

    /// Location of the most recently scanned token.
    pub fn current_position(&self) -> SourceLocation {
        SourceLocation::of(self.input, self.tok_start)
    }

    #[inline]
    fn rest(&self, at: usize) -> &'a str {
        self.input.get(at..).unwrap_or_default()
    }

    #[inline]
    fn byte_at(&self, at: usize) -> Option<u8> {
        self.input.as_bytes().get(at).copied()
    }

    #[inline]
    fn char_len_at(&self, at: usize) -> usize {
        self.rest(at).chars().next().map_or(1, char::len_utf8)
    }

    fn make_token(&self, kind: TokenKind) -> Token<'a> {
        let start = self.tok_start.min(self.input.len());
        let end = self.pos.clamp(start, self.input.len());
        Token::new(kind, self.input.get(start..end).unwrap_or_default(), start)
    }

    fn eof_token(&mut self) -> Token<'a> {
        self.tok_start = self.input.len();
        self.pos = self.input.len();
        self.make_token(TokenKind::Eof)
    }

    /// Scans the next token.
    pub fn scan(&mut self) -> Token<'a> {
        self.tok_start = self.pos;

        loop {
            if self.tok_start >= self.input.len() {
                return self.eof_token();
            }

            match self.state {
                State::Text => {
                    let config = self.config;
                    let open_chars = self.open_chars.as_str();
                    let Some(found) = self
                        .rest(self.pos)
                        .find(|c: char| open_chars.contains(c))
                    else {
                        self.pos = self.input.len();
                        return self.make_token(TokenKind::Text);
                    };
                    self.pos = self.pos.saturating_add(found);

                    let open_str = self.rest(self.pos);
                    let mut must_lstrip = false;
                    if starts_with_delimiter(open_str, &config.expression_open) {
                        self.state = State::ExpressionStart;
                    } else if starts_with_delimiter(open_str, &config.statement_open) {
                        if starts_with_delimiter(open_str, &config.statement_open_no_lstrip) {
                            self.state = State::StatementStartNoLstrip;
                        } else if starts_with_delimiter(
                            open_str,
                            &config.statement_open_force_lstrip,
                        ) {
                            self.state = State::StatementStartForceLstrip;
                            must_lstrip = true;
                        } else {
                            self.state = State::StatementStart;
                            must_lstrip = config.lstrip_blocks;
                        }
                    } else if starts_with_delimiter(open_str, &config.comment_open) {
                        self.state = State::CommentStart;
                        must_lstrip = config.lstrip_blocks;
                    } else if (self.pos == 0
                        || self.byte_at(self.pos.saturating_sub(1)) == Some(b'\n'))
                        && starts_with_delimiter(open_str, &config.line_statement)
                    {
                        self.state = State::LineStart;
                    } else {
                        // Not actually an opening sequence.
                        self.pos = self.pos.saturating_add(self.char_len_at(self.pos));
                        continue;
                    }

                    let mut text = self.make_token(TokenKind::Text);
                    if must_lstrip {
                        text.text = clear_final_line_if_whitespace(text.text);
                    }

                    if text.text.is_empty() {
                        self.tok_start = self.pos;
                        continue;
                    }
                    return text;
                }
                State::ExpressionStart => {
                    self.state = State::ExpressionBody;
                    return self.open(self.config.expression_open.len(), TokenKind::ExpressionOpen);
                }
                State::LineStart => {
                    self.state = State::LineBody;
                    return self.open(
                        self.config.line_statement.len(),
                        TokenKind::LineStatementOpen,
                    );
                }
                State::StatementStart => {
                    self.state = State::StatementBody;
                    return self.open(self.config.statement_open.len(), TokenKind::StatementOpen);
                }
                State::StatementStartNoLstrip => {
                    self.state = State::StatementBody;
                    return self.open(
                        self.config.statement_open_no_lstrip.len(),
                        TokenKind::StatementOpen,
                    );
                }
                State::StatementStartForceLstrip => {
                    self.state = State::StatementBody;
                    return self.open(
                        self.config.statement_open_force_lstrip.len(),
                        TokenKind::StatementOpen,
                    );
                }
                State::CommentStart => {
                    self.state = State::CommentBody;
                    return self.open(self.config.comment_open.len(), TokenKind::CommentOpen);
                }
                State::ExpressionBody => {
                    let config = self.config;
                    return self.scan_body(
                        &config.expression_close,
                        TokenKind::ExpressionClose,
                        "",
                        false,
                    );
                }
                State::LineBody => {
                    return self.scan_body("\n", TokenKind::LineStatementClose, "", false);
                }
                State::StatementBody => {
                    let config = self.config;
                    return self.scan_body(
                        &config.statement_close,
                        TokenKind::StatementClose,
                        &config.statement_close_force_rstrip,
                        config.trim_blocks,
                    );
                }
                State::CommentBody => return self.scan_comment(),
            }
        }
    }

    fn open(&mut self, len: usize, kind: TokenKind) -> Token<'a> {
        self.tok_start = self.pos;
        self.pos = self.pos.saturating_add(len);
        self.minus_state = MinusState::Number;
        self.make_token(kind)
    }

    fn scan_comment(&mut self) -> Token<'a> {
        let config = self.config;
        let close = &config.comment_close;
        let Some(end) = self.rest(self.pos).find(close.as_str()) else {
            return self.eof_token();
        };
        // The whole comment is returned as the close token.
        self.state = State::Text;
        self.pos = self.pos.saturating_add(end).saturating_add(close.len());
        let tok = self.make_token(TokenKind::CommentClose);
        if config.trim_blocks {
            self.skip_whitespaces_and_first_newline();
        }
        tok
    }

    fn scan_body(
        &mut self,
        close: &str,
        close_kind: TokenKind,
        close_trim: &str,
        trim: bool,
    ) -> Token<'a> {
        let ch = loop {
            let Some(ch) = self.byte_at(self.tok_start) else {
                return self.eof_token();
            };
            // Newlines are skipped only after the close check, a line
            // statement closes on one.
            if matches!(ch, b' ' | b'\t' | b'\r') {
                self.tok_start = self.tok_start.saturating_add(1);
                continue;
            }

            let rest = self.rest(self.tok_start);
            if starts_with_delimiter(rest, close_trim) {
                self.state = State::Text;
                self.pos = self.tok_start.saturating_add(close_trim.len());
                let tok = self.make_token(close_kind);
                self.skip_whitespaces_and_newlines();
                return tok;
            }

            if starts_with_delimiter(rest, close) {
                self.state = State::Text;
                self.pos = self.tok_start.saturating_add(close.len());
                let tok = self.make_token(close_kind);
                if trim {
                    self.skip_whitespaces_and_first_newline();
                }
                return tok;
            }

            if ch == b'\n' {
                self.tok_start = self.tok_start.saturating_add(1);
                continue;
            }
            break ch;
        };

        self.pos = self.tok_start.saturating_add(1);
        if ch.is_ascii_alphabetic() || ch == b'_' {
            self.minus_state = MinusState::Operator;
            return self.scan_id();
        }

        let current_minus_state = self.minus_state;
        self.minus_state = MinusState::Number;

        let kind = match ch {
            b'+' => TokenKind::Plus,
            b'-' => {
                if current_minus_state == MinusState::Operator {
                    TokenKind::Minus
                } else {
                    return self.scan_number();
                }
            }
            b'*' => TokenKind::Times,
            b'/' => TokenKind::Slash,
            b'^' => TokenKind::Power,
            b'%' => TokenKind::Percent,
            b',' => TokenKind::Comma,
            b':' => TokenKind::Colon,
            b'(' => TokenKind::LeftParen,
            b')' => {
                self.minus_state = MinusState::Operator;
                TokenKind::RightParen
            }
            b'[' => TokenKind::LeftBracket,
            b']' => {
                self.minus_state = MinusState::Operator;
                TokenKind::RightBracket
            }
            b'{' => TokenKind::LeftBrace,
            b'}' => {
                self.minus_state = MinusState::Operator;
                TokenKind::RightBrace
            }
            b'>' => self.with_equals(TokenKind::GreaterEqual, TokenKind::GreaterThan),
            b'<' => self.with_equals(TokenKind::LessEqual, TokenKind::LessThan),
            b'=' => self.with_equals(TokenKind::Equal, TokenKind::Unknown),
            b'!' => self.with_equals(TokenKind::NotEqual, TokenKind::Unknown),
            b'"' => return self.scan_string(),
            b'0'..=b'9' => return self.scan_number(),
            _ => {
                self.pos = self.tok_start.saturating_add(self.char_len_at(self.tok_start));
                TokenKind::Unknown
            }
        };
        self.make_token(kind)
    }

    /// Picks `double` if the next character is `=`, consuming it.
    fn with_equals(&mut self, double: TokenKind, single: TokenKind) -> TokenKind {
        if self.byte_at(self.pos) == Some(b'=') {
            self.pos = self.pos.saturating_add(1);
            double
        } else {
            single
        }
    }

    fn scan_id(&mut self) -> Token<'a> {
        while let Some(ch) = self.byte_at(self.pos) {
            if !ch.is_ascii_alphanumeric() && !matches!(ch, b'.' | b'/' | b'_' | b'-') {
                break;
            }
            self.pos = self.pos.saturating_add(1);
        }
        self.make_token(TokenKind::Id)
    }

    /// Permissive on purpose: validity is checked when the parser converts
    /// the literal. Signs are only taken right after an exponent marker so
    /// that `1+2` stays three tokens.
    fn scan_number(&mut self) -> Token<'a> {
        while let Some(ch) = self.byte_at(self.pos) {
            let after_exponent = matches!(
                self.byte_at(self.pos.saturating_sub(1)),
                Some(b'e' | b'E')
            );
            let accepted = ch.is_ascii_digit()
                || matches!(ch, b'.' | b'e' | b'E')
                || (after_exponent && matches!(ch, b'+' | b'-'));
            if !accepted {
                break;
            }
            self.pos = self.pos.saturating_add(1);
        }
        self.minus_state = MinusState::Operator;
        self.make_token(TokenKind::Number)
    }

    fn scan_string(&mut self) -> Token<'a> {
        let quote = self.byte_at(self.tok_start);
        let mut escape = false;
        while let Some(ch) = self.byte_at(self.pos) {
            self.pos = self.pos.saturating_add(1);
            if escape {
                escape = false;
            } else if ch == b'\\' {
                escape = true;
            } else if Some(ch) == quote {
                break;
            }
        }
        self.minus_state = MinusState::Operator;
        self.make_token(TokenKind::String)
    }

    fn skip_whitespaces_and_newlines(&mut self) {
        while matches!(self.byte_at(self.pos), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos = self.pos.saturating_add(1);
        }
    }

    fn skip_whitespaces_and_first_newline(&mut self) {
        while matches!(self.byte_at(self.pos), Some(b' ' | b'\t')) {
            self.pos = self.pos.saturating_add(1);
        }

        match self.byte_at(self.pos) {
            Some(b'\n') => self.pos = self.pos.saturating_add(1),
            Some(b'\r') => {
                self.pos = self.pos.saturating_add(1);
                if self.byte_at(self.pos) == Some(b'\n') {
                    self.pos = self.pos.saturating_add(1);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(config: &LexerConfig, input: &str) -> Vec<TokenKind> {
        tokens(config, input).into_iter().map(|(kind, _)| kind).collect()
    }

    fn tokens<'a>(config: &'a LexerConfig, input: &'a str) -> Vec<(TokenKind, &'a str)> {
        let mut lexer = Lexer::new(config, input);
        let mut out = Vec::new();
        loop {
            let tok = lexer.scan();
            out.push((tok.kind, tok.text));
            if tok.kind == TokenKind::Eof {
                break;
            }
        }
        out
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_plain_text() {
        let config = LexerConfig::default();
        assert_eq!(
            tokens(&config, "hello world"),
            vec![(TokenKind::Text, "hello world"), (TokenKind::Eof, "")]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_empty_input() {
        let config = LexerConfig::default();
        assert_eq!(kinds(&config, ""), vec![TokenKind::Eof]);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_expression_tokens() {
        let config = LexerConfig::default();
        assert_eq!(
            tokens(&config, "Hi {{ user.name }}!"),
            vec![
                (TokenKind::Text, "Hi "),
                (TokenKind::ExpressionOpen, "{{"),
                (TokenKind::Id, "user.name"),
                (TokenKind::ExpressionClose, "}}"),
                (TokenKind::Text, "!"),
                (TokenKind::Eof, ""),
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_operators() {
        let config = LexerConfig::default();
        assert_eq!(
            kinds(&config, "{{ a == b != c >= d <= e > f < g }}"),
            vec![
                TokenKind::ExpressionOpen,
                TokenKind::Id,
                TokenKind::Equal,
                TokenKind::Id,
                TokenKind::NotEqual,
                TokenKind::Id,
                TokenKind::GreaterEqual,
                TokenKind::Id,
                TokenKind::LessEqual,
                TokenKind::Id,
                TokenKind::GreaterThan,
                TokenKind::Id,
                TokenKind::LessThan,
                TokenKind::Id,
                TokenKind::ExpressionClose,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_minus_after_operand_is_operator() {
        let config = LexerConfig::default();
        assert_eq!(
            tokens(&config, "{{ 3 -1 }}"),
            vec![
                (TokenKind::ExpressionOpen, "{{"),
                (TokenKind::Number, "3"),
                (TokenKind::Minus, "-"),
                (TokenKind::Number, "1"),
                (TokenKind::ExpressionClose, "}}"),
                (TokenKind::Eof, ""),
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_minus_after_operator_is_sign() {
        let config = LexerConfig::default();
        assert_eq!(
            tokens(&config, "{{ 3 * -1.5e-3 }}"),
            vec![
                (TokenKind::ExpressionOpen, "{{"),
                (TokenKind::Number, "3"),
                (TokenKind::Times, "*"),
                (TokenKind::Number, "-1.5e-3"),
                (TokenKind::ExpressionClose, "}}"),
                (TokenKind::Eof, ""),
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_number_stops_at_unspaced_sign() {
        let config = LexerConfig::default();
        assert_eq!(
            tokens(&config, "{{ 1-2 }}"),
            vec![
                (TokenKind::ExpressionOpen, "{{"),
                (TokenKind::Number, "1"),
                (TokenKind::Minus, "-"),
                (TokenKind::Number, "2"),
                (TokenKind::ExpressionClose, "}}"),
                (TokenKind::Eof, ""),
            ]
        );
        assert_eq!(
            tokens(&config, "{{ 1e-2+3 }}"),
            vec![
                (TokenKind::ExpressionOpen, "{{"),
                (TokenKind::Number, "1e-2"),
                (TokenKind::Plus, "+"),
                (TokenKind::Number, "3"),
                (TokenKind::ExpressionClose, "}}"),
                (TokenKind::Eof, ""),
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_struct_literal_delimiters() {
        let config = LexerConfig {
            expression_open: "<<".to_string(),
            expression_close: ">>".to_string(),
            ..Default::default()
        };
        assert_eq!(
            tokens(&config, "a << x >> {{ y }}"),
            vec![
                (TokenKind::Text, "a "),
                (TokenKind::ExpressionOpen, "<<"),
                (TokenKind::Id, "x"),
                (TokenKind::ExpressionClose, ">>"),
                (TokenKind::Text, " {{ y }}"),
                (TokenKind::Eof, ""),
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_minus_after_closing_paren_is_operator() {
        let config = LexerConfig::default();
        assert_eq!(
            kinds(&config, "{{ (a)-1 }}"),
            vec![
                TokenKind::ExpressionOpen,
                TokenKind::LeftParen,
                TokenKind::Id,
                TokenKind::RightParen,
                TokenKind::Minus,
                TokenKind::Number,
                TokenKind::ExpressionClose,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_string_with_escaped_quote() {
        let config = LexerConfig::default();
        assert_eq!(
            tokens(&config, r#"{{ "a \"b\" \\" }}"#),
            vec![
                (TokenKind::ExpressionOpen, "{{"),
                (TokenKind::String, r#""a \"b\" \\""#),
                (TokenKind::ExpressionClose, "}}"),
                (TokenKind::Eof, ""),
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_unknown_character() {
        let config = LexerConfig::default();
        assert_eq!(
            tokens(&config, "{{ a § b }}"),
            vec![
                (TokenKind::ExpressionOpen, "{{"),
                (TokenKind::Id, "a"),
                (TokenKind::Unknown, "§"),
                (TokenKind::Id, "b"),
                (TokenKind::ExpressionClose, "}}"),
                (TokenKind::Eof, ""),
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_statement_and_comment() {
        let config = LexerConfig::default();
        assert_eq!(
            tokens(&config, "{% if a %}x{# note #}{% endif %}"),
            vec![
                (TokenKind::StatementOpen, "{%"),
                (TokenKind::Id, "if"),
                (TokenKind::Id, "a"),
                (TokenKind::StatementClose, "%}"),
                (TokenKind::Text, "x"),
                (TokenKind::CommentOpen, "{#"),
                (TokenKind::CommentClose, " note #}"),
                (TokenKind::StatementOpen, "{%"),
                (TokenKind::Id, "endif"),
                (TokenKind::StatementClose, "%}"),
                (TokenKind::Eof, ""),
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_unterminated_comment_is_eof() {
        let config = LexerConfig::default();
        assert_eq!(
            kinds(&config, "a{# never closed"),
            vec![TokenKind::Text, TokenKind::CommentOpen, TokenKind::Eof]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_line_statement_only_at_line_start() {
        let config = LexerConfig::default();
        assert_eq!(
            tokens(&config, "a ## b\n## if x\ny"),
            vec![
                (TokenKind::Text, "a ## b\n"),
                (TokenKind::LineStatementOpen, "##"),
                (TokenKind::Id, "if"),
                (TokenKind::Id, "x"),
                (TokenKind::LineStatementClose, "\n"),
                (TokenKind::Text, "y"),
                (TokenKind::Eof, ""),
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_lone_brace_is_text() {
        let config = LexerConfig::default();
        assert_eq!(
            tokens(&config, "a { b } c"),
            vec![(TokenKind::Text, "a { b } c"), (TokenKind::Eof, "")]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_trim_blocks_eats_first_newline() {
        let config = LexerConfig::default().with_trim_blocks(true);
        assert_eq!(
            tokens(&config, "{% if a %}  \n\nx"),
            vec![
                (TokenKind::StatementOpen, "{%"),
                (TokenKind::Id, "if"),
                (TokenKind::Id, "a"),
                (TokenKind::StatementClose, "%}"),
                (TokenKind::Text, "\nx"),
                (TokenKind::Eof, ""),
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_trim_blocks_counts_crlf_once() {
        let config = LexerConfig::default().with_trim_blocks(true);
        assert_eq!(
            tokens(&config, "{% x %}\r\n\r\ny"),
            vec![
                (TokenKind::StatementOpen, "{%"),
                (TokenKind::Id, "x"),
                (TokenKind::StatementClose, "%}"),
                (TokenKind::Text, "\r\ny"),
                (TokenKind::Eof, ""),
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_lstrip_blocks_strips_indentation() {
        let config = LexerConfig::default().with_lstrip_blocks(true);
        assert_eq!(
            tokens(&config, "a\n    {% x %}"),
            vec![
                (TokenKind::Text, "a\n"),
                (TokenKind::StatementOpen, "{%"),
                (TokenKind::Id, "x"),
                (TokenKind::StatementClose, "%}"),
                (TokenKind::Eof, ""),
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_lstrip_blocks_keeps_line_with_content() {
        let config = LexerConfig::default().with_lstrip_blocks(true);
        assert_eq!(
            tokens(&config, "a  {% x %}"),
            vec![
                (TokenKind::Text, "a  "),
                (TokenKind::StatementOpen, "{%"),
                (TokenKind::Id, "x"),
                (TokenKind::StatementClose, "%}"),
                (TokenKind::Eof, ""),
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_lstrip_blocks_does_not_touch_expressions() {
        let config = LexerConfig::default().with_lstrip_blocks(true);
        assert_eq!(
            tokens(&config, "  {{ x }}"),
            vec![
                (TokenKind::Text, "  "),
                (TokenKind::ExpressionOpen, "{{"),
                (TokenKind::Id, "x"),
                (TokenKind::ExpressionClose, "}}"),
                (TokenKind::Eof, ""),
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_force_lstrip_and_no_lstrip() {
        let config = LexerConfig::default();
        assert_eq!(
            tokens(&config, "  {%- x %}"),
            vec![
                (TokenKind::StatementOpen, "{%-"),
                (TokenKind::Id, "x"),
                (TokenKind::StatementClose, "%}"),
                (TokenKind::Eof, ""),
            ]
        );

        let config = LexerConfig::default().with_lstrip_blocks(true);
        assert_eq!(
            tokens(&config, "  {%+ x %}"),
            vec![
                (TokenKind::Text, "  "),
                (TokenKind::StatementOpen, "{%+"),
                (TokenKind::Id, "x"),
                (TokenKind::StatementClose, "%}"),
                (TokenKind::Eof, ""),
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_force_rstrip_close() {
        let config = LexerConfig::default();
        assert_eq!(
            tokens(&config, "{% x -%} \n\n  y"),
            vec![
                (TokenKind::StatementOpen, "{%"),
                (TokenKind::Id, "x"),
                (TokenKind::StatementClose, "-%}"),
                (TokenKind::Text, "y"),
                (TokenKind::Eof, ""),
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_custom_delimiters() {
        let config = LexerConfig::default()
            .with_expression("<<", ">>")
            .with_statement("<%", "%>");
        assert_eq!(
            tokens(&config, "{{ a }}<< b >><% c %>"),
            vec![
                (TokenKind::Text, "{{ a }}"),
                (TokenKind::ExpressionOpen, "<<"),
                (TokenKind::Id, "b"),
                (TokenKind::ExpressionClose, ">>"),
                (TokenKind::StatementOpen, "<%"),
                (TokenKind::Id, "c"),
                (TokenKind::StatementClose, "%>"),
                (TokenKind::Eof, ""),
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_current_position() {
        let config = LexerConfig::default();
        let mut lexer = Lexer::new(&config, "ab\n{{ x }}");
        assert_eq!(lexer.scan().kind, TokenKind::Text);
        assert_eq!(lexer.scan().kind, TokenKind::ExpressionOpen);
        assert_eq!(lexer.scan().kind, TokenKind::Id);
        assert_eq!(
            lexer.current_position(),
            SourceLocation { line: 2, column: 4 }
        );
    }
}
