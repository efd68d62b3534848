pub type StencilResult<T> = std::result::Result<T, StencilError>;

/// A 1-based line and column into a template source.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    /// Computes the location of byte offset `pos` in `content` by counting
    /// newlines. Offsets past the end are clamped, offsets inside a multi-byte
    /// character are rounded down to its start.
    pub fn of(content: &str, pos: usize) -> Self {
        let mut end = pos.min(content.len());
        while !content.is_char_boundary(end) {
            end = end.saturating_sub(1);
        }
        let sliced = content.get(..end).unwrap_or_default();

        let line = sliced.matches('\n').count().saturating_add(1);
        let line_start = sliced.rfind('\n').map_or(0, |i| i.saturating_add(1));
        let column = sliced
            .get(line_start..)
            .map_or(0, |s| s.chars().count())
            .saturating_add(1);

        Self { line, column }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParseErrorKind {
    UnexpectedToken {
        expected: String,
        found: String,
    },
    UnexpectedEOF {
        /// Describes what was expected, e.g., " (expected 'endif')"
        expected_what: String,
    },
    UnknownStatement {
        keyword: String,
    },
    UnknownFunction {
        name: String,
        arity: usize,
    },
    InvalidLiteral {
        literal: String,
    },
    /// A closing statement without (or crossing) its opening statement, e.g.
    /// `endfor` while an `if` is still open.
    Unmatched {
        statement: String,
    },
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnexpectedToken { expected, found } => {
                write!(f, "expected {}, got '{}'", expected, found)
            }
            Self::UnexpectedEOF { expected_what } => {
                write!(f, "unexpected end of input{}", expected_what)
            }
            Self::UnknownStatement { keyword } => {
                write!(f, "unknown statement '{}'", keyword)
            }
            Self::UnknownFunction { name, arity } => {
                write!(f, "unknown function '{}' with {} argument(s)", name, arity)
            }
            Self::InvalidLiteral { literal } => {
                write!(f, "invalid literal '{}'", literal)
            }
            Self::Unmatched { statement } => {
                write!(f, "unmatched {}", statement)
            }
        }
    }
}

impl std::error::Error for ParseErrorKind {}

impl ParseErrorKind {
    pub fn unexpected_token<E: Into<String>, F: Into<String>>(expected: E, found: F) -> Self {
        Self::UnexpectedToken {
            expected: expected.into(),
            found: found.into(),
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub(crate) fn at(location: SourceLocation, kind: ParseErrorKind) -> Self {
        Self {
            line: location.line,
            column: location.column,
            kind,
        }
    }

    pub const fn location(&self) -> SourceLocation {
        SourceLocation {
            line: self.line,
            column: self.column,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Parse error at line {}, column {}: {}",
            self.line, self.column, self.kind
        )
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RenderErrorKind {
    MissingVariable {
        variable_name: String,
    },
    NotAnArray {
        found: String,
    },
    NotAnObject {
        found: String,
    },
    MissingFunction {
        name: String,
        arity: usize,
    },
    MissingInclude {
        template_name: String,
    },
    IncludeDepthExceeded {
        template_name: String,
        limit: usize,
    },
    /// A template fetched through the loader failed to parse.
    InvalidInclude {
        template_name: String,
        error: Box<ParseError>,
    },
    TypeMismatch {
        operation: String,
        message: String,
    },
    DivisionByZero,
    /// An arithmetic result JSON cannot hold, such as an infinity.
    NumberOutOfRange {
        operation: String,
    },
    Callback {
        name: String,
        message: String,
    },
    /// The expression evaluated to the wrong number of values. The parser
    /// rejects such expressions, so this only fires on hand-built trees.
    MalformedExpression,
}

impl std::fmt::Display for RenderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingVariable { variable_name } => {
                write!(f, "variable '{}' not found", variable_name)
            }
            Self::NotAnArray { found } => {
                write!(f, "object must be an array, found {}", found)
            }
            Self::NotAnObject { found } => {
                write!(f, "object must be an object, found {}", found)
            }
            Self::MissingFunction { name, arity } => {
                write!(f, "function '{}' with {} argument(s) not found", name, arity)
            }
            Self::MissingInclude { template_name } => {
                write!(f, "include '{}' not found", template_name)
            }
            Self::IncludeDepthExceeded {
                template_name,
                limit,
            } => {
                write!(
                    f,
                    "include '{}' exceeds the maximum include depth of {}",
                    template_name, limit
                )
            }
            Self::InvalidInclude {
                template_name,
                error,
            } => {
                write!(f, "include '{}' is invalid: {}", template_name, error)
            }
            Self::TypeMismatch { operation, message } => {
                write!(f, "type mismatch in '{}': {}", operation, message)
            }
            Self::DivisionByZero => write!(f, "division by zero"),
            Self::NumberOutOfRange { operation } => {
                write!(f, "result of '{}' is not a finite number", operation)
            }
            Self::Callback { name, message } => {
                write!(f, "callback '{}' failed: {}", name, message)
            }
            Self::MalformedExpression => write!(f, "malformed expression"),
        }
    }
}

impl std::error::Error for RenderErrorKind {}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderError {
    pub line: usize,
    pub column: usize,
    pub kind: RenderErrorKind,
}

impl RenderError {
    pub(crate) fn at(location: SourceLocation, kind: RenderErrorKind) -> Self {
        Self {
            line: location.line,
            column: location.column,
            kind,
        }
    }

    pub const fn location(&self) -> SourceLocation {
        SourceLocation {
            line: self.line,
            column: self.column,
        }
    }
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Render error at line {}, column {}: {}",
            self.line, self.column, self.kind
        )
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StencilError {
    TemplateExists { template_name: String },
    MissingTemplate { template_name: String },
    FunctionExists { name: String, arity: usize },
    Parse(ParseError),
    Render(RenderError),
}

impl std::fmt::Display for StencilError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TemplateExists { template_name } => {
                write!(f, "Template already exists: {}", template_name)
            }
            Self::MissingTemplate { template_name } => {
                write!(f, "Template not found: {}", template_name)
            }
            Self::FunctionExists { name, arity } => {
                write!(
                    f,
                    "Function already registered: {} with {} argument(s)",
                    name, arity
                )
            }
            Self::Parse(parse_error) => {
                write!(f, "{}", parse_error)
            }
            Self::Render(render_error) => {
                write!(f, "{}", render_error)
            }
        }
    }
}

impl std::error::Error for StencilError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(parse_error) => Some(parse_error),
            Self::Render(render_error) => Some(render_error),
            Self::TemplateExists { .. }
            | Self::MissingTemplate { .. }
            | Self::FunctionExists { .. } => None,
        }
    }
}

impl From<ParseError> for StencilError {
    fn from(error: ParseError) -> Self {
        Self::Parse(error)
    }
}

impl From<RenderError> for StencilError {
    fn from(error: RenderError) -> Self {
        Self::Render(error)
    }
}
