pub mod ast;
mod config;
mod engine;
mod error;
mod function;
mod interface;
mod lexer;
mod parser;
mod renderer;
mod template;
mod token;

// Crate-level imports to make convienent imports for the rest of the library.
pub(crate) use error::StencilResult;

// Public exports.
pub use config::{LexerConfig, RenderConfig};
pub use engine::Engine;
pub use error::{
    ParseError, ParseErrorKind, RenderError, RenderErrorKind, SourceLocation, StencilError,
};
pub use function::{Associativity, CallbackFunction, FunctionData, FunctionRegistry, Operation};
pub use interface::TemplateLoader;
pub use template::Template;
