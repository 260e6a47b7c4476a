//! Parsing and compilation for Protocol Buffers sources.
//!
//! The parser is tolerant: syntax errors are reported through a
//! [`Reporter`] and parsing continues with a best-effort AST. The
//! [`Compiler`] resolves a file's import closure through a [`Resolver`]
//! and populates a shared [`Symbols`] table.

mod compile;
mod lexer;
mod parser;
mod report;
mod symbols;
mod validate;

pub use compile::{CompileError, Compiler, LinkedFile, ResolveError, Resolver};
pub use lexer::{tokenize, SpannedToken, Token};
pub use parser::parse;
pub use report::{ErrorWithSpan, Handler, NoopReporter, ParseAborted, Reporter};
pub use symbols::{SymbolKind, SymbolSpan, Symbols};
pub use validate::{result_from_ast, DeclaredSymbol, FileResult};
