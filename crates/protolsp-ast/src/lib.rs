//! AST for the Protocol Buffers IDL.
//!
//! Nodes carry 1-based source positions (see [`SourcePos`]); byte offsets
//! ride along so callers can slice the original source. The tree is walked
//! parent-first in source order via [`walk`] and a [`Visitor`].

mod nodes;
mod span;
mod visit;

pub use nodes::*;
pub use span::{SourcePos, SourceSpan};
pub use visit::{walk, Node, Visitor};
