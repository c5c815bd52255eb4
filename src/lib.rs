//! A hierarchical command registry with overload-aware dispatch.
//!
//! Commands live in a [`CommandTree`]: every path segment maps either to one
//! nested tree or to a set of [`Executable`] overloads. Once the tree is frozen
//! with [`CommandTree::init`], a token sequence such as `["math", "add", "1", "2"]`
//! is resolved to exactly one handler by [`CommandTree::execute`], picking among
//! overloads by argument count and, when that is not enough, by which overload's
//! [`parser`]s accept the tokens.
//!
//! The [`Interpreter`] wraps a frozen tree with a line lexer and an interactive
//! loop, and ships a small set of built-in commands.

mod builtin;
mod dispatch;
pub mod error;
pub mod executable;
mod interpreter;
pub mod lexer;
pub mod node;
pub mod parser;
pub mod tree;
pub mod value;

pub use error::{CreationError, ExecutionError, LexError, ParseError};
pub use executable::{Executable, ExecutableBuilder, Parameter};
/// The interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::Interpreter;
pub use node::{Node, NodeRef};
pub use tree::{CommandTree, DEFAULT_KEY};
pub use value::Value;
