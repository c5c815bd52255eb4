use thiserror::Error;

/// Errors raised while a command tree is being built or initialized.
///
/// These indicate a mistake in registration code, never bad user input. A
/// caller should treat them as fatal for the registry that produced them.
#[derive(Debug, Error)]
pub enum CreationError {
    #[error("command tree is already initialized")]
    Initialized,

    #[error("key '{key}' is already occupied")]
    TreeConflict { key: String },

    #[error("ambiguous overload '{name}' under key '{key}'")]
    Ambiguous { key: String, name: String },

    #[error("greedy parameter of '{name}' must be the last one")]
    GreedyNotLast { name: String },

    #[error("a command needs at least one name")]
    NoNames,

    #[error("command '{name}' has no handler")]
    NoHandler { name: String },
}

/// Errors raised while dispatching a token sequence.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Path absent, no overload with a matching arity, or no overload whose
    /// parameters all parse. The three cases are deliberately indistinguishable.
    #[error("command not found: {path}")]
    NotFound { path: String },

    #[error("{name}: invalid argument #{index}: {message}")]
    InvalidArgument {
        name: String,
        index: usize,
        message: String,
    },

    #[error(transparent)]
    Handler(#[from] anyhow::Error),
}

/// Failure of an argument parser to turn tokens into a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ParseError(pub String);

impl ParseError {
    /// Wrap a human readable reason.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors produced while splitting a command line into tokens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("unterminated quote")]
    UnfinishedQuote,

    #[error("dangling escape at end of line")]
    DanglingEscape,
}
