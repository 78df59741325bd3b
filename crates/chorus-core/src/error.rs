//! Typed errors that surface as plain-text chat replies

use thiserror::Error;

/// Malformed command input. The message carries a usage hint and is meant to
/// be sent back to the user verbatim; it never enters the decision pipeline.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command '/{0}', try /help")]
    UnknownCommand(String),

    #[error("usage: /{command} <agent>")]
    MissingAgent { command: String },

    #[error("could not read duration '{given}', usage: /invite <agent> [for <N> hours]")]
    BadDuration { given: String },
}

/// Rejected invitation request
#[derive(Debug, Error)]
pub enum InviteError {
    #[error("unknown agent '{0}'")]
    UnknownAgent(String),

    #[error("invite duration must be positive")]
    InvalidDuration,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
