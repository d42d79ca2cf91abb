//! Error types for spawning, regex compilation, and terminal setup.
//!
//! The expect loop itself does not use these directly - its terminal
//! outcomes are the `ExpectResult` variants in [`crate::expect`], which wrap
//! `std::io::Error` for the system-error case. These types cover the
//! failure paths that happen before a session exists at all.

use thiserror::Error;

/// Failure while allocating a PTY pair or forking/exec'ing the child.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to allocate pseudo-terminal: {0}")]
    PtyAlloc(#[source] std::io::Error),

    #[error("fork failed: {0}")]
    Fork(#[source] std::io::Error),

    #[error("no command given")]
    EmptyCommand,

    #[error("argument contains a NUL byte: {0:?}")]
    NulByte(String),
}

/// Failure compiling a PCRE2 pattern.
#[derive(Debug, Error)]
#[error("invalid pattern at offset {offset}: {message} (pcre2 error {code})")]
pub struct RegexError {
    pub(crate) code: i32,
    pub(crate) offset: usize,
    pub(crate) message: String,
}
