// Pedantic lints we've chosen to allow:
// - missing_panics_doc: Many functions use .expect() for internal invariants
// - missing_errors_doc: Error types are self-documenting
// - too_many_lines: Some complex functions benefit from being cohesive
// - cast_precision_loss/cast_sign_loss/cast_possible_wrap: Safe in context
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]

//! # ptyexpect
//!
//! Drive an interactive child process through a pseudo-terminal, matching
//! its output against regular expressions and injecting input in response -
//! the same job `expect`/Tcl or the `miniexpect` C library do, built around
//! a synchronous, single-threaded poll/read loop with streaming partial-match
//! awareness.
//!
//! ## Quick start
//!
//! ```no_run
//! use ptyexpect::regex_engine::{CompiledRegex, MatchData};
//! use ptyexpect::expect::{ExpectResult, RegexEntry};
//! use ptyexpect::spawn::spawn_argv;
//!
//! let mut session = spawn_argv("ls", &["ls", "--version"]).unwrap();
//!
//! let re = CompiledRegex::compile(b"ls \\(GNU coreutils\\) (\\d+\\.\\d+)").unwrap();
//! let mut md = MatchData::for_pattern(&re);
//! let mut entries = [RegexEntry::new(&re, &mut md, 1)];
//!
//! match session.expect(Some(&mut entries)) {
//!     ExpectResult::Matched(tag) => println!("matched tag {tag}"),
//!     other => println!("unexpected: {other:?}"),
//! }
//!
//! let _ = session.close();
//! ```
//!
//! ## What this crate is not
//!
//! There is no Telnet/SSH layer, no scripting language, no terminal
//! emulation, and no buffering of the child's complete output history - the
//! buffer only ever holds bytes not yet consumed by a match. One `Session`
//! drives exactly one child; there is no cross-process synchronization.

pub mod debug;
pub mod error;
pub mod expect;
pub mod pty;
pub mod regex_engine;
pub mod session;
pub mod spawn;
pub mod writer;

pub use error::{RegexError, SpawnError};
pub use expect::{ExpectResult, RegexEntry};
pub use regex_engine::{CompiledRegex, MatchData};
pub use session::Session;
pub use spawn::{spawn_argv, spawn_argv_with_flags, SpawnFlags};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        CompiledRegex, ExpectResult, MatchData, RegexEntry, RegexError, Session, SpawnError,
        SpawnFlags,
    };
}
