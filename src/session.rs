//! The session handle: everything one spawned child owns.
//!
//! Field-for-field this is `mexp_h` from `miniexpect.h`, translated to
//! RAII-owned Rust types (see SPEC_FULL.md §3 for the mapping table). The
//! struct itself is intentionally dumb - all behavior lives in `spawn`
//! (construction), `expect` (the core loop), and `writer` (output methods).

use std::io::Write;
use std::os::fd::OwnedFd;

use nix::unistd::Pid;

/// A spawned child's PTY connection and expect-loop state.
///
/// Dropping a `Session` without calling [`Session::close`] best-effort
/// closes the master fd but does **not** wait on the child, since `Drop`
/// cannot return the wait status. Callers that care about the exit status
/// (most callers) should call `close` explicitly.
pub struct Session {
    pub(crate) master: Option<OwnedFd>,
    pub(crate) pid: Option<Pid>,

    /// Milliseconds; negative is treated as 0 (non-blocking poll), matching
    /// the documented source behavior. Default 60_000.
    pub timeout_ms: i64,

    /// Bytes requested per read, and the amount the buffer is grown by when
    /// it's within that many bytes of full. Default 1024.
    pub read_size: usize,

    pub(crate) buffer: Vec<u8>,

    /// Carry-over point from the previous `expect` call: bytes before this
    /// offset have already been consumed and should not be matched again.
    pub(crate) next_match: Option<usize>,

    /// Last raw PCRE2 return code seen by `expect`, for callers that want
    /// the underlying engine error after an `ExpectResult::RegexError`.
    pub(crate) last_pcre_error: i32,

    pub(crate) debug_sink: Option<Box<dyn Write + Send>>,
}

impl Session {
    pub(crate) fn new(master: OwnedFd, pid: Pid) -> Self {
        Session {
            master: Some(master),
            pid: Some(pid),
            timeout_ms: 60_000,
            read_size: 1024,
            buffer: Vec::new(),
            next_match: None,
            last_pcre_error: 0,
            debug_sink: None,
        }
    }

    /// The last raw PCRE2 return code observed during matching. Only
    /// meaningful after `expect` returns `ExpectResult::RegexError`.
    pub fn last_regex_error(&self) -> i32 {
        self.last_pcre_error
    }

    /// Attach (or detach) a debug sink. Every byte written to or read from
    /// the child, plus session-lifecycle notes, is appended here via
    /// `crate::debug`.
    pub fn set_debug_sink(&mut self, sink: Option<Box<dyn Write + Send>>) {
        self.debug_sink = sink;
    }

    /// The child's process id, if the session hasn't been closed yet.
    pub fn pid(&self) -> Option<Pid> {
        self.pid
    }

    pub(crate) fn debug_log(&mut self, text: &str) {
        if let Some(sink) = self.debug_sink.as_mut() {
            let _ = writeln!(sink, "{text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::FromRawFd;

    #[test]
    fn new_session_has_spec_defaults() {
        // Pid::this() is a stand-in; these tests only check field defaults,
        // not process semantics.
        let fd = nix::unistd::dup(0).expect("dup stdin for test");
        let session = Session::new(unsafe { OwnedFd::from_raw_fd(fd) }, Pid::this());
        assert_eq!(session.timeout_ms, 60_000);
        assert_eq!(session.read_size, 1024);
        assert!(session.buffer.is_empty());
        assert_eq!(session.next_match, None);
    }
}
