//! The expect engine: THE CORE of the crate.
//!
//! Grounded in `miniexpect.c::mexp_expect` (verbatim algorithm) and the
//! teacher's `pty.rs`/`commands/run.rs` for the synchronous poll/read/EIO
//! style this is built out of (`poll_read`, `ReadOutcome::from_read_result`).
//! Every step below corresponds to a step in that function; see SPEC_FULL.md
//! §4.3.

use std::io;
use std::os::fd::AsRawFd;
use std::time::Instant;

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::read as nix_read;

use crate::regex_engine::{self, CompiledRegex, MatchData};
use crate::session::Session;

/// One pattern in the list passed to [`Session::expect`], paired with the
/// tag returned to the caller on a full match and the match-data block it
/// matches into.
///
/// The caller constructs the `CompiledRegex`/`MatchData` pair once (they're
/// not cheap to allocate) and reuses the same `RegexEntry` across many
/// `expect` calls, exactly as `miniexpect.c`'s call sites reuse one
/// `pcre2_match_data` per pattern for the life of a session.
pub struct RegexEntry<'a> {
    pub regex: &'a CompiledRegex,
    pub match_data: &'a mut MatchData,
    pub tag: i32,
    /// Extra PCRE2 match options OR'd in alongside the always-on
    /// `PCRE2_PARTIAL_SOFT`, e.g. anchoring a single call.
    pub options: u32,
}

impl<'a> RegexEntry<'a> {
    pub fn new(regex: &'a CompiledRegex, match_data: &'a mut MatchData, tag: i32) -> Self {
        RegexEntry {
            regex,
            match_data,
            tag,
            options: 0,
        }
    }
}

/// Outcome of a single [`Session::expect`] call.
#[derive(Debug)]
pub enum ExpectResult {
    /// One of the supplied regexes fully matched; carries its tag.
    Matched(i32),
    /// The child closed its end of the PTY (including the EIO-as-EOF case
    /// Linux reports once a PTY's last writer has exited).
    Eof,
    /// No regex fully matched before `timeout_ms` elapsed.
    Timeout,
    /// PCRE2 reported an error other than no-match/partial-match while
    /// scanning the regex list. The raw code is also stored on the session
    /// and retrievable via [`Session::last_regex_error`].
    RegexError(i32),
    /// A system call other than the read/poll EOF cases failed.
    Error(io::Error),
}

impl Session {
    /// Block until one of `regexes` fully matches the buffered child
    /// output, the child reaches EOF, or `timeout_ms` milliseconds elapse -
    /// whichever happens first.
    ///
    /// `regexes` may be empty or omitted to simply wait for more data or
    /// EOF without trying to match anything; this is used by callers that
    /// only care about timing, not content.
    pub fn expect(&mut self, regexes: Option<&mut [RegexEntry<'_>]>) -> ExpectResult {
        let mut no_regexes: [RegexEntry<'_>; 0] = [];
        let regexes = regexes.unwrap_or(&mut no_regexes);
        let start = Instant::now();

        if let Some(next) = self.next_match.take() {
            // Carry-over: drop already-consumed bytes, keep the rest, and
            // try a match against what's left before reading anything more.
            shift_buffer(&mut self.buffer, next);
            if let Some(result) = self.try_match(regexes) {
                return result;
            }
        } else {
            self.buffer.clear();
        }

        // Captured as a raw fd (Copy) rather than a borrow of `self.master`,
        // since the loop below needs `&mut self` for buffer growth and
        // match-data writes while the fd is still in use for poll/read.
        let raw_fd = match self.master.as_ref() {
            Some(fd) => fd.as_raw_fd(),
            None => {
                return ExpectResult::Error(io::Error::new(
                    io::ErrorKind::NotConnected,
                    "session is closed",
                ))
            }
        };

        loop {
            let elapsed_ms = start.elapsed().as_millis() as i64;
            let remaining_ms = if self.timeout_ms >= 0 {
                (self.timeout_ms - elapsed_ms).max(0)
            } else {
                // Negative timeout behaves identically to 0: a poll that
                // returns immediately. This matches the documented source
                // behavior rather than "block forever", which the negative
                // value suggests but the original never implements.
                0
            };

            if self.timeout_ms >= 0 && remaining_ms == 0 {
                return ExpectResult::Timeout;
            }

            // `PollTimeout` only holds a u16 of milliseconds (~65.5s); when
            // the real remaining timeout is larger than that, poll in
            // chunks and loop back rather than reporting a timeout at the
            // chunk boundary before the actual deadline has elapsed.
            let chunk_ms = remaining_ms.clamp(0, u16::MAX as i64) as u16;
            let poll_timeout = PollTimeout::from(chunk_ms);

            // SAFETY: raw_fd was obtained from `self.master`, which is not
            // closed or reassigned anywhere while `expect` holds `&mut self`.
            let borrowed = unsafe { std::os::fd::BorrowedFd::borrow_raw(raw_fd) };
            let mut fds = [PollFd::new(borrowed, PollFlags::POLLIN)];
            let poll_result = nix::poll::poll(&mut fds, poll_timeout);

            match poll_result {
                Ok(0) => {
                    if self.timeout_ms < 0 {
                        // Degenerate non-blocking poll: no deadline to wait
                        // out, so an empty poll is the timeout.
                        return ExpectResult::Timeout;
                    }
                    // Only a chunk boundary; the real deadline (checked at
                    // the top of the loop) hasn't passed yet.
                    continue;
                }
                Ok(_) => {}
                // A signal interrupting poll is surfaced as an error, not
                // retried - the caller owns cancellation via signals and
                // must restart the call itself if it wants to continue.
                Err(e) => return ExpectResult::Error(io::Error::from_raw_os_error(e as i32)),
            }

            // Grow the buffer before reading, mirroring the source's
            // realloc-when-nearly-full step.
            let old_len = self.buffer.len();
            self.buffer.resize(old_len + self.read_size, 0);

            let read_result = {
                let slice = &mut self.buffer[old_len..old_len + self.read_size];
                nix_read(raw_fd, slice)
            };

            match read_result {
                Ok(0) => {
                    self.buffer.truncate(old_len);
                    return ExpectResult::Eof;
                }
                Ok(n) => {
                    self.buffer.truncate(old_len + n);
                    self.debug_log_read(old_len);
                }
                Err(Errno::EIO) => {
                    // Linux reports EIO once the PTY's last writer has
                    // exited and the kernel tears down the slave; treat it
                    // identically to a clean EOF, not an error.
                    self.buffer.truncate(old_len);
                    return ExpectResult::Eof;
                }
                // Every other read error, including EINTR and EAGAIN, is
                // surfaced as-is rather than retried - same policy as the
                // poll error above.
                Err(e) => {
                    self.buffer.truncate(old_len);
                    return ExpectResult::Error(io::Error::from_raw_os_error(e as i32));
                }
            }

            if let Some(result) = self.try_match(regexes) {
                return result;
            }
        }
    }

    /// Scan `regexes` in order against the whole current buffer. Returns
    /// `Some(result)` if the loop in `expect` should stop now (a full match
    /// or a PCRE2 error), or `None` to keep polling for more data. Ties
    /// between regexes that would both match are broken by list order - the
    /// first entry that reports a full match wins, matching the source's
    /// sequential scan.
    fn try_match(&mut self, regexes: &mut [RegexEntry<'_>]) -> Option<ExpectResult> {
        let mut can_clear_buffer = true;

        for entry in regexes.iter_mut() {
            let code =
                entry
                    .regex
                    .match_partial(&self.buffer, entry.options, Some(entry.match_data));

            if regex_engine::is_full_match(code) {
                self.next_match = entry.match_data.match_end().or(Some(self.buffer.len()));
                return Some(ExpectResult::Matched(entry.tag));
            }

            match code {
                c if c == regex_engine::ERROR_NOMATCH => continue,
                c if c == regex_engine::ERROR_PARTIAL => {
                    can_clear_buffer = false;
                    continue;
                }
                other => {
                    self.last_pcre_error = other;
                    return Some(ExpectResult::RegexError(other));
                }
            }
        }

        if can_clear_buffer {
            self.buffer.clear();
        }
        None
    }

    fn debug_log_read(&mut self, from: usize) {
        if self.debug_sink.is_some() {
            let escaped = crate::debug::escape(&self.buffer[from..]);
            self.debug_log(&format!("received: {escaped}"));
        }
    }

    /// Close the session: drop the master fd and block-wait for the child
    /// to exit, returning its decoded wait status.
    ///
    /// A SIGHUP-terminated child (the expected outcome when the master is
    /// closed with the child still running) is not treated as an error -
    /// the caller is responsible for deciding whether that status is
    /// acceptable, exactly as `mexp_close` leaves that judgment to its
    /// caller.
    pub fn close(mut self) -> io::Result<WaitStatus> {
        self.master.take();
        let pid = self
            .pid
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "session already closed"))?;
        waitpid(pid, None).map_err(|e| io::Error::from_raw_os_error(e as i32))
    }
}

/// Drop the first `consumed` bytes of `buffer`, keeping the rest in place.
/// `consumed == buffer.len()` (all bytes consumed) and `consumed == 0` (none
/// consumed) are both valid and equivalent to the spec's documented
/// "next_match == len" edge case - the resulting buffer is just however much
/// is left, with no special-casing needed.
pub(crate) fn shift_buffer(buffer: &mut Vec<u8>, consumed: usize) {
    let consumed = consumed.min(buffer.len());
    buffer.drain(0..consumed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regex_engine::CompiledRegex;
    use crate::spawn::spawn_argv;

    #[test]
    fn echo_matches_expected_tag() {
        let mut session = spawn_argv("echo", &["echo", "hello world"]).expect("spawn echo");
        let re = CompiledRegex::compile(b"hello").unwrap();
        let mut md = MatchData::for_pattern(&re);
        let mut entries = [RegexEntry::new(&re, &mut md, 42)];
        match session.expect(Some(&mut entries)) {
            ExpectResult::Matched(tag) => assert_eq!(tag, 42),
            other => panic!("expected Matched, got {other:?}"),
        }
        let _ = session.close();
    }

    #[test]
    fn immediate_eof_on_true() {
        let mut session = spawn_argv("true", &["true"]).expect("spawn true");
        loop {
            match session.expect(None) {
                ExpectResult::Eof => break,
                ExpectResult::Timeout => panic!("unexpected timeout waiting for eof"),
                other => panic!("unexpected result: {other:?}"),
            }
        }
        let _ = session.close();
    }

    #[test]
    fn timeout_when_nothing_matches() {
        let mut session = spawn_argv("sleep", &["sleep", "1"]).expect("spawn sleep");
        session.timeout_ms = 50;
        let re = CompiledRegex::compile(b"never-appears").unwrap();
        let mut md = MatchData::for_pattern(&re);
        let mut entries = [RegexEntry::new(&re, &mut md, 1)];
        match session.expect(Some(&mut entries)) {
            ExpectResult::Timeout => {}
            other => panic!("expected Timeout, got {other:?}"),
        }
        let _ = session.close();
    }

    #[test]
    fn sequential_matches_preserve_order() {
        let mut session =
            spawn_argv("echo", &["echo", "multimatchingstrs"]).expect("spawn echo");
        let patterns: [(&[u8], i32); 5] = [
            (b"multi", 100),
            (b"match", 101),
            (b"ing", 102),
            (b"str", 103),
            (b"s", 104),
        ];

        for (pattern, tag) in patterns {
            let re = CompiledRegex::compile(pattern).unwrap();
            let mut md = MatchData::for_pattern(&re);
            let mut entries = [RegexEntry::new(&re, &mut md, tag)];
            match session.expect(Some(&mut entries)) {
                ExpectResult::Matched(got) => assert_eq!(got, tag),
                other => panic!("expected Matched({tag}), got {other:?}"),
            }
        }
        let _ = session.close();
    }

    mod buffer_carry_over {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// `shift_buffer` should behave exactly like the naive "drop a
            /// prefix, keep a suffix" model for any consumed offset,
            /// including ones that run past the buffer's end (clamped, per
            /// the documented `next_match == len` equivalence in
            /// SPEC_FULL.md §9).
            #[test]
            fn matches_naive_model(
                bytes in proptest::collection::vec(any::<u8>(), 0..256),
                consumed in 0usize..512,
            ) {
                let mut actual = bytes.clone();
                shift_buffer(&mut actual, consumed);

                let clamped = consumed.min(bytes.len());
                let expected = bytes[clamped..].to_vec();

                prop_assert_eq!(actual, expected);
            }

            /// Shifting twice by `a` then `b` is the same as shifting once
            /// by `a + b` (both clamped to the buffer length), since
            /// carry-over is just repeated prefix removal.
            #[test]
            fn is_associative(
                bytes in proptest::collection::vec(any::<u8>(), 0..256),
                a in 0usize..128,
                b in 0usize..128,
            ) {
                let mut twice = bytes.clone();
                shift_buffer(&mut twice, a);
                shift_buffer(&mut twice, b);

                let mut once = bytes.clone();
                shift_buffer(&mut once, a.saturating_add(b));

                prop_assert_eq!(twice, once);
            }
        }
    }
}
