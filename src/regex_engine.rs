//! Thin safe wrapper around PCRE2's 8-bit API.
//!
//! The expect loop (`crate::expect`) needs two things the `regex` crate does
//! not expose: PCRE2_PARTIAL_SOFT matching (so a prefix of a possible match
//! keeps the buffer alive instead of being reported as "no match") and raw
//! ovector access (so a full match's end offset becomes the session's
//! carry-over point). `pcre2-sys` is the same library `miniexpect.c` links
//! against, so this module binds it directly rather than going through a
//! higher-level regex crate that would have to be extended to expose these.
//!
//! Patterns are matched against raw bytes, not validated UTF-8 - child
//! output may contain embedded NULs or invalid sequences and the spec
//! requires those to be preserved rather than rejected.

use std::ptr;

use pcre2_sys::{
    pcre2_code_8, pcre2_code_free_8, pcre2_compile_8, pcre2_get_error_message_8,
    pcre2_get_ovector_pointer_8, pcre2_match_8, pcre2_match_data_create_from_pattern_8,
    pcre2_match_data_free_8, pcre2_match_data_8, PCRE2_ERROR_NOMATCH, PCRE2_ERROR_PARTIAL,
    PCRE2_PARTIAL_SOFT, PCRE2_UNSET,
};

use crate::error::RegexError;

/// Raw PCRE2 return code meaning "the subject fully matched".
///
/// PCRE2 returns values >= 0 on a full match (the exact value is the number
/// of captured substrings + 1, or 0 if the ovector was too small - either
/// way, non-negative means matched).
pub fn is_full_match(code: i32) -> bool {
    code >= 0
}

pub const ERROR_NOMATCH: i32 = PCRE2_ERROR_NOMATCH;
pub const ERROR_PARTIAL: i32 = PCRE2_ERROR_PARTIAL;

/// A compiled regular expression, owned by the caller and borrowed by
/// `expect` for the duration of a single call.
pub struct CompiledRegex {
    code: *mut pcre2_code_8,
}

// SAFETY: a compiled pcre2_code is immutable after compilation and PCRE2's
// own documentation states that a pcre2_code may be used concurrently by
// multiple threads provided each thread uses its own match data block,
// which is exactly how this crate uses it (one MatchData per Session).
unsafe impl Send for CompiledRegex {}
unsafe impl Sync for CompiledRegex {}

impl CompiledRegex {
    /// Compile a pattern against raw bytes (no UTF-8 validation, no
    /// implicit anchoring).
    pub fn compile(pattern: &[u8]) -> Result<Self, RegexError> {
        let mut errorcode: i32 = 0;
        let mut erroroffset: usize = 0;

        // SAFETY: pattern is a valid byte slice for the duration of the
        // call; pcre2_compile_8 does not retain the pointer afterward.
        let code = unsafe {
            pcre2_compile_8(
                pattern.as_ptr(),
                pattern.len(),
                0,
                &mut errorcode,
                &mut erroroffset,
                ptr::null_mut(),
            )
        };

        if code.is_null() {
            return Err(RegexError {
                code: errorcode,
                offset: erroroffset,
                message: error_message(errorcode),
            });
        }

        Ok(CompiledRegex { code })
    }

    /// Run a single match attempt with `PCRE2_PARTIAL_SOFT` always enabled,
    /// as required by the expect loop's partial-match awareness (spec
    /// §4.3). `extra_options` are OR'd in alongside it, matching the
    /// per-regex option bits in the distilled spec's regex entry.
    ///
    /// Returns the raw PCRE2 return code: >= 0 on a full match,
    /// `ERROR_NOMATCH`, `ERROR_PARTIAL`, or some other negative error code.
    pub fn match_partial(
        &self,
        subject: &[u8],
        extra_options: u32,
        match_data: Option<&mut MatchData>,
    ) -> i32 {
        let options = PCRE2_PARTIAL_SOFT | extra_options;
        let md = match_data.map(|m| m.raw).unwrap_or(ptr::null_mut());

        // SAFETY: self.code is a valid compiled pattern for the lifetime of
        // `self`; subject is a valid byte slice for the call; md is either
        // null or a valid match data block sized for this pattern.
        unsafe {
            pcre2_match_8(
                self.code,
                subject.as_ptr(),
                subject.len(),
                0,
                options,
                md,
                ptr::null_mut(),
            )
        }
    }
}

impl Drop for CompiledRegex {
    fn drop(&mut self) {
        // SAFETY: self.code was created by pcre2_compile_8 and has not been
        // freed yet (each CompiledRegex owns exactly one pcre2_code).
        unsafe { pcre2_code_free_8(self.code) };
    }
}

/// Capture-group storage, constructed once and reused across `expect`
/// calls, as the distilled spec requires ("the caller constructs once,
/// reuses across expect calls, and owns").
pub struct MatchData {
    raw: *mut pcre2_match_data_8,
}

// SAFETY: a pcre2_match_data block is only ever accessed through &mut
// MatchData in this crate, so there is no shared mutable state to race on.
unsafe impl Send for MatchData {}

impl MatchData {
    /// Allocate match data sized to the given pattern's capture count, as
    /// the original `mexp_expect` call sites do
    /// (`pcre2_match_data_create_from_pattern`).
    pub fn for_pattern(regex: &CompiledRegex) -> Self {
        // SAFETY: regex.code is a valid compiled pattern.
        let raw =
            unsafe { pcre2_match_data_create_from_pattern_8(regex.code, ptr::null_mut()) };
        assert!(!raw.is_null(), "pcre2_match_data_create_from_pattern failed");
        MatchData { raw }
    }

    /// The end offset of capture group 0 (the whole match), or `None` if
    /// the ovector doesn't have one (e.g. no match has been run yet, or the
    /// end offset is `PCRE2_UNSET`).
    pub fn match_end(&self) -> Option<usize> {
        // SAFETY: self.raw is valid for the lifetime of self.
        let ovector = unsafe { pcre2_get_ovector_pointer_8(self.raw) };
        if ovector.is_null() {
            return None;
        }
        // SAFETY: every match data block has room for at least one pair.
        let end = unsafe { *ovector.add(1) };
        if end == PCRE2_UNSET {
            None
        } else {
            Some(end)
        }
    }
}

impl Drop for MatchData {
    fn drop(&mut self) {
        // SAFETY: self.raw was created by pcre2_match_data_create_from_pattern_8
        // and has not been freed yet.
        unsafe { pcre2_match_data_free_8(self.raw) };
    }
}

fn error_message(code: i32) -> String {
    let mut buf = [0u8; 256];
    // SAFETY: buf is a valid, appropriately-sized output buffer.
    let len = unsafe { pcre2_get_error_message_8(code, buf.as_mut_ptr(), buf.len()) };
    if len < 0 {
        return format!("unknown pcre2 error {code}");
    }
    String::from_utf8_lossy(&buf[..len as usize]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_simple_pattern() {
        assert!(CompiledRegex::compile(b"hello").is_ok());
    }

    #[test]
    fn rejects_invalid_pattern() {
        let err = CompiledRegex::compile(b"(unclosed").unwrap_err();
        assert!(err.message.len() > 0 || err.code != 0);
    }

    #[test]
    fn full_match_reports_end_offset() {
        let re = CompiledRegex::compile(b"multi").unwrap();
        let mut md = MatchData::for_pattern(&re);
        let code = re.match_partial(b"multimatchingstrs", 0, Some(&mut md));
        assert!(is_full_match(code));
        assert_eq!(md.match_end(), Some(5));
    }

    #[test]
    fn partial_match_reported_at_buffer_end() {
        let re = CompiledRegex::compile(b"abcdef").unwrap();
        let mut md = MatchData::for_pattern(&re);
        let code = re.match_partial(b"xxabcd", 0, Some(&mut md));
        assert_eq!(code, ERROR_PARTIAL);
    }

    #[test]
    fn no_match_reported() {
        let re = CompiledRegex::compile(b"zzz").unwrap();
        let mut md = MatchData::for_pattern(&re);
        let code = re.match_partial(b"abc", 0, Some(&mut md));
        assert_eq!(code, ERROR_NOMATCH);
    }

    #[test]
    fn works_without_match_data() {
        let re = CompiledRegex::compile(b"abc").unwrap();
        let code = re.match_partial(b"xxabc", 0, None);
        assert!(is_full_match(code));
    }
}
