//! Debug-sink formatting helpers.
//!
//! `miniexpect.c`'s `debug_buffer()` escapes control characters into their C
//! escape forms and everything else non-printable into `\xNN`, so logged
//! traffic stays on one line and shows password prompts etc. without
//! corrupting the sink's terminal. `mexp_vprintf` additionally redacts
//! anything written via the password variant to the literal string
//! `(password redacted)`. Both behaviors are reproduced here verbatim.

/// Escape `bytes` the way the original's `debug_buffer` does: named escapes
/// for `\0 \a \b \f \n \r \t \v`, `\xNN` for other non-printable bytes,
/// everything else passed through as-is.
pub fn escape(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            0 => out.push_str("\\0"),
            0x07 => out.push_str("\\a"),
            0x08 => out.push_str("\\b"),
            0x0c => out.push_str("\\f"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x0b => out.push_str("\\v"),
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\x{b:02x}")),
        }
    }
    out
}

/// The fixed placeholder written to a debug sink in place of a password
/// argument, matching `mexp_printf_password`'s behavior exactly.
pub const REDACTED: &str = "(password redacted)";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printable_passes_through() {
        assert_eq!(escape(b"hello world"), "hello world");
    }

    #[test]
    fn control_chars_use_named_escapes() {
        assert_eq!(escape(b"a\nb\tc\0d"), "a\\nb\\tc\\0d");
    }

    #[test]
    fn other_bytes_use_hex_escape() {
        assert_eq!(escape(&[0x01, 0xff]), "\\x01\\xff");
    }
}
