//! Spawn `echo multimatchingstrs` and expect five overlapping substrings in
//! sequence, one `expect` call per substring.
//!
//! Rust-idiomatic counterpart to
//! `examples/original_source/test-multi-match.c`: the same child, the same
//! five patterns, the same expected tag order (100..104), asserted one call
//! at a time rather than via a single combined regex list.

use anyhow::{bail, Context, Result};

use ptyexpect::expect::{ExpectResult, RegexEntry};
use ptyexpect::regex_engine::{CompiledRegex, MatchData};
use ptyexpect::spawn::spawn_argv;

const PATTERNS: [(&[u8], i32); 5] = [
    (b"multi", 100),
    (b"match", 101),
    (b"ing", 102),
    (b"str", 103),
    (b"s", 104),
];

fn main() -> Result<()> {
    let mut session =
        spawn_argv("echo", &["echo", "multimatchingstrs"]).context("spawning echo")?;

    for (pattern, expected_tag) in PATTERNS {
        let regex = CompiledRegex::compile(pattern)
            .with_context(|| format!("compiling pattern {:?}", String::from_utf8_lossy(pattern)))?;
        let mut match_data = MatchData::for_pattern(&regex);
        let mut entries = [RegexEntry::new(&regex, &mut match_data, expected_tag)];

        match session.expect(Some(&mut entries)) {
            ExpectResult::Matched(tag) if tag == expected_tag => {
                println!("matched tag {tag} ({:?})", String::from_utf8_lossy(pattern));
            }
            ExpectResult::Matched(other) => bail!("expected tag {expected_tag}, got {other}"),
            ExpectResult::Eof => bail!("child exited before matching {expected_tag}"),
            ExpectResult::Timeout => bail!("timed out waiting for tag {expected_tag}"),
            ExpectResult::RegexError(code) => bail!("regex engine error: {code}"),
            ExpectResult::Error(e) => {
                return Err(e).with_context(|| format!("system error matching {expected_tag}"))
            }
        }
    }

    let status = session.close().context("waiting for echo to exit")?;
    println!("all five tags matched in order; exit status: {status:?}");
    Ok(())
}
