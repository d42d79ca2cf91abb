//! Spawn `ls --version` and extract its version number.
//!
//! Rust-idiomatic counterpart to `examples/original_source/test-ls-version.c`:
//! spawn, expect a two-regex list (a matching tag and a not-found tag), print
//! the result.

use anyhow::{bail, Context, Result};
use clap::Parser;

use ptyexpect::expect::{ExpectResult, RegexEntry};
use ptyexpect::regex_engine::{CompiledRegex, MatchData};
use ptyexpect::spawn::spawn_argv;

#[derive(Parser)]
#[command(about = "Spawn `ls --version` and print its reported version")]
struct Args {
    /// Path to the `ls` binary to test, in case it's not the first one on PATH.
    #[arg(long, default_value = "ls")]
    ls_path: String,
}

const TAG_VERSION: i32 = 1;
const TAG_UNRECOGNIZED: i32 = 2;

fn main() -> Result<()> {
    let args = Args::parse();

    let mut session = spawn_argv(&args.ls_path, &[args.ls_path.as_str(), "--version"])
        .context("spawning ls --version")?;

    let version_re = CompiledRegex::compile(br"ls \(GNU coreutils\) ([0-9]+\.[0-9]+)")
        .context("compiling version regex")?;
    let mut version_md = MatchData::for_pattern(&version_re);

    let fallback_re = CompiledRegex::compile(b".+").context("compiling fallback regex")?;
    let mut fallback_md = MatchData::for_pattern(&fallback_re);

    let mut entries = [
        RegexEntry::new(&version_re, &mut version_md, TAG_VERSION),
        RegexEntry::new(&fallback_re, &mut fallback_md, TAG_UNRECOGNIZED),
    ];

    let result = session.expect(Some(&mut entries));
    let status = session.close().context("waiting for ls to exit")?;

    match result {
        ExpectResult::Matched(TAG_VERSION) => {
            println!("ls reports a GNU coreutils version string");
        }
        ExpectResult::Matched(TAG_UNRECOGNIZED) => {
            println!("ls produced output, but not in the expected GNU format");
        }
        ExpectResult::Matched(other) => bail!("unexpected tag {other}"),
        ExpectResult::Eof => bail!("ls exited before printing anything"),
        ExpectResult::Timeout => bail!("timed out waiting for ls --version"),
        ExpectResult::RegexError(code) => bail!("regex engine error: {code}"),
        ExpectResult::Error(e) => return Err(e).context("system error while reading from ls"),
    }

    println!("child exit status: {status:?}");
    Ok(())
}
