//! Log into a remote host over `ssh` by answering its password prompt.
//!
//! Rust-idiomatic counterpart to `examples/original_source/example-sshpass.c`:
//! spawn `ssh` (or any command that prompts for a password), wait for
//! `assword`, send the password without echoing it to the debug sink, wait
//! for a shell prompt, run a smoke-test command, then exit and wait for the
//! connection to close.

use anyhow::{bail, Context, Result};
use clap::Parser;

use ptyexpect::expect::{ExpectResult, RegexEntry};
use ptyexpect::regex_engine::{CompiledRegex, MatchData};
use ptyexpect::spawn::spawn_argv;

#[derive(Parser)]
#[command(
    about = "Run a command (e.g. ssh) and answer its password prompt",
    override_usage = "expect-sshpass [-d] PASSWORD COMMAND [ARGS...]"
)]
struct Args {
    /// Print debug traffic (sent/received bytes, password redacted) to stderr.
    #[arg(short = 'd', long)]
    debug: bool,

    /// Password to send at the first prompt matching "assword".
    password: String,

    /// Command to run, e.g. `ssh` with its own arguments.
    #[arg(required = true, num_args = 1..)]
    command: Vec<String>,
}

const TAG_PASSWORD: i32 = 100;
const TAG_PROMPT: i32 = 101;
const TAG_HELLO: i32 = 100;

fn main() -> Result<()> {
    let args = Args::parse();
    let argv: Vec<&str> = args.command.iter().map(String::as_str).collect();

    println!("starting command ...");
    let mut session = spawn_argv(argv[0], &argv).context("spawning command")?;

    if args.debug {
        session.set_debug_sink(Some(Box::new(std::io::stderr())));
    }

    let password_re = CompiledRegex::compile(b"assword").context("compiling password regex")?;
    let mut password_md = MatchData::for_pattern(&password_re);

    let mut first_wait = [RegexEntry::new(&password_re, &mut password_md, TAG_PASSWORD)];
    match session.expect(Some(&mut first_wait)) {
        ExpectResult::Matched(TAG_PASSWORD) => {}
        ExpectResult::Matched(other) => bail!("unexpected tag {other}"),
        ExpectResult::Eof => bail!("command closed the connection unexpectedly"),
        ExpectResult::Timeout => bail!("timeout before reaching the password prompt"),
        ExpectResult::RegexError(code) => bail!("PCRE error: {code}"),
        ExpectResult::Error(e) => return Err(e).context("system error waiting for prompt"),
    }

    println!("sending the password ...");
    session
        .printf_password(&args.password)
        .and_then(|_| session.printf("\n"))
        .context("sending password")?;

    let prompt_re = CompiledRegex::compile(b"[#$]").context("compiling prompt regex")?;
    let mut prompt_md = MatchData::for_pattern(&prompt_re);
    let mut password_md2 = MatchData::for_pattern(&password_re);

    let mut second_wait = [
        RegexEntry::new(&password_re, &mut password_md2, TAG_PASSWORD),
        RegexEntry::new(&prompt_re, &mut prompt_md, TAG_PROMPT),
    ];
    match session.expect(Some(&mut second_wait)) {
        ExpectResult::Matched(TAG_PASSWORD) => {
            bail!("asked for the password again - it was probably wrong")
        }
        ExpectResult::Matched(TAG_PROMPT) => {}
        ExpectResult::Matched(other) => bail!("unexpected tag {other}"),
        ExpectResult::Eof => bail!("command closed the connection unexpectedly"),
        ExpectResult::Timeout => bail!("timeout before reaching the shell prompt"),
        ExpectResult::RegexError(code) => bail!("PCRE error: {code}"),
        ExpectResult::Error(e) => return Err(e).context("system error waiting for prompt"),
    }

    println!("sending a test command ...");
    session
        .printf("echo h''ello\n")
        .context("sending test command")?;

    let hello_re = CompiledRegex::compile(b"hello").context("compiling hello regex")?;
    let mut hello_md = MatchData::for_pattern(&hello_re);
    let mut third_wait = [RegexEntry::new(&hello_re, &mut hello_md, TAG_HELLO)];
    match session.expect(Some(&mut third_wait)) {
        ExpectResult::Matched(_) => {}
        ExpectResult::Eof => bail!("command closed the connection unexpectedly"),
        ExpectResult::Timeout => bail!("timeout before reading command output"),
        ExpectResult::RegexError(code) => bail!("PCRE error: {code}"),
        ExpectResult::Error(e) => return Err(e).context("system error reading command output"),
    }

    println!("sending the exit command ...");
    session.printf("exit\n").context("sending exit command")?;

    match session.expect(None) {
        ExpectResult::Eof => {}
        ExpectResult::Timeout => bail!("timeout before the connection closed"),
        ExpectResult::RegexError(code) => bail!("unexpected regex result: {code}"),
        ExpectResult::Error(e) => return Err(e).context("system error waiting for close"),
        ExpectResult::Matched(tag) => bail!("unexpected match ({tag}) waiting for close"),
    }

    let status = session.close().context("waiting for command to exit")?;
    match status {
        nix::sys::wait::WaitStatus::Exited(_, 0) => {
            println!("test was successful");
            Ok(())
        }
        other => bail!("bad exit status from subprocess: {other:?}"),
    }
}
