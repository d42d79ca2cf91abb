//! End-to-end scenarios against real spawned subprocesses, one per
//! concrete case named in the spec's testable-properties section.

use nix::sys::wait::WaitStatus;

use ptyexpect::expect::{ExpectResult, RegexEntry};
use ptyexpect::regex_engine::{CompiledRegex, MatchData};
use ptyexpect::spawn::spawn_argv;

#[test]
fn spawn_cat_then_close_immediately() {
    let session = spawn_argv("cat", &["cat"]).expect("spawn cat");
    let status = session.close().expect("close");
    // cat blocks on stdin; closing the master hangs it up.
    assert!(matches!(
        status,
        WaitStatus::Signaled(_, nix::sys::signal::Signal::SIGHUP, _)
            | WaitStatus::Exited(_, _)
    ));
}

#[test]
fn spawn_ls_version_matches_expected_tag() {
    let mut session = spawn_argv("echo", &["echo", "ls (GNU coreutils) 9.4"])
        .expect("spawn echo standing in for ls --version");

    let version_re = CompiledRegex::compile(br"\(GNU coreutils\) ([0-9]+\.[0-9]+)").unwrap();
    let mut version_md = MatchData::for_pattern(&version_re);
    let unrecognized_re = CompiledRegex::compile(b".+").unwrap();
    let mut unrecognized_md = MatchData::for_pattern(&unrecognized_re);

    let mut entries = [
        RegexEntry::new(&version_re, &mut version_md, 1),
        RegexEntry::new(&unrecognized_re, &mut unrecognized_md, 2),
    ];

    match session.expect(Some(&mut entries)) {
        ExpectResult::Matched(1) => {}
        other => panic!("expected version tag, got {other:?}"),
    }
    session.close().expect("close");
}

#[test]
fn multi_match_scenario_returns_tags_in_order() {
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
            other => panic!("expected tag {tag}, got {other:?}"),
        }
    }
    session.close().expect("close");
}

#[test]
fn printf_password_redacted_in_debug_sink() {
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);
    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    let mut session = spawn_argv("cat", &["cat"]).expect("spawn cat");
    let sink = SharedBuf::default();
    session.set_debug_sink(Some(Box::new(sink.clone())));

    session.printf_password("hunter2").expect("printf_password");

    let logged = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
    assert!(logged.contains("(password redacted)"));
    assert!(!logged.contains("hunter2"));

    session.send_interrupt().ok();
    let _ = session.close();
}

#[test]
fn timeout_retains_buffer_for_next_call() {
    let mut session =
        spawn_argv("sh", &["sh", "-c", "printf hello; sleep 2; printf world"])
            .expect("spawn sh");
    session.timeout_ms = 200;

    let never_re = CompiledRegex::compile(b"world").unwrap();
    let mut never_md = MatchData::for_pattern(&never_re);
    let mut entries = [RegexEntry::new(&never_re, &mut never_md, 1)];

    match session.expect(Some(&mut entries)) {
        ExpectResult::Timeout => {}
        other => panic!("expected timeout, got {other:?}"),
    }

    // The buffer should still contain "hello", retained across calls for
    // a subsequent expect once "world" eventually arrives.
    session.timeout_ms = 5000;
    let hello_re = CompiledRegex::compile(b"hello").unwrap();
    let mut hello_md = MatchData::for_pattern(&hello_re);
    let mut entries2 = [RegexEntry::new(&hello_re, &mut hello_md, 2)];
    match session.expect(Some(&mut entries2)) {
        ExpectResult::Matched(2) => {}
        other => panic!("expected retained buffer to match hello, got {other:?}"),
    }

    let _ = session.close();
}

#[test]
fn eof_reported_when_child_exits_immediately() {
    let mut session = spawn_argv("true", &["true"]).expect("spawn true");
    loop {
        match session.expect(None) {
            ExpectResult::Eof => break,
            ExpectResult::Timeout => panic!("timed out waiting for eof"),
            other => panic!("unexpected: {other:?}"),
        }
    }
    session.close().expect("close");
}
