//! Writing to the child: `printf`, `printf_password`, and `send_interrupt`.
//!
//! Grounded in `miniexpect.c::mexp_vprintf`/`mexp_send_interrupt`: format the
//! message, full-write it to the master fd (looping on short writes, the
//! same pattern the teacher's own PTY I/O loop uses), and mirror it to the
//! debug sink - redacted for the password variant.

use std::io::{self, Write};
use std::os::fd::AsRawFd;

use nix::unistd::write as nix_write;

use crate::debug;
use crate::session::Session;

impl Session {
    /// Write `msg` to the child and echo it to the debug sink verbatim
    /// (escaped for control characters).
    pub fn printf(&mut self, msg: &str) -> io::Result<usize> {
        let n = self.write_all_to_master(msg.as_bytes())?;
        let escaped = debug::escape(msg.as_bytes());
        self.debug_log(&format!("sending: {escaped}"));
        Ok(n)
    }

    /// Write `msg` to the child but log [`debug::REDACTED`] instead of the
    /// message itself, for password prompts and other sensitive input.
    pub fn printf_password(&mut self, msg: &str) -> io::Result<usize> {
        let n = self.write_all_to_master(msg.as_bytes())?;
        self.debug_log(&format!("sending: {}", debug::REDACTED));
        Ok(n)
    }

    /// Send a single interrupt byte (`\x03`, i.e. the terminal's INTR
    /// character under default termios settings) to the child.
    pub fn send_interrupt(&mut self) -> io::Result<usize> {
        let n = self.write_all_to_master(&[0x03])?;
        self.debug_log("sending: interrupt");
        Ok(n)
    }

    fn write_all_to_master(&mut self, mut buf: &[u8]) -> io::Result<usize> {
        let fd = self
            .master
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "session is closed"))?
            .as_raw_fd();

        let total = buf.len();
        while !buf.is_empty() {
            let n = nix_write(unsafe { std::os::fd::BorrowedFd::borrow_raw(fd) }, buf)
                .map_err(|e| io::Error::from_raw_os_error(e as i32))?;
            if n == 0 {
                return Err(io::Error::new(io::ErrorKind::WriteZero, "write returned 0"));
            }
            buf = &buf[n..];
        }
        Ok(total)
    }
}

// Bring `Write` into scope for call sites that prefer the trait directly
// (e.g. piping formatted output through `write!`).
impl Write for Session {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_all_to_master(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::spawn::spawn_argv;

    #[test]
    fn printf_writes_without_error() {
        let mut session = spawn_argv("cat", &["cat"]).expect("spawn cat");
        session.printf("hello\n").expect("printf");
        session.send_interrupt().ok();
        let _ = session.close();
    }
}
