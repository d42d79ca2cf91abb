//! Low-level PTY pair allocation.
//!
//! Mirrors the POSIX sequence `posix_openpt` → `grantpt` → `unlockpt` →
//! `ptsname`, same as the teacher's own `create_pty` in `src/pty.rs`, but the
//! slave is deliberately **not** opened here. The child opens its own slave
//! after `setsid()` so it becomes the session's controlling terminal; opening
//! it in the parent first would hand the parent a controlling terminal it
//! doesn't want and the child wouldn't get one of its own.

use std::ffi::CString;
use std::io;
use std::os::fd::OwnedFd;

use nix::fcntl::OFlag;
use nix::pty::{grantpt, posix_openpt, unlockpt, PtyMaster};
use nix::sys::stat::Mode;

/// A freshly allocated PTY master, not yet paired with any child.
pub struct PtyPair {
    pub master: OwnedFd,
    pub slave_path: CString,
}

/// Allocate a master/slave PTY pair and return the master fd plus the
/// slave's device path, without opening the slave.
pub fn open_pair() -> io::Result<PtyPair> {
    let master: PtyMaster = posix_openpt(OFlag::O_RDWR | OFlag::O_NOCTTY)
        .map_err(|e| io::Error::from_raw_os_error(e as i32))?;

    grantpt(&master).map_err(|e| io::Error::from_raw_os_error(e as i32))?;
    unlockpt(&master).map_err(|e| io::Error::from_raw_os_error(e as i32))?;

    let slave_path = nix::pty::ptsname_r(&master)
        .map_err(|e| io::Error::from_raw_os_error(e as i32))
        .map(|s| CString::new(s).expect("ptsname_r returned a NUL-containing path"))?;

    Ok(PtyPair {
        master: master.into(),
        slave_path,
    })
}

/// Open the slave side by path. Called only from the child, after
/// `setsid()`, never from the parent (see module docs).
pub fn open_slave(path: &CString) -> io::Result<OwnedFd> {
    nix::fcntl::open(path.as_c_str(), OFlag::O_RDWR, Mode::empty())
        .map(Into::into)
        .map_err(|e| io::Error::from_raw_os_error(e as i32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_pair_produces_a_readable_slave_path() {
        let pair = open_pair().expect("open_pair");
        assert!(!pair.slave_path.as_bytes().is_empty());
    }

    #[test]
    fn slave_can_be_opened_by_path() {
        let pair = open_pair().expect("open_pair");
        let slave = open_slave(&pair.slave_path).expect("open_slave");
        drop(slave);
    }
}
