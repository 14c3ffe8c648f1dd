//! Pseudo-terminal for the interactive session.
//!
//! `flirc_util` is a C stdio program: on a pipe its stdout is fully buffered
//! and a prompt without a trailing newline never arrives.  On a terminal
//! stdout is line-buffered and flushed whenever the program reads input, so
//! the session runs with its stdin and stdout on the slave side of a PTY.
//!
//! The slave is configured the way an expect-style driver needs it:
//!
//! - `ECHO` off: command lines written to the master are not read back.
//! - `ONLCR` off: `\n` stays `\n` instead of becoming `\r\n`.
//!
//! The master is non-blocking and driven through [`AsyncFd`].

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, OwnedFd};

use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::pty::openpty;
use nix::sys::termios::{tcgetattr, tcsetattr, LocalFlags, OutputFlags, SetArg};
use tokio::io::unix::AsyncFd;

/// Master side of the session's terminal.
pub struct PtyMaster {
    fd: AsyncFd<File>,
}

/// Opens a PTY pair.
///
/// Returns the async master and the slave descriptor to hand to the child.
///
/// # Errors
///
/// Returns the OS error if the pair cannot be allocated or configured.
pub fn open() -> io::Result<(PtyMaster, OwnedFd)> {
    let pty = openpty(None, None)?;

    let mut termios = tcgetattr(&pty.slave)?;
    termios.local_flags.remove(LocalFlags::ECHO);
    termios.output_flags.remove(OutputFlags::ONLCR);
    tcsetattr(&pty.slave, SetArg::TCSANOW, &termios)?;

    let flags = OFlag::from_bits_truncate(fcntl(pty.master.as_raw_fd(), FcntlArg::F_GETFL)?);
    fcntl(
        pty.master.as_raw_fd(),
        FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK),
    )?;

    let master = PtyMaster {
        fd: AsyncFd::new(File::from(pty.master))?,
    };
    Ok((master, pty.slave))
}

impl PtyMaster {
    /// Reads whatever the child has written.
    ///
    /// Returns `Ok(0)` once the child has closed the terminal (Linux reports
    /// this as `EIO` on the master).
    pub async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let mut guard = self.fd.readable().await?;
            match guard.try_io(|inner| Read::read(&mut inner.get_ref(), &mut *buf)) {
                Ok(Ok(n)) => return Ok(n),
                Ok(Err(e)) if e.raw_os_error() == Some(Errno::EIO as i32) => return Ok(0),
                Ok(Err(e)) => return Err(e),
                Err(_would_block) => continue,
            }
        }
    }

    /// Writes all of `data` to the child's input.
    pub async fn write_all(&self, mut data: &[u8]) -> io::Result<()> {
        while !data.is_empty() {
            let mut guard = self.fd.writable().await?;
            match guard.try_io(|inner| Write::write(&mut inner.get_ref(), data)) {
                Ok(Ok(0)) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(Ok(n)) => data = &data[n..],
                Ok(Err(e)) => return Err(e),
                Err(_would_block) => continue,
            }
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
