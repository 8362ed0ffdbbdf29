use log::{debug, trace};
use std::io::{self, ErrorKind, Read, Write};

use nix::unistd;

use crate::shell::completion::{complete, DirSource};

pub const COMPLETION_TRIGGER: u8 = b'\t';

/// Unbuffered reader over fd 0. `std::io::Stdin` reads ahead, which would
/// swallow input meant for the commands the shell starts.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawStdin;

impl Read for RawStdin {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        unistd::read(libc::STDIN_FILENO, buf).map_err(io::Error::from)
    }
}

/// Byte-at-a-time line reader with filename completion on tab.
///
/// The terminal has already echoed whatever was typed before a completion,
/// so text in front of an inserted completion cannot be edited from here.
pub struct LineEditor<R, W, D> {
    input: R,
    echo: W,
    dir: D,
    capacity: usize,
    debug: bool,
}

impl<R: Read, W: Write, D: DirSource> LineEditor<R, W, D> {
    /// `capacity` counts the terminator slot, so a line holds at most
    /// `capacity - 1` bytes.
    pub fn new(input: R, echo: W, dir: D, capacity: usize, debug: bool) -> Self {
        Self {
            input,
            echo,
            dir,
            capacity: capacity.max(2),
            debug,
        }
    }

    /// Reads one line as raw bytes. `Ok(None)` means end of input with
    /// nothing buffered.
    pub fn read_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut buf: Vec<u8> = Vec::with_capacity(self.capacity);

        while buf.len() + 1 < self.capacity {
            let Some(c) = self.read_byte()? else {
                break;
            };
            if self.debug {
                trace!("读取字节 {:#04x}", c);
            }
            match c {
                b'\n' | b'\r' => {
                    buf.push(c);
                    break;
                }
                COMPLETION_TRIGGER => self.complete_word(&mut buf)?,
                _ => buf.push(c),
            }
        }

        if buf.is_empty() {
            return Ok(None);
        }
        Ok(Some(buf))
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.input.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Extends the word under the cursor with a matching file name.
    fn complete_word(&mut self, buf: &mut Vec<u8>) -> io::Result<()> {
        let start = buf
            .iter()
            .rposition(|&c| c == b' ')
            .map(|i| i + 1)
            .unwrap_or(0);
        if start == buf.len() {
            return Ok(());
        }

        let remaining = self.capacity - 1 - buf.len();
        let prefix = &buf[start..];
        if let Some(appended) = complete(&self.dir, prefix, remaining) {
            if self.debug {
                debug!(
                    "补全 {:?} -> {:?}",
                    String::from_utf8_lossy(prefix),
                    String::from_utf8_lossy(&appended)
                );
            }
            self.echo.write_all(&appended)?;
            self.echo.flush()?;
            buf.extend_from_slice(&appended);
        }
        Ok(())
    }
}
