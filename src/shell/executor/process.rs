use std::ffi::{CString, OsStr, OsString};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::{IntoRawFd, RawFd};
use std::path::Path;

use log::debug;
use nix::errno::Errno;
use nix::fcntl::{open, OFlag};
use nix::sys::stat::Mode;
use nix::sys::wait::{wait, WaitStatus};
use nix::unistd::{close, dup, execvp, fork, pipe, ForkResult};
use thiserror::Error;

use crate::shell::parser::RedirectMode;

pub type Pid = i32;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExecError {
    #[error("fork: {0}")]
    Fork(Errno),
    #[error("pipe: {0}")]
    Pipe(Errno),
    #[error("dup: {0}")]
    Dup(Errno),
    #[error("close: {0}")]
    Close(Errno),
    #[error("wait: {0}")]
    Wait(Errno),
    #[error("open {path} failed: {source}")]
    Open { path: String, source: Errno },
    #[error("{path} opened on fd {got}, expected fd {expected}")]
    Misplaced {
        path: String,
        expected: RawFd,
        got: RawFd,
    },
    #[error("{0}")]
    Exec(Errno),
    #[error("argument contains a nul byte")]
    NulByte,
}

/// The OS primitives the executor drives. One implementation talks to the
/// kernel, tests use a recording fake.
pub trait Process {
    /// Runs `child` in a new process whose exit status is the value it
    /// returns. The parent gets the child's pid back.
    fn fork<F>(&mut self, child: F) -> Result<Pid, ExecError>
    where
        F: FnOnce(&mut Self) -> i32;

    /// Replaces the process image. Only comes back on failure; the `Ok`
    /// value exists for runtimes that simulate the replaced program.
    fn exec(&mut self, argv: &[OsString]) -> Result<i32, ExecError>;

    /// Returns `(read_end, write_end)`.
    fn pipe(&mut self) -> Result<(RawFd, RawFd), ExecError>;

    fn dup(&mut self, fd: RawFd) -> Result<RawFd, ExecError>;

    fn close(&mut self, fd: RawFd) -> Result<(), ExecError>;

    fn open(&mut self, path: &OsStr, mode: RedirectMode) -> Result<RawFd, ExecError>;

    /// Blocks until any child terminates; returns its pid and exit status.
    fn wait(&mut self) -> Result<(Pid, i32), ExecError>;

    /// Writes one diagnostic line for the user.
    fn report(&mut self, message: &str);
}

pub fn open_flags(mode: RedirectMode) -> OFlag {
    match mode {
        RedirectMode::Read => OFlag::O_RDONLY,
        RedirectMode::Truncate => OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC,
        RedirectMode::Append => OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_APPEND,
    }
}

/// Real processes through `nix`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnixProcess;

impl UnixProcess {
    pub fn new() -> Self {
        UnixProcess
    }
}

impl Process for UnixProcess {
    fn fork<F>(&mut self, child: F) -> Result<Pid, ExecError>
    where
        F: FnOnce(&mut Self) -> i32,
    {
        // SAFETY: the shell is single threaded, the child only runs our own
        // code before exec or exit.
        match unsafe { fork() }.map_err(ExecError::Fork)? {
            ForkResult::Child => {
                let code = child(self);
                std::process::exit(code)
            }
            ForkResult::Parent { child } => {
                debug!("fork 子进程: {}", child);
                Ok(child.as_raw())
            }
        }
    }

    fn exec(&mut self, argv: &[OsString]) -> Result<i32, ExecError> {
        let args = argv
            .iter()
            .map(|arg| CString::new(arg.as_bytes()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ExecError::NulByte)?;
        let Some(program) = args.first() else {
            return Err(ExecError::Exec(Errno::ENOENT));
        };
        match execvp(program, &args) {
            Ok(never) => match never {},
            Err(e) => Err(ExecError::Exec(e)),
        }
    }

    fn pipe(&mut self) -> Result<(RawFd, RawFd), ExecError> {
        let (read, write) = pipe().map_err(ExecError::Pipe)?;
        Ok((read.into_raw_fd(), write.into_raw_fd()))
    }

    fn dup(&mut self, fd: RawFd) -> Result<RawFd, ExecError> {
        dup(fd).map_err(ExecError::Dup)
    }

    fn close(&mut self, fd: RawFd) -> Result<(), ExecError> {
        close(fd).map_err(ExecError::Close)
    }

    fn open(&mut self, path: &OsStr, mode: RedirectMode) -> Result<RawFd, ExecError> {
        open(
            Path::new(path),
            open_flags(mode),
            Mode::from_bits_truncate(0o644),
        )
        .map_err(|source| ExecError::Open {
            path: path.to_string_lossy().into_owned(),
            source,
        })
    }

    fn wait(&mut self) -> Result<(Pid, i32), ExecError> {
        loop {
            match wait() {
                Ok(WaitStatus::Exited(pid, code)) => return Ok((pid.as_raw(), code)),
                Ok(WaitStatus::Signaled(pid, signal, _)) => {
                    return Ok((pid.as_raw(), 128 + signal as i32))
                }
                // 没有开 WUNTRACED，其余状态不会出现
                Ok(_) => continue,
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(ExecError::Wait(e)),
            }
        }
    }

    fn report(&mut self, message: &str) {
        eprintln!("{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_flags() {
        assert_eq!(open_flags(RedirectMode::Read), OFlag::O_RDONLY);
        let truncate = open_flags(RedirectMode::Truncate);
        assert!(truncate.contains(OFlag::O_CREAT | OFlag::O_TRUNC | OFlag::O_WRONLY));
        assert!(!truncate.contains(OFlag::O_APPEND));
        let append = open_flags(RedirectMode::Append);
        assert!(append.contains(OFlag::O_CREAT | OFlag::O_APPEND | OFlag::O_WRONLY));
        assert!(!append.contains(OFlag::O_TRUNC));
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_open_missing_file_for_read_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("missing");
        let err = UnixProcess::new()
            .open(path.as_os_str(), RedirectMode::Read)
            .unwrap_err();
        assert!(matches!(err, ExecError::Open { source: Errno::ENOENT, .. }));
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_pipe_and_close() {
        let mut os = UnixProcess::new();
        let (read, write) = os.pipe().unwrap();
        assert_ne!(read, write);
        os.close(read).unwrap();
        os.close(write).unwrap();
    }

    #[test]
    fn test_exec_rejects_nul_bytes() {
        let argv = vec![OsString::from("ec\0ho")];
        assert_eq!(UnixProcess::new().exec(&argv), Err(ExecError::NulByte));
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_open_non_utf8_path() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(OsStr::from_bytes(b"caf\xe9.txt"));
        let fd = UnixProcess::new()
            .open(path.as_os_str(), RedirectMode::Truncate)
            .unwrap();
        close(fd).unwrap();
        assert!(path.exists());
    }
}
