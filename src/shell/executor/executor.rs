use log::debug;
use std::ffi::{OsStr, OsString};
use std::fmt::Display;
use std::os::unix::io::RawFd;

use crate::shell::parser::{parse, Command, Node, RedirectMode};
use crate::utils::theme::Theme;

use super::process::{ExecError, Pid, Process, EXIT_FAILURE, EXIT_SUCCESS};

/// Supervisor entry point: parses `line` and runs it in the calling process.
/// The return value is the exit status the supervisor should end with.
pub fn execute_line<P: Process>(os: &mut P, theme: &Theme, line: &[u8]) -> i32 {
    match parse(line) {
        Ok(Some(command)) => {
            debug!("执行命令: {} ({} 个程序)", command, command.exec_count());
            run(os, theme, &command)
        }
        Ok(None) => EXIT_SUCCESS,
        Err(e) => fail(os, theme, e),
    }
}

/// Runs `node` inside a process dedicated to it. Every child process gets
/// its own call through `Process::fork`; redirections and the right side of
/// a list continue in the current process.
pub fn run<P: Process>(os: &mut P, theme: &Theme, node: &Command) -> i32 {
    match node {
        Node::Exec { argv } => run_exec(os, theme, argv),
        Node::Redirect {
            inner,
            file,
            mode,
            fd,
        } => match redirect(os, file, *mode, *fd) {
            Ok(()) => run(os, theme, inner),
            Err(e) => fail(os, theme, e),
        },
        Node::Pipe { left, right } => match run_pipe(os, theme, left, right) {
            Ok(code) => code,
            Err(e) => fail(os, theme, e),
        },
        Node::List { left, right } => {
            let waited = os
                .fork(|os| run(os, theme, left))
                .and_then(|pid| wait_for(os, &[pid]));
            if let Err(e) = waited {
                return fail(os, theme, e);
            }
            run(os, theme, right)
        }
        Node::Background { inner } => match os.fork(|os| run(os, theme, inner)) {
            Ok(pid) => {
                debug!("后台进程: {}", pid);
                EXIT_SUCCESS
            }
            Err(e) => fail(os, theme, e),
        },
    }
}

fn fail<P: Process>(os: &mut P, theme: &Theme, e: impl Display) -> i32 {
    os.report(&theme.error(e.to_string()));
    EXIT_FAILURE
}

fn run_exec<P: Process>(os: &mut P, theme: &Theme, argv: &[OsString]) -> i32 {
    let Some(program) = argv.first() else {
        return EXIT_SUCCESS;
    };
    match os.exec(argv) {
        Ok(code) => code,
        Err(e) => {
            let message = format!("exec {} failed: {}", program.to_string_lossy(), e);
            os.report(&theme.error(message));
            for (i, arg) in argv.iter().enumerate().skip(1) {
                let line = format!("\targ {}: {}", i, arg.to_string_lossy());
                os.report(&theme.error(line));
            }
            EXIT_FAILURE
        }
    }
}

/// Binds `file` to `fd`. The slot is closed first so the open lands on it.
fn redirect<P: Process>(
    os: &mut P,
    file: &OsStr,
    mode: RedirectMode,
    fd: RawFd,
) -> Result<(), ExecError> {
    // 目标槽位本来就是关着的也没关系
    let _ = os.close(fd);
    let got = os.open(file, mode)?;
    if got != fd {
        let _ = os.close(got);
        return Err(ExecError::Misplaced {
            path: file.to_string_lossy().into_owned(),
            expected: fd,
            got,
        });
    }
    Ok(())
}

/// Makes `end` the process's `slot` and drops both original pipe ends.
fn attach<P: Process>(
    os: &mut P,
    end: RawFd,
    slot: RawFd,
    pipe: (RawFd, RawFd),
) -> Result<(), ExecError> {
    let _ = os.close(slot);
    let got = os.dup(end)?;
    if got != slot {
        return Err(ExecError::Misplaced {
            path: String::from("pipe"),
            expected: slot,
            got,
        });
    }
    os.close(pipe.0)?;
    os.close(pipe.1)?;
    Ok(())
}

fn run_pipe<P: Process>(
    os: &mut P,
    theme: &Theme,
    left: &Command,
    right: &Command,
) -> Result<i32, ExecError> {
    let (read, write) = os.pipe()?;

    let writer = os.fork(|os| match attach(os, write, libc::STDOUT_FILENO, (read, write)) {
        Ok(()) => run(os, theme, left),
        Err(e) => fail(os, theme, e),
    })?;
    let reader = os.fork(|os| match attach(os, read, libc::STDIN_FILENO, (read, write)) {
        Ok(()) => run(os, theme, right),
        Err(e) => fail(os, theme, e),
    })?;

    // 两端都关掉之后才能等，否则读端永远等不到 EOF
    os.close(read)?;
    os.close(write)?;

    let codes = wait_for(os, &[writer, reader])?;
    Ok(codes[1])
}

/// Reaps children until every pid in `pids` has been seen. Returns their
/// statuses in the same order; other children reaped meanwhile are dropped.
pub fn wait_for<P: Process>(os: &mut P, pids: &[Pid]) -> Result<Vec<i32>, ExecError> {
    let mut codes: Vec<Option<i32>> = vec![None; pids.len()];
    while codes.iter().any(Option::is_none) {
        let (pid, code) = os.wait()?;
        match pids.iter().position(|p| *p == pid) {
            Some(i) => codes[i] = Some(code),
            None => debug!("回收了无关的子进程 {} (状态 {})", pid, code),
        }
    }
    Ok(codes.into_iter().flatten().collect())
}
