use log::{debug, error};
use std::env;
use std::error::Error;
use std::ffi::OsStr;
use std::io::{self, Stderr, Write};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use nix::fcntl::{open, OFlag};
use nix::sys::stat::{fstat, Mode, SFlag};
use nix::unistd::close;

use crate::shell::completion::DirListing;
use crate::shell::executor::{execute_line, wait_for, Process, UnixProcess};
use crate::shell::readline::{LineEditor, RawStdin};
use crate::utils::config::Config;
use crate::utils::theme::Theme;

pub struct Shell<'a> {
    config: &'a Config,
    theme: Theme,
    readline: LineEditor<RawStdin, Stderr, DirListing>,
    process: UnixProcess,
}

impl<'a> Shell<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            theme: Theme::load_theme(&config.theme),
            readline: LineEditor::new(
                RawStdin,
                io::stderr(),
                DirListing::current(),
                config.line_max,
                config.debug,
            ),
            process: UnixProcess::new(),
        }
    }

    pub fn run(&mut self) -> Result<(), Box<dyn Error>> {
        debug!("初始化 {}...", self.config.name);
        let bound = ensure_console(&self.config.console);
        debug!("控制台补齐了 {} 个描述符", bound);

        self.run_loop()?;

        debug!("退出 {}...", self.config.name);
        Ok(())
    }

    fn run_loop(&mut self) -> Result<(), Box<dyn Error>> {
        loop {
            // fork 之前清空缓冲，子进程不会重复输出
            io::stdout().flush()?;
            if wants_prompt() {
                eprint!("{}", self.theme.prompt);
                io::stderr().flush()?;
            }

            match self.readline.read_line()? {
                Some(line) => self.handle_input(&line),
                None => {
                    debug!("读到 EOF");
                    break;
                }
            }
        }
        Ok(())
    }

    fn handle_input(&mut self, line: &[u8]) {
        // cd 必须在 shell 自己的进程里执行
        if let Some(path) = cd_target(line) {
            self.builtin_cd(OsStr::from_bytes(path));
            return;
        }

        let theme = &self.theme;
        let supervisor = self.process.fork(|os| execute_line(os, theme, line));
        match supervisor.and_then(|pid| wait_for(&mut self.process, &[pid])) {
            Ok(codes) => debug!(
                "命令结束: {:?} 状态 {:?}",
                String::from_utf8_lossy(line).trim_end(),
                codes
            ),
            Err(e) => {
                error!("执行命令失败: {}", e);
                eprintln!("{}", self.theme.error(e.to_string()));
            }
        }
    }

    fn builtin_cd(&self, path: &OsStr) {
        let target = cd_path(path);
        if let Err(e) = env::set_current_dir(&target) {
            debug!("cd {} 失败: {}", target.display(), e);
            let message = format!("cannot cd {}", path.to_string_lossy());
            eprintln!("{}", self.theme.error(message));
        }
    }
}

/// `cd <path>` with trailing whitespace stripped, or `None` for anything else.
fn cd_target(line: &[u8]) -> Option<&[u8]> {
    let rest = line.strip_prefix(b"cd ")?;
    let end = rest
        .iter()
        .rposition(|c| !c.is_ascii_whitespace())
        .map_or(0, |i| i + 1);
    Some(&rest[..end])
}

/// Expands a leading `~`. Paths that are not UTF-8 are used as they are.
fn cd_path(path: &OsStr) -> PathBuf {
    match path.to_str() {
        Some(path) => PathBuf::from(shellexpand::tilde(path).into_owned()),
        None => PathBuf::from(path),
    }
}

/// Scripts fed through a regular file get no prompt.
fn wants_prompt() -> bool {
    match fstat(libc::STDIN_FILENO) {
        Ok(st) => SFlag::from_bits_truncate(st.st_mode) & SFlag::S_IFMT != SFlag::S_IFREG,
        Err(e) => {
            debug!("fstat stdin 失败: {}", e);
            true
        }
    }
}

/// Opens the console until descriptors 0, 1 and 2 are all taken. Returns
/// how many of those slots had to be filled.
fn ensure_console(console: &Path) -> usize {
    let mut bound = 0;
    loop {
        match open(console, OFlag::O_RDWR, Mode::empty()) {
            Ok(fd) if fd >= 3 => {
                let _ = close(fd);
                break;
            }
            Ok(fd) => {
                debug!("控制台绑定到 fd {}", fd);
                bound += 1;
            }
            Err(e) => {
                debug!("无法打开控制台 {}: {}", console.display(), e);
                break;
            }
        }
    }
    bound
}
