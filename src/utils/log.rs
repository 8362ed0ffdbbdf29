use crate::utils::config::Config;
use chrono::Local;
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::process;

pub fn init_logger(config: &Config) {
    // debug 模式要看到行编辑器逐字节的 trace
    let level = if config.debug {
        LevelFilter::Trace
    } else {
        parse_level(&config.logger_level)
    };

    let mut writers: Vec<Box<dyn Write + Send + Sync>> = vec![Box::new(io::stderr())];
    match open_log_file(&config.logger_dir, &config.name) {
        Ok(file) => writers.push(Box::new(file)),
        // 日志文件打不开时只写 stderr
        Err(e) => eprintln!(
            "{}: cannot open log file in {}: {}",
            config.name,
            config.logger_dir.display(),
            e
        ),
    }

    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "[PID:{}][{}] {} - {}",
                process::id(),
                record.level(),
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.args()
            )
        })
        .target(Target::Pipe(Box::new(MultiWriter { writers })))
        .filter(Some(config.name.as_str()), level)
        .filter(None, LevelFilter::Warn)
        .init();

    log::debug!("日志级别设置为: {}", level);
}

fn parse_level(level: &str) -> LevelFilter {
    match level {
        level if level.eq_ignore_ascii_case("off") => LevelFilter::Off,
        level if level.eq_ignore_ascii_case("error") => LevelFilter::Error,
        level if level.eq_ignore_ascii_case("warn") => LevelFilter::Warn,
        level if level.eq_ignore_ascii_case("info") => LevelFilter::Info,
        level if level.eq_ignore_ascii_case("debug") => LevelFilter::Debug,
        level if level.eq_ignore_ascii_case("trace") => LevelFilter::Trace,
        _ => LevelFilter::Warn,
    }
}

fn open_log_file(dir: &Path, name: &str) -> io::Result<File> {
    fs::create_dir_all(dir)?;
    let date = Local::now().format("%Y-%m-%d");
    // 子进程共用同一个文件，只追加不截断
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(format!("{}_{}.log", name, date)))
}

struct MultiWriter {
    writers: Vec<Box<dyn Write + Send + Sync>>,
}

impl Write for MultiWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for writer in &mut self.writers {
            writer.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        for writer in &mut self.writers {
            writer.flush()?;
        }
        Ok(())
    }
}
