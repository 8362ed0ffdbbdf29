use dotenv::dotenv;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_LINE_MAX: usize = 256;

pub struct Config {
    pub name: String,
    pub debug: bool,
    pub theme: String,
    pub console: PathBuf,
    pub line_max: usize,
    pub logger_level: String,
    pub logger_dir: PathBuf,
}

impl Config {
    fn get_config_dir() -> PathBuf {
        if let Ok(home) = env::var("HOME") {
            PathBuf::from(home).join(".config/minish")
        } else {
            PathBuf::from("tmp")
        }
    }

    fn default() -> Self {
        let config_dir = Self::get_config_dir();
        Config {
            name: String::from("minish"),
            debug: false,
            theme: String::from("default"),
            console: PathBuf::from("/dev/tty"),
            line_max: DEFAULT_LINE_MAX,
            logger_level: String::from("warn"),
            logger_dir: config_dir.join("logs"),
        }
    }

    pub fn new() -> Self {
        // 优先加载环境变量
        if cfg!(debug_assertions) {
            dotenv::from_filename(".env.development").ok();
        } else {
            dotenv().ok();
        }

        let mut config = Config::default();

        if let Ok(debug) = env::var("MINISH_DEBUG") {
            config.debug = parse_flag(&debug);
        }

        if let Ok(theme) = env::var("MINISH_THEME") {
            config.theme = theme;
        }

        if let Ok(console) = env::var("MINISH_CONSOLE") {
            config.console = PathBuf::from(console);
        }

        if let Ok(line_max) = env::var("MINISH_LINE_MAX") {
            // 至少要能容纳一个字符和结尾
            if let Ok(n) = line_max.trim().parse::<usize>() {
                config.line_max = n.max(2);
            }
        }

        if let Ok(level) = env::var("MINISH_LOG_LEVEL") {
            config.logger_level = level;
        }

        if let Ok(dir) = env::var("MINISH_LOG_DIR") {
            config.logger_dir = PathBuf::from(dir);
        }

        config
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
