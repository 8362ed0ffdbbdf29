#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

use log::debug;
use shell::Shell;

use crate::utils::config::Config;
use crate::utils::log::init_logger;

mod shell;
mod utils;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::new();
    init_logger(&config);
    debug!("配置加载成功 {}", config.logger_dir.display());

    let mut shell = Shell::new(&config);
    shell.run()
}
