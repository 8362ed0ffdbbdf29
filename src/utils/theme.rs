use colored::Colorize;
use std::io::IsTerminal;

pub struct Theme {
    pub prompt: String,
    pub error_style: Box<dyn Fn(String) -> String>,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            prompt: "$ ".bright_cyan().to_string(),
            error_style: Box::new(|s| s.bright_red().to_string()),
        }
    }
}

impl Theme {
    pub fn plain() -> Self {
        Theme {
            prompt: String::from("$ "),
            error_style: Box::new(|s| s),
        }
    }

    /// 提示符和诊断信息都写 stderr，stderr 不是终端时不上色
    pub fn load_theme(theme_name: &str) -> Theme {
        if !std::io::stderr().is_terminal() {
            colored::control::set_override(false);
        }
        match theme_name {
            "plain" => Theme::plain(),
            _ => Theme::default(),
        }
    }

    pub fn error(&self, message: impl Into<String>) -> String {
        (self.error_style)(message.into())
    }
}
