use log::debug;
use thiserror::Error;

use super::ast::{Command, Node, RawCommand, RedirectMode, Span};
use super::lexer::{Lexer, TokenKind};
use super::terminate::terminate;

/// Most words a single command may carry.
pub const MAX_ARGS: usize = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing file for redirection")]
    MissingRedirectTarget,
    #[error("syntax - missing )")]
    MissingCloseParen,
    #[error("too many args (max {max})")]
    TooManyArgs { max: usize },
    #[error("syntax - unexpected {token}")]
    UnexpectedToken { token: TokenKind },
    #[error("leftovers: {rest}")]
    Leftovers { rest: String },
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Parser {
            lexer: Lexer::new(input),
        }
    }

    /// Parses a whole line. `None` means the line held nothing but
    /// whitespace.
    pub fn parse_command(&mut self) -> Result<Option<RawCommand>, ParseError> {
        if self.lexer.at_end() {
            return Ok(None);
        }
        let cmd = self.parse_line()?;
        if !self.lexer.at_end() {
            return Err(ParseError::Leftovers {
                rest: String::from_utf8_lossy(self.lexer.rest())
                    .trim_end()
                    .to_string(),
            });
        }
        Ok(Some(cmd))
    }

    fn parse_line(&mut self) -> Result<RawCommand, ParseError> {
        let mut cmd = self.parse_pipeline()?;
        while self.lexer.peek(b"&") {
            self.lexer.next_token();
            cmd = Node::background(cmd);
        }
        if self.lexer.peek(b";") {
            self.lexer.next_token();
            cmd = Node::list(cmd, self.parse_line()?);
        }
        Ok(cmd)
    }

    fn parse_pipeline(&mut self) -> Result<RawCommand, ParseError> {
        let cmd = self.parse_exec()?;
        if self.lexer.peek(b"|") {
            self.lexer.next_token();
            return Ok(Node::pipe(cmd, self.parse_pipeline()?));
        }
        Ok(cmd)
    }

    fn parse_block(&mut self) -> Result<RawCommand, ParseError> {
        // 调用方已经确认下一个是 (
        self.lexer.next_token();
        let cmd = self.parse_line()?;
        if !self.lexer.peek(b")") {
            return Err(ParseError::MissingCloseParen);
        }
        self.lexer.next_token();

        let mut redirections = Vec::new();
        self.parse_redirs(&mut redirections)?;
        Ok(wrap_redirections(cmd, redirections))
    }

    fn parse_exec(&mut self) -> Result<RawCommand, ParseError> {
        if self.lexer.peek(b"(") {
            return self.parse_block();
        }

        let mut argv = Vec::new();
        let mut redirections = Vec::new();

        self.parse_redirs(&mut redirections)?;
        while !self.lexer.peek(b"|)&;") {
            let token = self.lexer.next_token();
            match token.kind {
                TokenKind::Eof => break,
                TokenKind::Word => {}
                kind => return Err(ParseError::UnexpectedToken { token: kind }),
            }
            argv.push(token.span);
            if argv.len() > MAX_ARGS {
                return Err(ParseError::TooManyArgs { max: MAX_ARGS });
            }
            self.parse_redirs(&mut redirections)?;
        }

        Ok(wrap_redirections(Node::Exec { argv }, redirections))
    }

    fn parse_redirs(
        &mut self,
        redirections: &mut Vec<(RedirectMode, Span)>,
    ) -> Result<(), ParseError> {
        while self.lexer.peek(b"<>") {
            let mode = match self.lexer.next_token().kind {
                TokenKind::Input => RedirectMode::Read,
                TokenKind::Append => RedirectMode::Append,
                _ => RedirectMode::Truncate,
            };
            let file = self.lexer.next_token();
            if file.kind != TokenKind::Word {
                return Err(ParseError::MissingRedirectTarget);
            }
            redirections.push((mode, file.span));
        }
        Ok(())
    }
}

/// The first redirection written ends up innermost.
fn wrap_redirections(cmd: RawCommand, redirections: Vec<(RedirectMode, Span)>) -> RawCommand {
    redirections
        .into_iter()
        .fold(cmd, |inner, (mode, file)| Node::redirect(inner, file, mode))
}

/// Parses `line` and runs the terminator pass over the result.
pub fn parse<L: AsRef<[u8]> + ?Sized>(line: &L) -> Result<Option<Command>, ParseError> {
    let line = line.as_ref();
    debug!("parsing: {}", String::from_utf8_lossy(line).trim_end());
    let raw = Parser::new(line).parse_command()?;
    Ok(raw.map(|raw| terminate(raw, line)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::os::unix::ffi::OsStrExt;

    fn exec(words: &[&str]) -> Command {
        Node::Exec {
            argv: words.iter().map(OsString::from).collect(),
        }
    }

    #[allow(clippy::unwrap_used)]
    fn parse_ok<L: AsRef<[u8]> + ?Sized>(line: &L) -> Command {
        parse(line).unwrap().unwrap()
    }

    #[test]
    fn test_simple_command() {
        assert_eq!(parse_ok("ls -l /tmp\n"), exec(&["ls", "-l", "/tmp"]));
    }

    #[test]
    fn test_empty_line() {
        assert_eq!(parse(""), Ok(None));
        assert_eq!(parse("  \t \n"), Ok(None));
    }

    #[test]
    fn test_pipeline_is_right_associative() {
        assert_eq!(
            parse_ok("a | b | c"),
            Node::pipe(exec(&["a"]), Node::pipe(exec(&["b"]), exec(&["c"])))
        );
    }

    #[test]
    fn test_list_is_right_associative() {
        assert_eq!(
            parse_ok("a; b; c"),
            Node::list(exec(&["a"]), Node::list(exec(&["b"]), exec(&["c"])))
        );
    }

    #[test]
    fn test_background_binds_to_pipeline() {
        assert_eq!(
            parse_ok("a | b &"),
            Node::background(Node::pipe(exec(&["a"]), exec(&["b"])))
        );
        // & 后面只能接 ; 或者行尾
        assert_eq!(
            parse("a | b & c"),
            Err(ParseError::Leftovers {
                rest: "c".to_string()
            })
        );
    }

    #[test]
    fn test_background_chains() {
        assert_eq!(
            parse_ok("sleep 10 & &"),
            Node::background(Node::background(exec(&["sleep", "10"])))
        );
        assert_eq!(
            parse_ok("sleep 10 &; echo hi"),
            Node::list(
                Node::background(exec(&["sleep", "10"])),
                exec(&["echo", "hi"])
            )
        );
    }

    #[test]
    fn test_redirections_anywhere_among_words() {
        let expected = Node::redirect(
            Node::redirect(exec(&["sort", "-r"]), "in".into(), RedirectMode::Read),
            "out".into(),
            RedirectMode::Append,
        );
        assert_eq!(parse_ok("sort -r < in >> out"), expected);
        assert_eq!(parse_ok("< in sort >> out -r"), expected);
        assert_eq!(parse_ok("sort<in -r>>out"), expected);
    }

    #[test]
    fn test_truncate_redirect() {
        match parse_ok("echo hi > out.txt") {
            Node::Redirect {
                inner,
                file,
                mode,
                fd,
            } => {
                assert_eq!(*inner, exec(&["echo", "hi"]));
                assert_eq!(file, "out.txt");
                assert_eq!(mode, RedirectMode::Truncate);
                assert_eq!(fd, 1);
            }
            other => panic!("Expected redirect, got {:?}", other),
        }
    }

    #[test]
    fn test_subshell_with_redirect() {
        assert_eq!(
            parse_ok("(echo a; echo b) > out | wc"),
            Node::pipe(
                Node::redirect(
                    Node::list(exec(&["echo", "a"]), exec(&["echo", "b"])),
                    "out".into(),
                    RedirectMode::Truncate
                ),
                exec(&["wc"])
            )
        );
    }

    #[test]
    fn test_redirect_without_command() {
        assert_eq!(
            parse_ok("> out"),
            Node::redirect(exec(&[]), "out".into(), RedirectMode::Truncate)
        );
    }

    #[test]
    fn test_trailing_semicolon_gives_empty_exec() {
        assert_eq!(parse_ok("echo a;"), Node::list(exec(&["echo", "a"]), exec(&[])));
    }

    #[test]
    fn test_missing_redirect_target() {
        assert_eq!(parse("cat <"), Err(ParseError::MissingRedirectTarget));
        assert_eq!(parse("cat > | wc"), Err(ParseError::MissingRedirectTarget));
    }

    #[test]
    fn test_missing_close_paren() {
        assert_eq!(parse("( echo A"), Err(ParseError::MissingCloseParen));
    }

    #[test]
    fn test_leftovers() {
        assert_eq!(
            parse("echo a ) b"),
            Err(ParseError::Leftovers {
                rest: ") b".to_string()
            })
        );
    }

    #[test]
    fn test_unexpected_paren_in_words() {
        assert_eq!(
            parse("echo ( a )"),
            Err(ParseError::UnexpectedToken {
                token: TokenKind::LParen
            })
        );
    }

    #[test]
    fn test_argument_limit() {
        let max: Vec<String> = (0..MAX_ARGS).map(|i| format!("w{}", i)).collect();
        match parse_ok(&max.join(" ")) {
            Node::Exec { argv } => {
                assert_eq!(argv, max.iter().map(OsString::from).collect::<Vec<_>>())
            }
            other => panic!("Expected exec, got {:?}", other),
        }

        let over: Vec<String> = (0..=MAX_ARGS).map(|i| format!("w{}", i)).collect();
        assert_eq!(
            parse(&over.join(" ")),
            Err(ParseError::TooManyArgs { max: MAX_ARGS })
        );
    }

    #[test]
    fn test_display_round_trip() {
        for line in [
            "cat < in | sort -r | uniq > out",
            "(a; b) | c &",
            "sleep 1 & &; echo done >> log",
        ] {
            let first = parse_ok(line);
            assert_eq!(parse_ok(&first.to_string()), first, "line: {}", line);
        }
    }

    #[test]
    fn test_non_utf8_words_are_kept() {
        match parse_ok(b"cat < caf\xe9.txt\n".as_slice()) {
            Node::Redirect { inner, file, .. } => {
                assert_eq!(*inner, exec(&["cat"]));
                assert_eq!(file.as_bytes(), b"caf\xe9.txt");
            }
            other => panic!("Expected redirect, got {:?}", other),
        }
    }
}
