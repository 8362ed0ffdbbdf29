use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;

use super::ast::{Command, RawCommand, Span};

/// Turns every span in the tree into an owned word cut from `line`. Bytes
/// are kept as they are, so names that are not UTF-8 survive.
/// Must run once, after the whole line has been parsed.
pub fn terminate(raw: RawCommand, line: &[u8]) -> Command {
    raw.map_words(&mut |span: Span| {
        OsStr::from_bytes(line.get(span.range()).unwrap_or_default()).to_os_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::parser::ast::{Node, RedirectMode};
    use std::ffi::OsString;

    #[test]
    fn test_terminate_exec_and_redirect() {
        let line = "ls -l /tmp > out\n";
        let raw = Node::redirect(
            Node::Exec {
                argv: vec![Span::new(0, 2), Span::new(3, 5), Span::new(6, 10)],
            },
            Span::new(13, 16),
            RedirectMode::Truncate,
        );
        match terminate(raw, line.as_bytes()) {
            Node::Redirect { inner, file, .. } => {
                assert_eq!(file, "out");
                assert_eq!(
                    *inner,
                    Node::Exec {
                        argv: vec!["ls".into(), "-l".into(), "/tmp".into()]
                    }
                );
            }
            other => panic!("Expected redirect, got {:?}", other),
        }
    }

    #[test]
    fn test_terminate_out_of_range_span_is_empty() {
        let raw: RawCommand = Node::Exec {
            argv: vec![Span::new(4, 40)],
        };
        assert_eq!(
            terminate(raw, b"echo"),
            Node::Exec {
                argv: vec![OsString::new()]
            }
        );
    }

    #[test]
    fn test_terminate_keeps_raw_bytes() {
        let line = b"cat caf\xe9.txt\n";
        let raw: RawCommand = Node::Exec {
            argv: vec![Span::new(0, 3), Span::new(4, 12)],
        };
        match terminate(raw, line) {
            Node::Exec { argv } => {
                assert_eq!(argv[0], "cat");
                assert_eq!(argv[1].as_bytes(), b"caf\xe9.txt");
            }
            other => panic!("Expected exec, got {:?}", other),
        }
    }
}
