use std::fmt;

use super::ast::Span;

pub const WHITESPACE: &[u8] = b" \t\r\n\x0b";
pub const SYMBOLS: &[u8] = b"<|>&;()";

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TokenKind {
    Word,
    Pipe,       // |
    Input,      // <
    Output,     // >
    Append,     // >>
    Semi,       // ;
    Background, // &
    LParen,     // (
    RParen,     // )
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Word => "word",
            TokenKind::Pipe => "|",
            TokenKind::Input => "<",
            TokenKind::Output => ">",
            TokenKind::Append => ">>",
            TokenKind::Semi => ";",
            TokenKind::Background => "&",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::Eof => "end of line",
        };
        f.write_str(s)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// Cursor over a single input line of raw bytes. Tokens are returned as
/// spans, the line itself is never copied.
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();
        let start = self.pos;

        let kind = match self.peek_byte() {
            None => TokenKind::Eof,
            Some(c) => match c {
                b'|' => self.single(TokenKind::Pipe),
                b'(' => self.single(TokenKind::LParen),
                b')' => self.single(TokenKind::RParen),
                b';' => self.single(TokenKind::Semi),
                b'&' => self.single(TokenKind::Background),
                b'<' => self.single(TokenKind::Input),
                b'>' => {
                    self.pos += 1;
                    if self.peek_byte() == Some(b'>') {
                        self.pos += 1;
                        TokenKind::Append
                    } else {
                        TokenKind::Output
                    }
                }
                _ => self.read_word(),
            },
        };
        let span = Span::new(start, self.pos);

        self.skip_whitespace();
        Token { kind, span }
    }

    /// Skips whitespace and reports whether the next byte is one of
    /// `symbols`. Nothing is consumed.
    pub fn peek(&mut self, symbols: &[u8]) -> bool {
        self.skip_whitespace();
        matches!(self.peek_byte(), Some(c) if symbols.contains(&c))
    }

    pub fn at_end(&mut self) -> bool {
        self.skip_whitespace();
        self.pos >= self.input.len()
    }

    pub fn rest(&self) -> &'a [u8] {
        self.input.get(self.pos..).unwrap_or_default()
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.pos += 1;
        kind
    }

    fn peek_byte(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_byte() {
            if !WHITESPACE.contains(&c) {
                break;
            }
            self.pos += 1;
        }
    }

    fn read_word(&mut self) -> TokenKind {
        while let Some(c) = self.peek_byte() {
            if WHITESPACE.contains(&c) || SYMBOLS.contains(&c) {
                break;
            }
            self.pos += 1;
        }
        TokenKind::Word
    }
}
