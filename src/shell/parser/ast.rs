use std::ffi::OsString;
use std::fmt;
use std::ops::Range;
use std::os::unix::io::RawFd;

/// Half-open byte range into the line being parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectMode {
    Read,     // <
    Truncate, // >
    Append,   // >>
}

impl RedirectMode {
    pub fn target_fd(self) -> RawFd {
        match self {
            RedirectMode::Read => libc::STDIN_FILENO,
            RedirectMode::Truncate | RedirectMode::Append => libc::STDOUT_FILENO,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            RedirectMode::Read => "<",
            RedirectMode::Truncate => ">",
            RedirectMode::Append => ">>",
        }
    }
}

/// Command tree, generic over how words are stored: spans straight out of
/// the parser, owned OS strings after the terminator pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node<W> {
    Exec {
        argv: Vec<W>,
    },
    Redirect {
        inner: Box<Node<W>>,
        file: W,
        mode: RedirectMode,
        fd: RawFd,
    },
    Pipe {
        left: Box<Node<W>>,
        right: Box<Node<W>>,
    },
    List {
        left: Box<Node<W>>,
        right: Box<Node<W>>,
    },
    Background {
        inner: Box<Node<W>>,
    },
}

pub type RawCommand = Node<Span>;
pub type Command = Node<OsString>;

impl<W> Node<W> {
    pub fn redirect(inner: Node<W>, file: W, mode: RedirectMode) -> Self {
        Node::Redirect {
            inner: Box::new(inner),
            file,
            mode,
            fd: mode.target_fd(),
        }
    }

    pub fn pipe(left: Node<W>, right: Node<W>) -> Self {
        Node::Pipe {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn list(left: Node<W>, right: Node<W>) -> Self {
        Node::List {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn background(inner: Node<W>) -> Self {
        Node::Background {
            inner: Box::new(inner),
        }
    }

    /// Rebuilds the tree with every word passed through `f`, children before
    /// the node's own words.
    pub fn map_words<V, F>(self, f: &mut F) -> Node<V>
    where
        F: FnMut(W) -> V,
    {
        match self {
            Node::Exec { argv } => Node::Exec {
                argv: argv.into_iter().map(|w| f(w)).collect(),
            },
            Node::Redirect {
                inner,
                file,
                mode,
                fd,
            } => {
                let inner = inner.map_words(f);
                Node::Redirect {
                    inner: Box::new(inner),
                    file: f(file),
                    mode,
                    fd,
                }
            }
            Node::Pipe { left, right } => {
                let left = left.map_words(f);
                Node::pipe(left, right.map_words(f))
            }
            Node::List { left, right } => {
                let left = left.map_words(f);
                Node::list(left, right.map_words(f))
            }
            Node::Background { inner } => Node::background(inner.map_words(f)),
        }
    }

    fn is_simple(&self) -> bool {
        matches!(self, Node::Exec { .. } | Node::Redirect { .. })
    }
}

impl Command {
    /// Number of processes that will replace their image when this tree runs.
    pub fn exec_count(&self) -> usize {
        match self {
            Node::Exec { argv } => usize::from(!argv.is_empty()),
            Node::Redirect { inner, .. } | Node::Background { inner } => inner.exec_count(),
            Node::Pipe { left, right } | Node::List { left, right } => {
                left.exec_count() + right.exec_count()
            }
        }
    }
}

struct Grouped<'a>(&'a Command);

impl fmt::Display for Grouped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_simple() {
            write!(f, "{}", self.0)
        } else {
            write!(f, "({})", self.0)
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Exec { argv } => {
                let words: Vec<_> = argv.iter().map(|w| w.to_string_lossy()).collect();
                write!(f, "{}", words.join(" "))
            }
            Node::Redirect {
                inner, file, mode, ..
            } => {
                if matches!(**inner, Node::Exec { ref argv } if argv.is_empty()) {
                    write!(f, "{} {}", mode.symbol(), file.to_string_lossy())
                } else {
                    let file = file.to_string_lossy();
                    write!(f, "{} {} {}", Grouped(&**inner), mode.symbol(), file)
                }
            }
            Node::Pipe { left, right } => {
                // 右侧的管道本身就是右结合，不用加括号
                match **right {
                    Node::Pipe { .. } => write!(f, "{} | {}", Grouped(&**left), right),
                    _ => write!(f, "{} | {}", Grouped(&**left), Grouped(&**right)),
                }
            }
            Node::List { left, right } => write!(f, "{}; {}", left, right),
            Node::Background { inner } => match **inner {
                Node::List { .. } => write!(f, "({}) &", inner),
                _ => write!(f, "{} &", inner),
            },
        }
    }
}
