//! Boundary to the line transport.
//!
//! The session never touches sockets itself. A transport hands out complete,
//! classified lines and accepts framed command text; block framing and the
//! login handshake live on the other side of these traits.

use std::future::Future;
use std::pin::Pin;

use crate::TransportError;

/// Payload size of one transport block. Commands longer than this are
/// written from the background sender.
pub const DEFAULT_BLOCK_SIZE: usize = 8 * 1024 - 2;

/// Line a transport reports at the end of a server reply.
pub const PROMPT: &str = "\u{1}\u{1}";

/// Boxed future returned by transport halves.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Kind of a protocol line, decided by its first character.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LineKind {
    Prompt,
    Header,
    Result,
    Error,
    Info,
    StartOfHeader,
    Unknown,
}

impl LineKind {
    /// Classifies a raw line as read from the server.
    pub fn classify(line: &str) -> Self {
        if line.is_empty() || line == PROMPT {
            return Self::Prompt;
        }
        match line.as_bytes()[0] {
            b'&' => Self::StartOfHeader,
            b'%' => Self::Header,
            b'[' | b'=' => Self::Result,
            b'!' => Self::Error,
            b'#' => Self::Info,
            _ => Self::Unknown,
        }
    }
}

/// A classified line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Line {
    pub text: String,
    pub kind: LineKind,
}

impl Line {
    pub fn new(text: impl Into<String>, kind: LineKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }

    /// Builds a line and classifies it with [`LineKind::classify`].
    pub fn classified(text: impl Into<String>) -> Self {
        let text = text.into();
        let kind = LineKind::classify(&text);
        Self { text, kind }
    }

    pub fn prompt() -> Self {
        Self::new(PROMPT, LineKind::Prompt)
    }
}

/// Reading half of a transport.
pub trait LineReader: Send {
    /// Blocks until the next line is available.
    fn read_line(&mut self) -> BoxFuture<'_, Result<Line, TransportError>>;
}

/// Writing half of a transport.
pub trait LineWriter: Send {
    /// Writes one framed command and flushes it.
    fn write_line<'a>(&'a mut self, text: &'a str) -> BoxFuture<'a, Result<(), TransportError>>;
}
