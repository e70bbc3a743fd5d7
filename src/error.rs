use std::fmt;

/// Client side code of a protocol violation.
pub const PROTOCOL_VIOLATION: &str = "M0M10";
/// Client side code of a block for a result id that is not known.
pub const UNKNOWN_RESULT: &str = "M0M12";
/// Client side code of a failed background write.
pub const WRITE_FAILURE: &str = "08000";

/// Failure reported by the line transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// A read or write did not finish in time.
    #[error("connection timed out")]
    Timeout,
    /// The peer closed the connection or the transport was released.
    #[error("connection closed")]
    Closed,
    /// Underlying socket failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// One entry of a server error chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerError {
    /// Five character status code (SQLSTATE style).
    pub code: String,
    /// Error text as sent by the server.
    pub message: String,
}

impl ServerError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Errors collected between two prompts, in arrival order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorChain(pub Vec<ServerError>);

impl ErrorChain {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First error of the chain, if any.
    pub fn first(&self) -> Option<&ServerError> {
        self.0.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ServerError> {
        self.0.iter()
    }

    pub(crate) fn push(&mut self, error: ServerError) {
        self.0.push(error);
    }
}

impl fmt::Display for ErrorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, error) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport failure. The session is closed once this is returned.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// One or more error lines reported by the server.
    #[error("server error: {0}")]
    Server(ErrorChain),
    /// The reply stream did not have the expected shape.
    #[error("protocol violation: {message} ({code})")]
    Protocol {
        /// [`PROTOCOL_VIOLATION`] or [`UNKNOWN_RESULT`].
        code: &'static str,
        /// Description of the first violation.
        message: String,
        /// Server errors seen in the same prompt-to-prompt cycle.
        chain: ErrorChain,
    },
    /// The caller used the API in a way the session cannot serve.
    #[error("usage error: {0}")]
    Usage(String),
    /// The session was closed before the operation started.
    #[error("session is closed")]
    Closed,
}

impl SessionError {
    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            code: PROTOCOL_VIOLATION,
            message: message.into(),
            chain: ErrorChain::default(),
        }
    }

    /// Whether this error closed the whole session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Closed)
    }

    /// The server error chain carried by this error, if any.
    pub fn chain(&self) -> Option<&ErrorChain> {
        match self {
            Self::Server(chain) | Self::Protocol { chain, .. } => Some(chain),
            _ => None,
        }
    }
}
