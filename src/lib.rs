//! `mapi-session` is the session and response-streaming layer of a MAPI
//! database client.
//!
//! A [`Session`] sits on top of a connected line transport and offers:
//! - [`Session::submit`], which writes command text and returns every reply
//!   as a [`ResponseSequence`]
//! - [`TabularResult::row_at`], which fetches result pages lazily with
//!   `export` and grows the page size during sequential scans
//! - a background sender for commands larger than one transport block
//!
//! Connecting, login and block framing are the transport's business; see
//! [`LineReader`] and [`LineWriter`].

mod block;
mod decode;
mod error;
mod options;
mod response;
mod result;
mod row;
mod sender;
mod session;
mod transport;
mod types;
mod wire;

pub use error::{
    ErrorChain, ServerError, SessionError, TransportError, PROTOCOL_VIOLATION, UNKNOWN_RESULT,
    WRITE_FAILURE,
};
pub use options::{Language, SessionOptions, SubmitOptions, DEFAULT_PAGE_SIZE};
pub use response::{Response, ResponseSequence};
pub use result::TabularResult;
pub use row::Row;
pub use session::Session;
pub use transport::{BoxFuture, Line, LineKind, LineReader, LineWriter, DEFAULT_BLOCK_SIZE, PROMPT};
pub use types::{AutoCommitChange, CursorKind, Savepoint, UpdateResult, Warning};

pub type Result<T> = std::result::Result<T, SessionError>;
