use crate::Method;
use std::{error, fmt, io};
use thiserror::Error;

/// Errors produced by the engine and returned by handlers.
///
/// Handlers return [`Result<()>`](crate::Result). Any `Err` that reaches the
/// dispatcher discards the response built so far and is answered with
/// `500 Internal Server Error`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The request bytes could not be decoded.
    #[error("malformed request: {0}")]
    MalformedRequest(&'static str),

    /// A route was registered without any handler.
    #[error("invalid registration of {method} {path}: no handlers supplied")]
    InvalidRegistration { method: Method, path: String },

    /// The listening socket could not be set up.
    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),

    /// The gzip encoder failed while compressing a response body.
    #[error("failed to compress response body: {0}")]
    Compression(#[source] io::Error),

    /// An error raised by user code inside a handler.
    #[error(transparent)]
    Handler(Box<dyn error::Error + Send + Sync>),
}

impl Error {
    /// Wraps an arbitrary error (or message) raised by a handler.
    ///
    /// # Examples
    /// ```
    /// use onion_web::{Context, Error, Result};
    ///
    /// fn load(ctx: &mut Context) -> Result<()> {
    ///     let id: u32 = ctx.get("x-user-id").parse().map_err(Error::handler)?;
    ///     ctx.send_string(format!("user {id}"))
    /// }
    /// ```
    pub fn handler<E>(err: E) -> Self
    where
        E: Into<Box<dyn error::Error + Send + Sync>>,
    {
        Error::Handler(err.into())
    }
}

/// Alias used by handlers and the public API.
pub type Result<T, E = Error> = std::result::Result<T, E>;

// Reasons a connection stops. Never sent to the client, only logged.
#[derive(Debug)]
pub(crate) enum ErrorKind {
    Timeout,
    Shutdown,
    TooLarge(usize),
    Malformed(Error),
    Io(io::Error),
}

impl ErrorKind {
    // Peer resets and idle expiries are routine, everything else is worth a look.
    pub(crate) fn is_routine(&self) -> bool {
        match self {
            ErrorKind::Timeout | ErrorKind::Shutdown => true,
            ErrorKind::Io(err) => matches!(
                err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ),
            ErrorKind::TooLarge(_) | ErrorKind::Malformed(_) => false,
        }
    }
}

impl error::Error for ErrorKind {}
impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Timeout => f.write_str("idle deadline elapsed"),
            ErrorKind::Shutdown => f.write_str("server is shutting down"),
            ErrorKind::TooLarge(len) => write!(f, "request head exceeds {len} bytes"),
            ErrorKind::Malformed(err) => write!(f, "{err}"),
            ErrorKind::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl From<io::Error> for ErrorKind {
    fn from(err: io::Error) -> Self {
        ErrorKind::Io(err)
    }
}

impl From<Error> for ErrorKind {
    fn from(err: Error) -> Self {
        ErrorKind::Malformed(err)
    }
}
