//! Listener and connection limits and timeouts
//!
//! Both structures are plain data with conservative defaults. Pass them to
//! [`ServerBuilder`](crate::ServerBuilder) before the server starts listening;
//! they are read-only afterwards.
//!
//! # Examples
//!
//! ```
//! use onion_web::{Server, limits::{ConnLimits, ServerLimits}};
//! use std::time::Duration;
//!
//! let server = Server::builder()
//!     .server_limits(ServerLimits {
//!         backlog: 4096, // Bigger accept queue
//!         ..ServerLimits::default()
//!     })
//!     .connection_limits(ConnLimits {
//!         idle_timeout: Duration::from_secs(30),
//!         ..ConnLimits::default()
//!     })
//!     .build();
//! # drop(server);
//! ```

use std::time::Duration;

/// Controls how the listening socket is created.
///
/// # Connection management
/// ```text
///    [------------]
///    [ Tcp accept ] <=========================\\
///    [------------]                           ||
///          ||                                 ||
///          \/                                 ||
/// /------------------\   Yes   [-------------------------]
/// | Shutdown signal? | ======> [ Close listening socket  ]
/// \------------------/         [-------------------------]
///          || No                              ||
///          \/                                 ||
/// [-------------------------]                 ||
/// [ Spawn connection task   ] ================//
/// [-------------------------]
/// ```
#[derive(Debug, Clone)]
pub struct ServerLimits {
    /// Maximum length of the kernel queue of pending connections (default: `1024`).
    pub backlog: u32,

    /// Sets `SO_REUSEADDR` on the listening socket (default: `true`).
    ///
    /// Allows a restarted server to bind the same address while old
    /// connections linger in `TIME_WAIT`.
    pub reuse_address: bool,

    /// Sets `TCP_NODELAY` on every accepted stream (default: `true`).
    ///
    /// Responses are written with a single `write_all`, so Nagle's algorithm
    /// only adds latency.
    pub nodelay: bool,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self {
            backlog: 1024,
            reuse_address: true,
            nodelay: true,

            _priv: (),
        }
    }
}

/// Connection-level limits and timeouts
///
/// Controls how long a connection may stay idle and how request bytes
/// are buffered before decoding.
#[derive(Debug, Clone)]
pub struct ConnLimits {
    /// Maximum time a connection may wait for a complete request (default: `120 seconds`)
    ///
    /// The deadline is armed every time the connection starts reading a new
    /// request and covers the whole read of it, plus the write of its
    /// response. When it elapses the connection is closed without a response.
    pub idle_timeout: Duration,

    /// Size of a single socket read (default: `4096` bytes)
    ///
    /// Reads are accumulated until the header terminator `\r\n\r\n` shows up
    /// or the peer closes its side.
    pub read_chunk_size: usize,

    /// Upper bound on the accumulated request bytes (default: `1 MiB`)
    ///
    /// A request that grows past it without a header terminator closes the
    /// connection.
    pub max_request_size: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ConnLimits {
    #[inline(always)]
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(120),
            read_chunk_size: 4096,
            max_request_size: 1024 * 1024,

            _priv: (),
        }
    }
}
