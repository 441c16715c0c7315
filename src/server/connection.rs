use crate::{
    errors::ErrorKind,
    http::request::{Request, HEADERS_END},
    server::server_impl::{stop_requested, Phase, Shared},
};
use memchr::memmem;
use socket2::SockRef;
use std::{
    io::{self, Read},
    sync::Arc,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    sync::watch,
    time::{timeout_at, Instant},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Reading,
    Dispatching,
    Writing,
    Closed,
}

/// Owns one accepted connection for its whole life.
///
/// ```text
/// Idle -> Reading -> Dispatching -> Writing -> (Idle | Closed)
/// ```
///
/// Requests on one connection are handled strictly one after another.
pub(crate) struct HttpConnection {
    shutdown: watch::Receiver<Phase>,
    state: State,
    request_count: usize,

    read_buffer: Vec<u8>,
    write_buffer: Vec<u8>,

    shared: Arc<Shared>,
}

impl HttpConnection {
    #[inline]
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self {
            shutdown: shared.subscribe(),
            state: State::Idle,
            request_count: 0,

            read_buffer: Vec::with_capacity(shared.conn_limits.read_chunk_size),
            write_buffer: Vec::new(),

            shared,
        }
    }

    #[inline]
    fn transition(&mut self, next: State) {
        tracing::trace!(from = ?self.state, to = ?next, "connection state");
        self.state = next;
    }
}

impl HttpConnection {
    /// Serves the connection until it closes. Never fails: every reason to
    /// stop is local to this connection and only logged.
    pub(crate) async fn run(&mut self, stream: &mut TcpStream) {
        let result = self.impl_run(stream).await;
        self.transition(State::Closed);

        match result {
            Ok(()) => tracing::debug!(requests = self.request_count, "connection closed"),
            Err(err @ ErrorKind::Io(_)) if !err.is_routine() => {
                tracing::warn!(requests = self.request_count, error = %err, "connection failed")
            }
            Err(err) => {
                tracing::debug!(requests = self.request_count, reason = %err, "connection closed")
            }
        }
    }

    pub(crate) async fn impl_run(&mut self, stream: &mut TcpStream) -> Result<(), ErrorKind> {
        loop {
            let deadline = Instant::now() + self.shared.conn_limits.idle_timeout;

            self.transition(State::Reading);
            if !self.read_request(stream, deadline).await? {
                tracing::debug!("peer closed without sending a request");
                // Closed read side: another read would only return EOF again
                return Ok(());
            }

            let request = Request::parse(&self.read_buffer)?;
            let keep_alive = request.keep_alive();

            self.transition(State::Dispatching);
            let mut response = self.shared.dispatcher.dispatch(request);

            // Last response on this connection once the server stops
            let stopping = *self.shutdown.borrow() != Phase::Running;
            if stopping {
                response.header("Connection", "close");
            }

            self.transition(State::Writing);
            self.write_buffer.clear();
            response.write_to(&mut self.write_buffer);
            self.write_response(stream, deadline).await?;

            self.request_count += 1;
            if !keep_alive || stopping {
                return Ok(());
            }

            self.transition(State::Idle);
        }
    }

    /// Accumulates chunks until the header terminator shows up.
    ///
    /// Returns `false` when the peer closed its side before sending a single
    /// byte. End of stream after some bytes frames the request as is.
    async fn read_request(
        &mut self,
        stream: &mut TcpStream,
        deadline: Instant,
    ) -> Result<bool, ErrorKind> {
        let limits = &self.shared.conn_limits;
        self.read_buffer.clear();

        loop {
            let filled = self.read_buffer.len();
            self.read_buffer.resize(filled + limits.read_chunk_size, 0);

            // A draining server only waits for requests that already started.
            let read = tokio::select! {
                biased;
                _ = stop_requested(&mut self.shutdown, filled == 0) => None,
                read = timeout_at(deadline, stream.read(&mut self.read_buffer[filled..])) => Some(match read {
                    Ok(read) => read.map_err(ErrorKind::from),
                    Err(_) => Err(ErrorKind::Timeout),
                }),
            };
            let read = match read {
                Some(read) => read?,
                None if filled == 0 => {
                    read_pending(&self.shutdown, stream, &mut self.read_buffer[filled..])?
                }
                None => return Err(ErrorKind::Shutdown),
            };
            self.read_buffer.truncate(filled + read);

            if read == 0 {
                return Ok(filled != 0);
            }

            // The terminator may straddle two chunks
            let from = filled.saturating_sub(HEADERS_END.len() - 1);
            if memmem::find(&self.read_buffer[from..], HEADERS_END).is_some() {
                return Ok(true);
            }

            if self.read_buffer.len() > limits.max_request_size {
                return Err(ErrorKind::TooLarge(limits.max_request_size));
            }
        }
    }

    async fn write_response(
        &mut self,
        stream: &mut TcpStream,
        deadline: Instant,
    ) -> Result<(), ErrorKind> {
        tokio::select! {
            biased;
            _ = stop_requested(&mut self.shutdown, false) => Err(ErrorKind::Shutdown),
            written = timeout_at(deadline, stream.write_all(&self.write_buffer)) => match written {
                Ok(written) => written.map_err(ErrorKind::from),
                Err(_) => Err(ErrorKind::Timeout),
            },
        }
    }
}

/// Called once the server stops while the connection looks idle.
///
/// Under a drain, bytes the kernel already received belong to a request in
/// flight. They are read with a plain non-blocking `recv`, since the
/// runtime may not have seen the readiness event yet.
fn read_pending(
    shutdown: &watch::Receiver<Phase>,
    stream: &TcpStream,
    chunk: &mut [u8],
) -> Result<usize, ErrorKind> {
    if *shutdown.borrow() != Phase::Draining {
        return Err(ErrorKind::Shutdown);
    }

    let socket = SockRef::from(stream);
    match (&*socket).read(chunk) {
        Ok(read) => Ok(read),
        Err(err) if err.kind() == io::ErrorKind::WouldBlock => Err(ErrorKind::Shutdown),
        Err(err) => Err(err.into()),
    }
}
