use crate::{
    errors::Error,
    limits::{ConnLimits, ServerLimits},
    server::{
        connection::HttpConnection,
        dispatch::Dispatcher,
        handler::{shared, Handler, SharedHandler},
        router::Router,
    },
    Method, Result,
};
use crossbeam::utils::CachePadded;
use socket2::{Domain, Protocol, Socket, Type};
use std::{
    io,
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use tokio::{
    net::{lookup_host, TcpListener},
    sync::{watch, Notify},
    task::JoinHandle,
};
use tracing::Instrument;

/// An HTTP server: routing table, global middleware and limits.
///
/// Everything is configured up front. [`listen`](Self::listen) consumes the
/// server, so routes and middleware are immutable once connections are
/// being accepted.
///
/// # Examples
///
/// ```no_run
/// use onion_web::{handlers, middleware, Context, Server};
///
/// #[tokio::main]
/// async fn main() {
///     let mut server = Server::new();
///
///     server
///         .middleware(middleware::recovery::new())
///         .get("/", handlers![|ctx: &mut Context| ctx.send_string("Hello World")]);
///
///     let handle = server.listen("127.0.0.1:8080").await;
///
///     tokio::signal::ctrl_c().await.unwrap();
///     handle.shutdown(false).await;
/// }
/// ```
pub struct Server {
    router: Router,
    middleware: Vec<SharedHandler>,

    server_limits: ServerLimits,
    conn_limits: ConnLimits,
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Server {
    /// Creates a server with default limits.
    #[inline]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a new builder for configuring the server instance.
    ///
    /// # Examples
    ///
    /// ```
    /// use onion_web::{Server, limits::ConnLimits};
    /// use std::time::Duration;
    ///
    /// let server = Server::builder()
    ///     .connection_limits(ConnLimits {
    ///         idle_timeout: Duration::from_secs(10),
    ///         ..ConnLimits::default() // Required line
    ///     })
    ///     .build();
    /// # drop(server);
    /// ```
    #[inline]
    pub fn builder() -> ServerBuilder {
        ServerBuilder {
            server_limits: None,
            connection_limits: None,
        }
    }
}

// Public API
impl Server {
    /// Appends a global middleware.
    ///
    /// Global middleware runs, in registration order, in front of the
    /// handlers of every *resolved* route. It does not run for requests
    /// answered with `404 Not Found`.
    #[inline]
    pub fn middleware<H: Handler>(&mut self, handler: H) -> &mut Self {
        self.middleware.push(shared(handler));
        self
    }

    /// Registers a route. A later registration of the same method and path
    /// replaces the earlier one.
    ///
    /// # Panics
    ///
    /// Error message: `missing handler when registering a route`
    ///
    /// Panics when `handlers` is empty.
    #[track_caller]
    pub fn add(&mut self, method: Method, path: &str, handlers: Vec<SharedHandler>) -> &mut Self {
        if let Err(err) = self.router.register(method, path, handlers) {
            panic!("missing handler when registering a route ({err})");
        }
        self
    }

    /// Shortcut for [`add`](Self::add) with [`Method::Get`].
    #[inline]
    #[track_caller]
    pub fn get(&mut self, path: &str, handlers: Vec<SharedHandler>) -> &mut Self {
        self.add(Method::Get, path, handlers)
    }

    /// Shortcut for [`add`](Self::add) with [`Method::Post`].
    #[inline]
    #[track_caller]
    pub fn post(&mut self, path: &str, handlers: Vec<SharedHandler>) -> &mut Self {
        self.add(Method::Post, path, handlers)
    }

    /// Binds `addr` and starts accepting connections in the background.
    ///
    /// # Panics
    ///
    /// Panics when the address cannot be bound; see
    /// [`try_listen`](Self::try_listen) for the fallible variant.
    pub async fn listen(self, addr: &str) -> ServerHandle {
        match self.try_listen(addr).await {
            Ok(handle) => handle,
            Err(err) => panic!("{err}"),
        }
    }

    /// Binds `addr` and starts accepting connections in the background.
    ///
    /// # Errors
    ///
    /// [`Error::Bind`] when the address does not resolve or the socket
    /// cannot be created, bound or put into listening mode.
    pub async fn try_listen(self, addr: &str) -> Result<ServerHandle> {
        let bind_error = |source: io::Error| Error::Bind {
            addr: addr.to_owned(),
            source,
        };

        let socket_addr = lookup_host(addr)
            .await
            .map_err(bind_error)?
            .next()
            .ok_or_else(|| {
                bind_error(io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    "address resolved to nothing",
                ))
            })?;

        let listener = bind(socket_addr, &self.server_limits).map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        tracing::info!(
            address = %local_addr,
            backlog = self.server_limits.backlog,
            routes = self.router.len(),
            middleware = self.middleware.len(),
            "listener bound"
        );

        let shared = Arc::new(Shared::new(
            Dispatcher::new(self.router, self.middleware),
            self.conn_limits,
        ));
        let accept_loop = tokio::spawn(accept_loop(
            listener,
            shared.clone(),
            self.server_limits.nodelay,
        ));

        Ok(ServerHandle {
            local_addr,
            shared,
            accept_loop,
        })
    }
}

fn bind(addr: SocketAddr, limits: &ServerLimits) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;

    socket.set_reuse_address(limits.reuse_address)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(i32::try_from(limits.backlog).unwrap_or(i32::MAX))?;

    TcpListener::from_std(socket.into())
}

async fn accept_loop(listener: TcpListener, shared: Arc<Shared>, nodelay: bool) {
    let mut shutdown = shared.subscribe();

    loop {
        let accepted = tokio::select! {
            biased;
            _ = stop_requested(&mut shutdown, true) => break,
            accepted = listener.accept() => accepted,
        };

        let (stream, peer) = match accepted {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(error = %err, "accept failed");
                continue;
            }
        };

        if nodelay {
            if let Err(err) = stream.set_nodelay(true) {
                tracing::debug!(peer = %peer, error = %err, "failed to set TCP_NODELAY");
            }
        }

        let guard = ActiveConnection::new(shared.clone());
        let span = tracing::debug_span!("connection", peer = %peer);

        tokio::spawn(
            async move {
                let mut stream = stream;
                tracing::debug!(active = guard.count(), "connection accepted");

                HttpConnection::new(guard.shared()).run(&mut stream).await;
                drop(guard);
            }
            .instrument(span),
        );
    }

    tracing::debug!("accept loop stopped");
}

//

/// Builder for configuring and creating [`Server`] instances.
pub struct ServerBuilder {
    server_limits: Option<ServerLimits>,
    connection_limits: Option<ConnLimits>,
}

impl ServerBuilder {
    /// Configures the listening socket.
    ///
    /// # Examples
    ///
    /// ```
    /// use onion_web::{Server, limits::ServerLimits};
    ///
    /// let server = Server::builder()
    ///     .server_limits(ServerLimits {
    ///         // Your changes
    ///         backlog: 128,
    ///         reuse_address: false,
    ///         ..ServerLimits::default() // Required line
    ///     })
    ///     .build();
    /// # drop(server);
    /// ```
    #[inline(always)]
    pub fn server_limits(mut self, limits: ServerLimits) -> Self {
        self.server_limits = Some(limits);
        self
    }

    /// Configures connection timeouts and read buffering.
    ///
    /// # Examples
    ///
    /// ```
    /// use onion_web::{Server, limits::ConnLimits};
    /// use std::time::Duration;
    ///
    /// let server = Server::builder()
    ///     .connection_limits(ConnLimits {
    ///         // Your changes
    ///         idle_timeout: Duration::from_secs(5),
    ///         max_request_size: 64 * 1024,
    ///         ..ConnLimits::default() // Required line
    ///     })
    ///     .build();
    /// # drop(server);
    /// ```
    #[inline(always)]
    pub fn connection_limits(mut self, limits: ConnLimits) -> Self {
        self.connection_limits = Some(limits);
        self
    }

    /// Finalizes the builder and constructs a [`Server`] with no routes.
    #[inline]
    pub fn build(self) -> Server {
        Server {
            router: Router::new(),
            middleware: Vec::new(),

            server_limits: self.server_limits.unwrap_or_default(),
            conn_limits: self.connection_limits.unwrap_or_default(),
        }
    }
}

//

/// Handle to a listening server.
///
/// Dropping the handle leaves the server running in the background.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shared: Arc<Shared>,
    accept_loop: JoinHandle<()>,
}

impl ServerHandle {
    /// Address the listener is bound to (useful after binding port `0`).
    #[inline]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of connections currently being served.
    #[inline]
    pub fn active_connections(&self) -> usize {
        self.shared.active.load(Ordering::Acquire)
    }

    /// Stops accepting connections and closes the listening socket.
    ///
    /// - `force == false`: idle connections are closed, requests already
    ///   being received are answered, and the call returns once every
    ///   connection has finished.
    /// - `force == true`: every connection is closed at its next read or
    ///   write, and the call returns without waiting for them.
    ///
    /// A handler that blocks forever keeps its connection alive; nothing
    /// interrupts user code.
    pub async fn shutdown(self, force: bool) {
        tracing::info!(
            force,
            active = self.active_connections(),
            "shutting down"
        );

        self.shared
            .signal(if force { Phase::Aborting } else { Phase::Draining });

        if let Err(err) = self.accept_loop.await {
            tracing::error!(error = %err, "accept loop terminated abnormally");
        }

        if !force {
            self.shared.drained().await;
        }

        tracing::info!(
            active = self.shared.active.load(Ordering::Acquire),
            "shutdown complete"
        );
    }
}

//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Running,
    Draining,
    Aborting,
}

impl Phase {
    // `idle`: no byte of the next request has arrived yet
    #[inline]
    fn closes(self, idle: bool) -> bool {
        match self {
            Phase::Running => false,
            Phase::Draining => idle,
            Phase::Aborting => true,
        }
    }
}

/// Resolves once the shutdown phase says a task in the given position must stop.
pub(crate) async fn stop_requested(shutdown: &mut watch::Receiver<Phase>, idle: bool) {
    loop {
        if shutdown.borrow_and_update().closes(idle) {
            return;
        }
        if shutdown.changed().await.is_err() {
            // Sender gone: no stop can ever be requested
            return std::future::pending().await;
        }
    }
}

/// State shared by the accept loop and every connection task.
pub(crate) struct Shared {
    pub(crate) dispatcher: Dispatcher,
    pub(crate) conn_limits: ConnLimits,

    phase: watch::Sender<Phase>,
    active: CachePadded<AtomicUsize>,
    drained: Notify,
}

impl Shared {
    pub(crate) fn new(dispatcher: Dispatcher, conn_limits: ConnLimits) -> Self {
        let (phase, _) = watch::channel(Phase::Running);

        Self {
            dispatcher,
            conn_limits,

            phase,
            active: CachePadded::new(AtomicUsize::new(0)),
            drained: Notify::new(),
        }
    }

    #[inline]
    pub(crate) fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    #[inline]
    pub(crate) fn signal(&self, phase: Phase) {
        self.phase.send_replace(phase);
    }

    async fn drained(&self) {
        loop {
            // Registered before the check, so a wake-up in between is not lost
            let notified = self.drained.notified();

            if self.active.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}

// Counts a connection from accept until its task ends, panics included.
struct ActiveConnection(Arc<Shared>);

impl ActiveConnection {
    #[inline]
    fn new(shared: Arc<Shared>) -> Self {
        shared.active.fetch_add(1, Ordering::AcqRel);
        Self(shared)
    }

    #[inline]
    fn shared(&self) -> Arc<Shared> {
        self.0.clone()
    }

    #[inline]
    fn count(&self) -> usize {
        self.0.active.load(Ordering::Acquire)
    }
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        if self.0.active.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.drained.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{handlers, Context};
    use std::time::Duration;

    #[test]
    fn builder_applies_limits() {
        let server = Server::builder()
            .server_limits(ServerLimits {
                backlog: 7,
                ..ServerLimits::default()
            })
            .connection_limits(ConnLimits {
                idle_timeout: Duration::from_secs(3),
                ..ConnLimits::default()
            })
            .build();

        assert_eq!(server.server_limits.backlog, 7);
        assert_eq!(server.conn_limits.idle_timeout, Duration::from_secs(3));
        assert!(server.router.is_empty());

        let server = Server::new();
        assert_eq!(server.conn_limits.idle_timeout, Duration::from_secs(120));
    }

    #[test]
    fn registration() {
        let mut server = Server::new();
        server
            .middleware(|ctx: &mut Context| ctx.next())
            .get("/", handlers![|ctx: &mut Context| ctx.send_string("a")])
            .post("items", handlers![|ctx: &mut Context| ctx.send_string("b")])
            .add(
                Method::Delete,
                "/items",
                handlers![|ctx: &mut Context| ctx.send_string("c")],
            );

        assert_eq!(server.middleware.len(), 1);
        assert_eq!(server.router.len(), 3);
        assert!(server.router.resolve("POST", "/items").is_some());
    }

    #[test]
    #[should_panic(expected = "missing handler when registering a route")]
    fn empty_registration_panics() {
        Server::new().get("/", handlers![]);
    }

    #[test]
    fn phase_table() {
        let cases = [
            (Phase::Running, true, false),
            (Phase::Running, false, false),
            (Phase::Draining, true, true),
            (Phase::Draining, false, false),
            (Phase::Aborting, true, true),
            (Phase::Aborting, false, true),
        ];

        for (phase, idle, closes) in cases {
            assert_eq!(phase.closes(idle), closes, "{phase:?} idle={idle}");
        }
    }

    #[tokio::test]
    async fn counter_follows_guards() {
        let shared = Arc::new(Shared::new(
            Dispatcher::new(Router::new(), vec![]),
            ConnLimits::default(),
        ));

        let first = ActiveConnection::new(shared.clone());
        let second = ActiveConnection::new(shared.clone());
        assert_eq!(first.count(), 2);

        let waiter = {
            let shared = shared.clone();
            tokio::spawn(async move { shared.drained().await })
        };

        drop(first);
        assert_eq!(shared.active.load(Ordering::Acquire), 1);
        drop(second);

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        match Server::new().try_listen("not an address").await {
            Err(Error::Bind { addr, .. }) => assert_eq!(addr, "not an address"),
            other => panic!("unexpected {:?}", other.err()),
        }
    }
}
