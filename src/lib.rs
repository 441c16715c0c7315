//! onion_web - Minimal HTTP/1.1 server engine with onion-style middleware
//!
//! A small server built directly on TCP sockets: it accepts connections,
//! decodes requests, runs them through an ordered chain of handlers and
//! writes the responses back, keeping connections alive between requests.
//!
//! # Execution model
//!
//! Global middleware and route handlers form one chain per request. Each
//! link receives the [`Context`] and continues the chain with
//! [`Context::next`]. Code before `next()` runs on the way in, code after it
//! on the way out:
//!
//! ```text
//!  request ──► recovery ──► cors ──► compress ──► route handler
//!                                                      │
//! response ◄── recovery ◄── cors ◄── compress ◄────────┘
//! ```
//!
//! - An unknown route is answered with `404 Not Found`; middleware does not run.
//! - A handler returning `Err` yields `500 Internal Server Error` with an empty body.
//! - A panic is turned into `503 Service Unavailable` when
//!   [`recovery`](middleware::recovery) sits above it.
//!
//! # Limitations
//!
//! - No HTTP/2, TLS or chunked transfer-encoding.
//! - Routing is by exact path; there are no path parameters.
//! - `Content-Length` of requests is not honoured: a request is framed at
//!   the blank line after its headers (or at the peer closing its side).
//! - Malformed requests close the connection without a response.
//!
//! # Examples
//!
//! Quick start:
//! ```no_run
//! use onion_web::{handlers, Context, Result, Server};
//!
//! fn hello(ctx: &mut Context) -> Result<()> {
//!     ctx.send_string("Hello World")
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut server = Server::new();
//!     server.get("/", handlers![hello]);
//!
//!     let handle = server.listen("127.0.0.1:8080").await;
//!     tokio::signal::ctrl_c().await.unwrap();
//!     handle.shutdown(false).await;
//! }
//! ```
//! With middleware and limits:
//! ```no_run
//! use onion_web::{handlers, limits::ConnLimits, middleware, Context, Server, StatusCode};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut server = Server::builder()
//!         .connection_limits(ConnLimits {
//!             idle_timeout: Duration::from_secs(30),
//!             ..ConnLimits::default()
//!         })
//!         .build();
//!
//!     server
//!         .middleware(middleware::recovery::new())
//!         .middleware(middleware::cors::new())
//!         .middleware(middleware::compress::new())
//!         .get("/admin", handlers![
//!             |ctx: &mut Context| {
//!                 if ctx.get("authorization").is_empty() {
//!                     return ctx.send_status(StatusCode::Unauthorized);
//!                 }
//!                 ctx.next()
//!             },
//!             |ctx: &mut Context| ctx.send_string("welcome"),
//!         ]);
//!
//!     let handle = server.listen("127.0.0.1:8080").await;
//!     tokio::signal::ctrl_c().await.unwrap();
//!     handle.shutdown(true).await;
//! }
//! ```

pub(crate) mod http {
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod types;
}
pub(crate) mod server {
    pub(crate) mod connection;
    pub(crate) mod context;
    pub(crate) mod dispatch;
    pub(crate) mod handler;
    pub(crate) mod router;
    pub(crate) mod server_impl;
}
/// Middleware bundled with the engine.
pub mod middleware {
    pub mod compress;
    pub mod cors;
    pub mod recovery;
}
pub(crate) mod errors;
pub mod limits;

pub use crate::{
    errors::{Error, Result},
    http::{
        request::Request,
        response::Response,
        types::{HeaderMap, Method, StatusCode},
    },
    server::{
        context::Context,
        handler::{shared, Handler, SharedHandler},
        router::Router,
        server_impl::{Server, ServerBuilder, ServerHandle},
    },
};
