use crate::{server::context::Context, Result};
use std::sync::Arc;

/// A trait for handling HTTP requests and middleware.
///
/// Route handlers and middleware are the same thing: a link in the chain
/// that receives the [`Context`]. A link either continues the chain with
/// [`Context::next`] (exactly once) or short-circuits by returning without
/// calling it. Code before `next()` runs on the way in, code after it runs
/// on the way out, in reverse registration order.
///
/// Any `Fn(&mut Context) -> Result<()>` is a handler.
///
/// # Examples
///
/// A plain function as a route handler:
/// ```
/// use onion_web::{Context, Result};
///
/// fn hello(ctx: &mut Context) -> Result<()> {
///     ctx.send_string("Hello World")
/// }
/// ```
/// A struct as middleware:
/// ```
/// use onion_web::{Context, Handler, Result};
///
/// struct PoweredBy(&'static str);
///
/// impl Handler for PoweredBy {
///     fn handle(&self, ctx: &mut Context) -> Result<()> {
///         ctx.next()?;
///         ctx.set("X-Powered-By", self.0);
///         Ok(())
///     }
/// }
/// ```
pub trait Handler
where
    Self: Sync + Send + 'static,
{
    /// Processes the request held by `ctx`.
    ///
    /// # Errors
    ///
    /// Returning an error stops the chain below this link; the dispatcher
    /// answers `500 Internal Server Error` and discards the response built
    /// so far. Panics are not caught unless a
    /// [`recovery`](crate::middleware::recovery) middleware sits above.
    fn handle(&self, ctx: &mut Context) -> Result<()>;
}

impl<F> Handler for F
where
    F: Fn(&mut Context) -> Result<()> + Sync + Send + 'static,
{
    #[inline]
    fn handle(&self, ctx: &mut Context) -> Result<()> {
        self(ctx)
    }
}

/// A handler shared between the routing table and every in-flight request.
pub type SharedHandler = Arc<dyn Handler>;

/// Wraps a handler for registration. Used by [`handlers!`](crate::handlers).
#[inline]
pub fn shared<H: Handler>(handler: H) -> SharedHandler {
    Arc::new(handler)
}

/// Builds the ordered handler list for a route.
///
/// # Examples
/// ```
/// use onion_web::{handlers, Context, Result, Server};
///
/// fn auth(ctx: &mut Context) -> Result<()> {
///     if ctx.get("authorization").is_empty() {
///         return ctx.send_status(onion_web::StatusCode::Unauthorized);
///     }
///     ctx.next()
/// }
///
/// fn secret(ctx: &mut Context) -> Result<()> {
///     ctx.send_string("42")
/// }
///
/// let mut server = Server::new();
/// server.get("/secret", handlers![auth, secret]);
/// ```
#[macro_export]
macro_rules! handlers {
    ($($handler:expr),* $(,)?) => {
        ::std::vec![$($crate::shared($handler)),*]
    };
}
