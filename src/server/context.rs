use crate::{
    http::{request::Request, response::Response, types::StatusCode},
    server::handler::SharedHandler,
    Result,
};
use std::sync::Arc;

/// Per-request execution context.
///
/// Holds the decoded [`Request`], the [`Response`] being built, the handler
/// chain for this request (global middleware followed by the route's
/// handlers) and a cursor into it. A context belongs to exactly one
/// in-flight request.
pub struct Context {
    request: Request,
    response: Response,
    handlers: Vec<SharedHandler>,
    // Index of the next handler to run.
    cursor: usize,
}

impl Context {
    #[inline]
    pub(crate) fn new(request: Request, handlers: Vec<SharedHandler>) -> Self {
        Self {
            request,
            response: Response::new(),
            handlers,
            cursor: 0,
        }
    }

    #[inline]
    pub(crate) fn into_response(self) -> Response {
        self.response
    }

    /// Runs the next handler of the chain and returns its result.
    ///
    /// # Panics
    ///
    /// Error message: `next() called past the end of the handler chain`
    ///
    /// Panics when the last handler of the chain calls `next()`. Every
    /// handler that does not short-circuit must call it exactly once.
    #[track_caller]
    pub fn next(&mut self) -> Result<()> {
        let Some(handler) = self.handlers.get(self.cursor).map(Arc::clone) else {
            panic!("next() called past the end of the handler chain");
        };

        self.cursor += 1;
        handler.handle(self)
    }
}

// Public API
impl Context {
    #[inline(always)]
    pub fn request(&self) -> &Request {
        &self.request
    }

    #[inline(always)]
    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    #[inline(always)]
    pub fn response(&self) -> &Response {
        &self.response
    }

    #[inline(always)]
    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    #[inline(always)]
    pub fn method(&self) -> &str {
        self.request.method()
    }

    #[inline(always)]
    pub fn path(&self) -> &str {
        self.request.path()
    }

    /// Returns a request header, or `""` when it is absent.
    #[inline]
    pub fn get(&self, name: &str) -> &str {
        self.request.header(name).unwrap_or_default()
    }

    /// Sets a response header.
    #[inline]
    pub fn set<V: ToString>(&mut self, name: &str, value: V) -> &mut Self {
        self.response.header(name, value);
        self
    }

    #[inline]
    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.response.status(status);
        self
    }

    #[inline]
    pub fn send<B: Into<Vec<u8>>>(&mut self, body: B) -> &mut Self {
        self.response.body(body);
        self
    }

    /// Sets a text body. Always `Ok`, so a handler can end with it.
    #[inline]
    pub fn send_string<S: Into<String>>(&mut self, body: S) -> Result<()> {
        self.response.body(body.into());
        Ok(())
    }

    /// Sets the status without a body. Always `Ok`, so a handler can end with it.
    #[inline]
    pub fn send_status(&mut self, status: StatusCode) -> Result<()> {
        self.response.status(status);
        Ok(())
    }
}
