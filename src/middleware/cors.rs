//! Permissive CORS headers.

use crate::{Context, Handler, Method, Result, StatusCode};

/// Adds the `Access-Control-Allow-*` headers to every response and answers
/// preflight (`OPTIONS`) requests itself with `204 No Content`.
///
/// # Examples
/// ```
/// use onion_web::{middleware::cors, Server};
///
/// let mut server = Server::new();
/// server.middleware(cors::new().allow_origin("https://example.com"));
/// ```
#[derive(Debug, Clone)]
pub struct Cors {
    allow_origin: String,
    allow_methods: String,
    allow_headers: String,
}

impl Default for Cors {
    fn default() -> Self {
        Self {
            allow_origin: "*".to_owned(),
            allow_methods: "GET,POST,PUT,DELETE,OPTIONS".to_owned(),
            allow_headers: "Content-Type, Authorization".to_owned(),
        }
    }
}

/// Any origin, the common methods, `Content-Type` and `Authorization`.
#[inline]
pub fn new() -> Cors {
    Cors::default()
}

impl Cors {
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.allow_origin = origin.into();
        self
    }

    pub fn allow_methods(mut self, methods: impl Into<String>) -> Self {
        self.allow_methods = methods.into();
        self
    }

    pub fn allow_headers(mut self, headers: impl Into<String>) -> Self {
        self.allow_headers = headers.into();
        self
    }
}

impl Handler for Cors {
    fn handle(&self, ctx: &mut Context) -> Result<()> {
        ctx.set("Access-Control-Allow-Origin", &self.allow_origin)
            .set("Access-Control-Allow-Methods", &self.allow_methods)
            .set("Access-Control-Allow-Headers", &self.allow_headers);

        if ctx.method() == Method::Options {
            return ctx.send_status(StatusCode::NoContent);
        }

        ctx.next()
    }
}
