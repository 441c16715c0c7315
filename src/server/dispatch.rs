use crate::{
    http::{request::Request, response::Response, types::StatusCode},
    server::{context::Context, handler::SharedHandler, router::Router},
};

/// Turns one decoded request into one response.
///
/// Resolution happens before anything runs: an unknown route is answered
/// with `404 Not Found` and the global middleware is skipped. A resolved
/// route runs `middleware ++ route handlers` as one chain.
pub(crate) struct Dispatcher {
    router: Router,
    middleware: Vec<SharedHandler>,
}

impl Dispatcher {
    #[inline]
    pub(crate) fn new(router: Router, middleware: Vec<SharedHandler>) -> Self {
        Self { router, middleware }
    }

    pub(crate) fn dispatch(&self, request: Request) -> Response {
        let Some(route) = self.router.resolve(request.method(), request.path()) else {
            tracing::debug!(method = request.method(), path = request.path(), "no route");
            return Response::with_status(StatusCode::NotFound);
        };

        let keep_alive = request.keep_alive();

        let mut chain = Vec::with_capacity(self.middleware.len() + route.len());
        chain.extend_from_slice(&self.middleware);
        chain.extend_from_slice(route);

        let mut ctx = Context::new(request, chain);

        if let Err(err) = ctx.next() {
            tracing::error!(
                method = ctx.method(),
                path = ctx.path(),
                error = %err,
                "handler chain failed"
            );
            return Response::with_status(StatusCode::InternalServerError);
        }

        let mut response = ctx.into_response();
        if keep_alive {
            response.header("Connection", "keep-alive");
        }
        response
    }
}
