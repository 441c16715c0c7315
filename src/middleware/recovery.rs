//! Panic recovery.
//!
//! Install it first so it sits above everything that can panic:
//!
//! ```
//! use onion_web::{middleware::recovery, Server};
//!
//! let mut server = Server::new();
//! server.middleware(recovery::new());
//! ```

use crate::{Context, Handler, Result, StatusCode};
use std::{
    any::Any,
    panic::{catch_unwind, AssertUnwindSafe},
};

/// Body sent when a panic was recovered.
pub const RECOVERED_BODY: &str = "received an error while executing";

/// Catches a panic anywhere below it in the chain and answers
/// `503 Service Unavailable` with [`RECOVERED_BODY`].
///
/// The recovered request counts as handled: headers set before the panic
/// are kept and the rest of the chain unwinds normally. Needs the default
/// `panic = "unwind"` strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct Recovery;

#[inline]
pub fn new() -> Recovery {
    Recovery
}

impl Handler for Recovery {
    fn handle(&self, ctx: &mut Context) -> Result<()> {
        match catch_unwind(AssertUnwindSafe(|| ctx.next())) {
            Ok(result) => result,
            Err(payload) => {
                tracing::error!(
                    method = ctx.method(),
                    path = ctx.path(),
                    panic = %payload_to_string(payload.as_ref()),
                    "recovered from panic"
                );

                ctx.status(StatusCode::ServiceUnavailable)
                    .send_string(RECOVERED_BODY)
            }
        }
    }
}

fn payload_to_string(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
