//! Gzip response compression.

use crate::{errors::Error, Context, Handler, Result};
use flate2::{write::GzEncoder, Compression};
use std::io::Write;

/// Gzips the response body on the way out when the client accepts it.
///
/// Runs after the rest of the chain. Empty bodies and bodies that already
/// carry a `Content-Encoding` are left alone.
///
/// # Examples
/// ```
/// use onion_web::{middleware::compress, Server};
///
/// let mut server = Server::new();
/// server.middleware(compress::new().level(9));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Compress {
    level: Compression,
}

impl Default for Compress {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

#[inline]
pub fn new() -> Compress {
    Compress::default()
}

impl Compress {
    /// Compression level from `0` (none) to `9` (best).
    pub fn level(mut self, level: u32) -> Self {
        self.level = Compression::new(level.min(9));
        self
    }
}

impl Handler for Compress {
    fn handle(&self, ctx: &mut Context) -> Result<()> {
        ctx.next()?;

        if !accepts_gzip(ctx.get("accept-encoding"))
            || ctx.response().body_bytes().is_empty()
            || ctx.response().header_value("content-encoding").is_some()
        {
            return Ok(());
        }

        let body = ctx.response().body_bytes();
        let mut encoder = GzEncoder::new(Vec::with_capacity(body.len() / 2), self.level);
        encoder.write_all(body).map_err(Error::Compression)?;
        let compressed = encoder.finish().map_err(Error::Compression)?;

        tracing::debug!(
            original = body.len(),
            compressed = compressed.len(),
            "gzip applied"
        );

        ctx.set("Content-Encoding", "gzip")
            .set("Vary", "Accept-Encoding")
            .send(compressed);
        Ok(())
    }
}

// `gzip` listed without `q=0`
fn accepts_gzip(accept_encoding: &str) -> bool {
    accept_encoding.split(',').any(|item| {
        let mut params = item.split(';');

        let coding = params.next().unwrap_or_default().trim();
        if !coding.eq_ignore_ascii_case("gzip") {
            return false;
        }

        !params.any(|param| {
            param
                .trim()
                .strip_prefix("q=")
                .and_then(|q| q.parse::<f32>().ok())
                == Some(0.0)
        })
    })
}
