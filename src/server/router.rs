use crate::{errors::Error, server::handler::SharedHandler, Method, Result};
use std::collections::HashMap;

/// Routing table: `(method, path)` to an ordered handler chain.
///
/// Matching is exact. There are no wildcards, no path parameters and no
/// trailing-slash folding; the only normalization is that an empty path
/// becomes `/` and a missing leading `/` is added at registration time.
///
/// The table is filled before the server starts listening and is only
/// read afterwards.
#[derive(Default)]
pub struct Router {
    // method -> path -> handlers
    routes: HashMap<&'static str, HashMap<String, Box<[SharedHandler]>>>,
}

impl Router {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handlers` for `method` and `path`.
    ///
    /// A second registration of the same route replaces the first.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRegistration`] if `handlers` is empty.
    pub fn register(
        &mut self,
        method: Method,
        path: &str,
        handlers: Vec<SharedHandler>,
    ) -> Result<()> {
        let path = normalize_path(path);

        if handlers.is_empty() {
            return Err(Error::InvalidRegistration { method, path });
        }

        self.routes
            .entry(method.as_str())
            .or_default()
            .insert(path, handlers.into_boxed_slice());
        Ok(())
    }

    /// Returns the handler chain registered for `method` and `path`.
    #[inline]
    pub fn resolve(&self, method: &str, path: &str) -> Option<&[SharedHandler]> {
        self.routes.get(method)?.get(path).map(|chain| &chain[..])
    }

    /// Number of registered routes, across all methods.
    pub fn len(&self) -> usize {
        self.routes.values().map(HashMap::len).sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub(crate) fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_owned()
    } else {
        format!("/{path}")
    }
}
