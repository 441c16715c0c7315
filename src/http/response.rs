//! HTTP response builder and encoder.

use crate::http::types::{HeaderMap, StatusCode};

/// HTTP response under construction.
///
/// One response is created (empty, no status) at the start of every
/// dispatch, mutated by the handler chain through the
/// [`Context`](crate::Context) and encoded exactly once.
///
/// # Examples
/// ```
/// use onion_web::{Response, StatusCode};
///
/// let mut resp = Response::new();
/// resp.status(StatusCode::Ok)
///     .header("Content-Type", "text/html")
///     .body("<h1>Hello World</h1>");
///
/// assert!(resp.encode().starts_with(b"HTTP/1.1 200 OK\r\n"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
}

impl Response {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shortcut for a response with a status and no body.
    #[inline]
    pub fn with_status(status: StatusCode) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

// Public API
impl Response {
    /// Sets the HTTP status code for the response.
    ///
    /// May be called any number of times; the last call wins.
    #[inline]
    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.status = Some(status);
        self
    }

    /// Returns the status that will be sent (`200 OK` when none was set).
    #[inline]
    pub fn status_code(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::Ok)
    }

    /// Sets a response header, replacing any value stored under the same
    /// name in any letter case.
    ///
    /// A `Content-Length` set here is ignored at encoding time: the
    /// length is always computed from the body.
    ///
    /// # Examples
    /// ```
    /// use onion_web::Response;
    ///
    /// let mut resp = Response::new();
    /// resp.header("content-type", "text/plain")   // &str, &str
    ///     .header("x-custom-id", 128)             // &str, i32
    ///     .header("x-cache-enabled", true);       // &str, bool
    ///
    /// assert_eq!(resp.header_value("X-Custom-Id"), Some("128"));
    /// ```
    #[inline]
    pub fn header<V: ToString>(&mut self, name: &str, value: V) -> &mut Self {
        self.headers.insert(name, value.to_string());
        self
    }

    /// Returns a response header, ignoring the letter case of `name`.
    #[inline]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    #[inline(always)]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[inline(always)]
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Replaces the body.
    ///
    /// If no status was set yet, the response becomes `200 OK`.
    #[inline]
    pub fn body<B: Into<Vec<u8>>>(&mut self, body: B) -> &mut Self {
        if self.status.is_none() {
            self.status = Some(StatusCode::Ok);
        }

        self.body = Some(body.into());
        self
    }

    /// Returns the current body, empty if none was set.
    #[inline]
    pub fn body_bytes(&self) -> &[u8] {
        self.body.as_deref().unwrap_or_default()
    }

    /// Encodes the response into a fresh buffer.
    #[inline]
    pub fn encode(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(128 + self.body_bytes().len());
        self.write_to(&mut buffer);
        buffer
    }

    /// Appends the wire form of the response to `buffer`.
    ///
    /// ```text
    /// HTTP/1.1 [CODE] [REASON] CRLF
    /// ([NAME] ": " [VALUE] CRLF)*
    /// "Content-Length: " [BODY LENGTH] CRLF
    /// CRLF
    /// [BODY]
    /// ```
    ///
    /// Headers are written in insertion order. Encoding does not mutate the
    /// response, so encoding twice yields identical bytes.
    pub fn write_to(&self, buffer: &mut Vec<u8>) {
        let body = self.body_bytes();

        buffer.extend_from_slice(self.status_code().to_first_line());

        for (name, value) in self.headers.iter() {
            if name.eq_ignore_ascii_case("content-length") {
                continue;
            }

            buffer.extend_from_slice(name.as_bytes());
            buffer.extend_from_slice(b": ");
            buffer.extend_from_slice(value.as_bytes());
            buffer.extend_from_slice(b"\r\n");
        }

        buffer.extend_from_slice(b"Content-Length: ");
        buffer.extend_from_slice(body.len().to_string().as_bytes());
        buffer.extend_from_slice(b"\r\n\r\n");
        buffer.extend_from_slice(body);
    }
}

#[cfg(test)]
mod body_tests {
    use super::*;

    fn text(resp: &Response) -> String {
        String::from_utf8(resp.encode()).unwrap()
    }

    #[test]
    fn content_length_matches_body() {
        let cases: [&[u8]; 4] = [b"", b"a", b"Hello World", &[0u8; 1000]];

        for body in cases {
            let mut resp = Response::new();
            resp.body(body);

            let encoded = resp.encode();
            let expected = format!("Content-Length: {}\r\n\r\n", body.len());
            let split = encoded.len() - body.len();

            assert!(encoded[..split].ends_with(expected.as_bytes()));
            assert_eq!(&encoded[split..], body);
        }
    }

    #[test]
    fn stale_content_length_is_replaced() {
        let mut resp = Response::new();
        resp.header("content-length", 999).body("abc");

        assert_eq!(
            text(&resp),
            "HTTP/1.1 200 OK\r\nContent-Length: 3\r\n\r\nabc"
        );
    }

    #[test]
    fn body_defaults_status_to_ok() {
        let mut resp = Response::new();
        assert_eq!(resp.status, None);

        resp.body("x");
        assert_eq!(resp.status, Some(StatusCode::Ok));

        let mut resp = Response::with_status(StatusCode::Created);
        resp.body("x");
        assert_eq!(resp.status_code(), StatusCode::Created);
    }

    #[test]
    fn empty_response() {
        assert_eq!(
            text(&Response::with_status(StatusCode::NotFound)),
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n"
        );
        assert_eq!(
            text(&Response::new()),
            "HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n"
        );
    }

    #[test]
    fn encode_is_stable() {
        let mut resp = Response::new();
        resp.status(StatusCode::Accepted)
            .header("X-B", "2")
            .header("X-A", "1")
            .body("payload");

        assert_eq!(resp.encode(), resp.encode());
        assert_eq!(
            text(&resp),
            "HTTP/1.1 202 Accepted\r\nX-B: 2\r\nX-A: 1\r\nContent-Length: 7\r\n\r\npayload"
        );
    }
}
