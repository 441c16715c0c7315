use crate::{errors::Error, http::types::HeaderMap, Result};
use memchr::memmem;

pub(crate) const CRLF: &[u8] = b"\r\n";
pub(crate) const HEADERS_END: &[u8] = b"\r\n\r\n";

/// A decoded HTTP request.
///
/// Built once per inbound message from the raw bytes read off the socket
/// and dropped as soon as its response is written.
///
/// # Input format
///
/// - `SP`: ASCII space (0x20)
/// - `CRLF`: Carriage return + line feed (`"\r\n"`), **exactly this sequence**
///
/// ## First line
///
/// ```text
/// [METHOD] SP [PATH] SP [PROTOCOL] CRLF
/// ```
///
/// Fewer than three space separated tokens is a decode error. The tokens are
/// kept verbatim: an unknown method or protocol still decodes.
///
/// ## Header
///
/// ```text
/// [NAME] ": " [VALUE] CRLF
/// ```
///
/// Names are lower-cased while decoding, so lookups ignore case. A line
/// without `": "` is skipped. A repeated name keeps the last value.
///
/// ## Body
///
/// Everything after the first blank line (`CRLF CRLF`), byte for byte.
/// `Content-Length` is **not** interpreted: the connection stops reading as
/// soon as the header terminator arrives, so the body is whatever came with
/// it (or everything up to the peer closing its side).
///
/// The request line and header block must be valid UTF-8; the body is
/// opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: String,
    path: String,
    protocol: String,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Request {
    /// Decodes a request from raw bytes.
    ///
    /// # Errors
    ///
    /// [`Error::MalformedRequest`] when the buffer is empty, has no `CRLF`
    /// at all, has a request line with fewer than three tokens, or a head
    /// that is not valid UTF-8.
    ///
    /// # Examples
    /// ```
    /// use onion_web::Request;
    ///
    /// let req = Request::parse(b"GET /user-agent HTTP/1.1\r\nUser-Agent: foobar/1.2.3\r\n\r\nfoobar")?;
    ///
    /// assert_eq!(req.method(), "GET");
    /// assert_eq!(req.path(), "/user-agent");
    /// assert_eq!(req.header("USER-AGENT"), Some("foobar/1.2.3"));
    /// assert_eq!(req.body(), b"foobar");
    /// # Ok::<(), onion_web::Error>(())
    /// ```
    pub fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.is_empty() {
            return Err(Error::MalformedRequest("empty request"));
        }

        let end_first_line = memmem::find(buffer, CRLF)
            .ok_or(Error::MalformedRequest("missing line terminator"))?;

        let (head, body) = match memmem::find(buffer, HEADERS_END) {
            Some(end) => (&buffer[..end], &buffer[end + HEADERS_END.len()..]),
            None => (buffer, &[][..]),
        };

        let head = simdutf8::basic::from_utf8(head)
            .map_err(|_| Error::MalformedRequest("request head is not valid UTF-8"))?;

        let mut request = Self::parse_first_line(&head[..end_first_line])?;

        // `head` stops right before the blank line, so every remaining line is a header
        for line in head[end_first_line..].split("\r\n").skip(1) {
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(": ") {
                request
                    .headers
                    .insert(name.to_ascii_lowercase(), value.to_owned());
            }
        }

        request.body = body.to_vec();
        Ok(request)
    }

    fn parse_first_line(line: &str) -> Result<Self> {
        let mut tokens = line.split(' ');

        match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(method), Some(path), Some(protocol))
                if !method.is_empty() && !path.is_empty() && !protocol.is_empty() =>
            {
                Ok(Self {
                    method: method.to_owned(),
                    path: path.to_owned(),
                    protocol: protocol.to_owned(),
                    headers: HeaderMap::new(),
                    body: Vec::new(),
                })
            }
            _ => Err(Error::MalformedRequest("invalid request line")),
        }
    }
}

// Public API
impl Request {
    /// Returns the method token, e.g. `"GET"`.
    #[inline(always)]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the request target exactly as sent, query string included.
    #[inline(always)]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the protocol token, e.g. `"HTTP/1.1"`.
    #[inline(always)]
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Returns a header value with case-insensitive name matching.
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    #[inline(always)]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Overrides (or adds) a header, for middleware and tests.
    ///
    /// The name is lower-cased like the decoded ones.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_ascii_lowercase(), value);
    }

    #[inline(always)]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Whether the connection stays open after this request.
    ///
    /// Anything other than `Connection: close` (including no header at all)
    /// keeps it alive.
    #[inline]
    pub fn keep_alive(&self) -> bool {
        !self
            .header("connection")
            .is_some_and(|value| value.eq_ignore_ascii_case("close"))
    }
}
