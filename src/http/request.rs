use std::borrow::Cow;
use std::sync::Arc;

use crate::buffer::{BufferObserver, GrowableBuffer};
use crate::http::arena::{ArenaStr, HeaderArena};
use crate::http::parser::{self, ParseState};

/// Longest method kept, in bytes. Longer methods are truncated and flagged.
pub const METHOD_MAX_LENGTH: usize = 63;
/// Longest version string kept, in bytes.
pub const VERSION_MAX_LENGTH: usize = 15;
/// Longest request target kept, raw or decoded, in bytes.
pub const PATH_MAX_LENGTH: usize = 1023;

pub const DEFAULT_MAX_HEADERS: usize = 64;
pub const DEFAULT_HEADER_ARENA_SIZE: usize = 8 * 1024;
pub const DEFAULT_MAX_BODY_LENGTH: usize = 128 * 1024 * 1024;

/// HTTP request methods.
///
/// The parser keeps the method verbatim; this is only a convenience view of it
/// for handlers that want to match on well-known methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// POST - Create or submit data
    POST,
    /// PUT - Replace a resource
    PUT,
    /// DELETE - Delete a resource
    DELETE,
    /// HEAD - Like GET but without the response body
    HEAD,
    /// OPTIONS - Describe communication options
    OPTIONS,
    /// PATCH - Partial modification of a resource
    PATCH,
}

impl Method {
    /// Parses an HTTP method (case-sensitive).
    ///
    /// ```
    /// # use sentinel::http::request::Method;
    /// assert_eq!(Method::parse(b"GET"), Some(Method::GET));
    /// assert_eq!(Method::parse(b"get"), None);
    /// ```
    pub fn parse(s: &[u8]) -> Option<Self> {
        match s {
            b"GET" => Some(Method::GET),
            b"POST" => Some(Method::POST),
            b"PUT" => Some(Method::PUT),
            b"DELETE" => Some(Method::DELETE),
            b"HEAD" => Some(Method::HEAD),
            b"OPTIONS" => Some(Method::OPTIONS),
            b"PATCH" => Some(Method::PATCH),
            _ => None,
        }
    }
}

/// Memory bounds applied to a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestLimits {
    /// Headers beyond this count are dropped (default: `64`).
    pub max_headers: usize,
    /// Bytes available for all header names and values together (default: 8 KiB).
    pub header_arena_size: usize,
    /// Larger `Content-Length` values are clamped to this (default: 128 MiB).
    pub max_body_length: usize,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_headers: DEFAULT_MAX_HEADERS,
            header_arena_size: DEFAULT_HEADER_ARENA_SIZE,
            max_body_length: DEFAULT_MAX_BODY_LENGTH,
        }
    }
}

/// Bounds that were hit while parsing. None of them abort the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Warnings {
    /// Some header text was discarded because the header arena was full.
    pub header_arena_exhausted: bool,
    /// More headers arrived than the header table holds.
    pub too_many_headers: bool,
    pub method_truncated: bool,
    pub path_truncated: bool,
    pub version_truncated: bool,
    /// The body was cut at the configured maximum, or bytes kept arriving
    /// after the request was complete.
    pub body_truncated: bool,
}

impl Warnings {
    pub fn any(&self) -> bool {
        self.header_arena_exhausted
            || self.too_many_headers
            || self.method_truncated
            || self.path_truncated
            || self.version_truncated
            || self.body_truncated
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Header {
    pub(crate) name: ArenaStr,
    pub(crate) value: ArenaStr,
}

/// Header currently being parsed, not yet committed to the table.
#[derive(Debug, Default)]
pub(crate) struct PendingHeader {
    pub(crate) name: Option<ArenaStr>,
    pub(crate) value: Option<ArenaStr>,
    pub(crate) skip_space: bool,
}

/// A request as it is read off one connection.
///
/// Created empty, filled in by [`parse_request`](crate::http::parser::parse_request)
/// as bytes arrive, and read-only once [`is_done`](Self::is_done) returns true.
#[derive(Debug)]
pub struct Request {
    pub(crate) method: Vec<u8>,
    pub(crate) version: Vec<u8>,
    pub(crate) path: Vec<u8>,
    pub(crate) path_decoded: Vec<u8>,
    pub(crate) headers: Vec<Header>,
    pub(crate) pending: PendingHeader,
    pub(crate) arena: HeaderArena,
    pub(crate) body: GrowableBuffer,
    pub(crate) body_expected: usize,
    pub(crate) body_clamped: bool,
    pub(crate) warnings: Warnings,
    pub(crate) state: ParseState,
    pub(crate) limits: RequestLimits,
}

impl Default for Request {
    fn default() -> Self {
        Self::new(RequestLimits::default())
    }
}

impl Request {
    pub fn new(limits: RequestLimits) -> Self {
        Self {
            method: Vec::new(),
            version: Vec::new(),
            path: Vec::new(),
            path_decoded: Vec::new(),
            headers: Vec::with_capacity(limits.max_headers),
            pending: PendingHeader::default(),
            arena: HeaderArena::new(limits.header_arena_size),
            body: GrowableBuffer::new(),
            body_expected: 0,
            body_clamped: false,
            warnings: Warnings::default(),
            state: ParseState::Method,
            limits,
        }
    }

    /// Parses a complete request held in memory, using default limits.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut request = Self::default();
        parser::parse_request(&mut request, bytes);
        request
    }

    /// Reports body allocations to `observer`.
    pub fn set_body_observer(&mut self, observer: Arc<dyn BufferObserver>) {
        self.body.set_observer(observer);
    }

    /// Feeds one received fragment into the parser.
    pub fn parse(&mut self, fragment: &[u8]) {
        parser::parse_request(self, fragment);
    }

    pub fn method(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.method)
    }

    pub fn method_kind(&self) -> Option<Method> {
        Method::parse(&self.method)
    }

    pub fn version(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.version)
    }

    /// The request target exactly as received, e.g. `/search?q=a+b`.
    pub fn path(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.path)
    }

    /// The request target with `%XX` escapes and `+` decoded.
    pub fn path_decoded(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.path_decoded)
    }

    /// Headers in the order they arrived.
    pub fn headers(&self) -> impl Iterator<Item = (Cow<'_, str>, Cow<'_, str>)> + '_ {
        self.headers.iter().map(|h| {
            (
                String::from_utf8_lossy(self.arena.get(h.name)),
                String::from_utf8_lossy(self.arena.get(h.value)),
            )
        })
    }

    pub fn header_count(&self) -> usize {
        self.headers.len()
    }

    /// Retrieves the first header named `name`, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<Cow<'_, str>> {
        self.header_bytes(name).map(String::from_utf8_lossy)
    }

    pub(crate) fn header_bytes(&self, name: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|h| self.arena.get(h.name).eq_ignore_ascii_case(name.as_bytes()))
            .map(|h| self.arena.get(h.value))
    }

    /// The announced body length after clamping, or 0 when absent or invalid.
    pub fn content_length(&self) -> usize {
        self.header_bytes("Content-Length")
            .and_then(parser::parse_content_length)
            .map(|len| parser::clamp_content_length(len, self.limits.max_body_length))
            .unwrap_or(0)
    }

    pub fn body(&self) -> &[u8] {
        self.body.as_bytes()
    }

    pub fn body_buffer(&self) -> &GrowableBuffer {
        &self.body
    }

    pub fn warnings(&self) -> Warnings {
        self.warnings
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == ParseState::Done
    }

    pub fn limits(&self) -> RequestLimits {
        self.limits
    }

    /// Bytes of the header arena in use.
    pub fn header_arena_used(&self) -> usize {
        self.arena.used()
    }

    /// Decoded value of a query-string parameter, e.g. `q` in `/search?q=rust`.
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.path.splitn(2, |&b| b == b'?').nth(1)?;
        decode_param(name, query)
    }

    /// Decoded value of a `application/x-www-form-urlencoded` body parameter.
    pub fn form_param(&self, name: &str) -> Option<String> {
        decode_param(name, self.body())
    }
}

/// Finds `name` in an `&`-separated parameter string and decodes its value.
///
/// `name` may be given with or without the trailing `=`. `+` decodes to a
/// space and `%XX` to the escaped byte; the value ends at the next `&`.
///
/// ```
/// # use sentinel::http::request::decode_param;
/// assert_eq!(decode_param("param=", b"param=%20value%20").as_deref(), Some(" value "));
/// assert_eq!(decode_param("param", b"param=value%0a&next").as_deref(), Some("value\n"));
/// ```
pub fn decode_param(name: &str, source: &[u8]) -> Option<String> {
    let name = name.strip_suffix('=').unwrap_or(name);
    url::form_urlencoded::parse(source)
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}
