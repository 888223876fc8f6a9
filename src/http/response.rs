use std::path::{Path, PathBuf};

use crate::buffer::GrowableBuffer;

/// HTTP status codes used by the built-in responses.
///
/// Handlers are free to send any other code through
/// [`ResponseBuilder::custom_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 201 Created
    Created,
    /// 204 No Content
    NoContent,
    /// 400 Bad Request
    BadRequest,
    /// 403 Forbidden
    Forbidden,
    /// 404 Not Found
    NotFound,
    /// 405 Method Not Allowed
    MethodNotAllowed,
    /// 500 Internal Server Error
    InternalServerError,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// ```
    /// # use sentinel::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::NotFound.as_u16(), 404);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::Created => 201,
            StatusCode::NoContent => 204,
            StatusCode::BadRequest => 400,
            StatusCode::Forbidden => 403,
            StatusCode::NotFound => 404,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::InternalServerError => 500,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Created => "Created",
            StatusCode::NoContent => "No Content",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }
}

/// What a response sends after its header block.
#[derive(Debug, Clone)]
pub enum Payload {
    /// Bytes already in memory.
    Body(GrowableBuffer),
    /// A file streamed from disk in bounded chunks.
    File(PathBuf),
}

/// A complete HTTP response ready to be sent to a client.
#[derive(Debug, Clone)]
pub struct Response {
    pub code: u16,
    pub status: String,
    /// `None` means "detect it": sniffed for files, `text/plain` for bodies.
    pub content_type: Option<String>,
    /// Extra header lines, sent after `Content-Length` in this order.
    pub headers: Vec<(String, String)>,
    pub payload: Payload,
}

/// Builder for constructing HTTP responses in a fluent style.
///
/// ```
/// # use sentinel::http::response::{ResponseBuilder, StatusCode};
/// let response = ResponseBuilder::new(StatusCode::Ok)
///     .content_type("application/json")
///     .header("Cache-Control", "no-cache")
///     .body("{}")
///     .build();
/// assert_eq!(response.code, 200);
/// ```
#[derive(Debug)]
pub struct ResponseBuilder {
    code: u16,
    status: String,
    content_type: Option<String>,
    headers: Vec<(String, String)>,
    payload: Payload,
}

impl ResponseBuilder {
    pub fn new(status: StatusCode) -> Self {
        Self {
            code: status.as_u16(),
            status: status.reason_phrase().to_string(),
            content_type: None,
            headers: Vec::new(),
            payload: Payload::Body(GrowableBuffer::new()),
        }
    }

    /// Uses a code and status text that [`StatusCode`] does not cover.
    pub fn custom_status(mut self, code: u16, status: impl Into<String>) -> Self {
        self.code = code;
        self.status = status.into();
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Adds a header line. `Content-Type` and `Content-Length` are always
    /// written by the server and should not be added here.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Sets the response body, replacing any file set earlier.
    pub fn body(mut self, body: impl Into<GrowableBuffer>) -> Self {
        self.payload = Payload::Body(body.into());
        self
    }

    /// Streams `path` as the response body, replacing any body set earlier.
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.payload = Payload::File(path.into());
        self
    }

    pub fn build(self) -> Response {
        Response {
            code: self.code,
            status: self.status,
            content_type: self.content_type,
            headers: self.headers,
            payload: self.payload,
        }
    }
}

const HTML: &str = "text/html; charset=UTF-8";

impl Response {
    /// Creates a response with an empty body to be filled in through
    /// [`body_mut`](Self::body_mut).
    pub fn new(code: u16, status: impl Into<String>, content_type: impl Into<String>) -> Self {
        ResponseBuilder::new(StatusCode::Ok)
            .custom_status(code, status)
            .content_type(content_type)
            .build()
    }

    /// Creates a simple 200 OK plain-text response.
    pub fn ok(body: impl Into<GrowableBuffer>) -> Self {
        Self::text(body)
    }

    pub fn text(body: impl Into<GrowableBuffer>) -> Self {
        ResponseBuilder::new(StatusCode::Ok)
            .content_type("text/plain; charset=UTF-8")
            .body(body)
            .build()
    }

    pub fn html(html: impl Into<GrowableBuffer>) -> Self {
        Self::html_with_status(StatusCode::Ok, html)
    }

    pub fn html_with_status(status: StatusCode, html: impl Into<GrowableBuffer>) -> Self {
        ResponseBuilder::new(status).content_type(HTML).body(html).build()
    }

    pub fn json(json: impl Into<GrowableBuffer>) -> Self {
        Self::json_with_status(StatusCode::Ok, json)
    }

    pub fn json_with_status(status: StatusCode, json: impl Into<GrowableBuffer>) -> Self {
        ResponseBuilder::new(status)
            .content_type("application/json")
            .body(json)
            .build()
    }

    /// Streams a file; its content type is detected when it is sent.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        ResponseBuilder::new(StatusCode::Ok).file(path).build()
    }

    pub fn bad_request_html(message: Option<&str>) -> Self {
        let message = message
            .map(escape_html)
            .unwrap_or_else(|| "An unspecified error occurred".to_string());
        Self::html_with_status(
            StatusCode::BadRequest,
            format!(
                "<html><head><title>400 - Bad Request</title></head><body>The request made was invalid. {message}</body></html>"
            ),
        )
    }

    pub fn forbidden_html() -> Self {
        Self::html_with_status(
            StatusCode::Forbidden,
            "<html><head><title>403 - Forbidden</title></head><body>You are not allowed to access this URL</body></html>",
        )
    }

    pub fn not_found_html(resource: Option<&str>) -> Self {
        let body = match resource {
            Some(resource) => format!(
                "<html><head><title>404 Not Found</title></head><body>The resource you specified ('{}') could not be found</body></html>",
                escape_html(resource)
            ),
            None => "<html><head><title>404 Not Found</title></head><body>The resource you specified could not be found</body></html>".to_string(),
        };
        Self::html_with_status(StatusCode::NotFound, body)
    }

    pub fn internal_error_html(detail: Option<&str>) -> Self {
        let body = match detail {
            Some(detail) => format!(
                "<html><head><title>500 Internal Error</title></head><body>There was an internal error while completing your request. {}</body></html>",
                escape_html(detail)
            ),
            None => "<html><head><title>500 Internal Error</title></head><body>There was an internal error while completing your request</body></html>".to_string(),
        };
        Self::html_with_status(StatusCode::InternalServerError, body)
    }

    /// The in-memory body, or `None` for a file response.
    pub fn body(&self) -> Option<&GrowableBuffer> {
        match &self.payload {
            Payload::Body(body) => Some(body),
            Payload::File(_) => None,
        }
    }

    /// Mutable access to the in-memory body, or `None` for a file response.
    pub fn body_mut(&mut self) -> Option<&mut GrowableBuffer> {
        match &mut self.payload {
            Payload::Body(body) => Some(body),
            Payload::File(_) => None,
        }
    }

    pub fn file_path(&self) -> Option<&Path> {
        match &self.payload {
            Payload::File(path) => Some(path),
            Payload::Body(_) => None,
        }
    }
}

/// Escapes text for inclusion in HTML. Spaces become `&nbsp;` so listings
/// keep their spacing.
///
/// ```
/// # use sentinel::http::response::escape_html;
/// assert_eq!(escape_html("<a b>"), "&lt;a&nbsp;b&gt;");
/// ```
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => escaped.push_str("&quot;"),
            '&' => escaped.push_str("&amp;"),
            '\'' => escaped.push_str("&#039;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            ' ' => escaped.push_str("&nbsp;"),
            c => escaped.push(c),
        }
    }
    escaped
}
