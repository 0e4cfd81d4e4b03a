use tokio::fs::File;

use crate::http::headers::Headers;
use crate::http::mime;
use crate::http::request::ALLOWED_METHODS;

/// Value of the `Server` header on every response.
pub const SERVER_NAME: &str = "lantern";

/// HTTP status codes produced by the server.
///
/// - `Ok` (200): Resource served
/// - `BadRequest` (400): Malformed request
/// - `NotFound` (404): Resource not found
/// - `MethodNotAllowed` (405): Anything other than GET or HEAD
/// - `RequestTimeout` (408): Client stalled mid-request
/// - `InternalServerError` (500): Filesystem or internal fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 400 Bad Request
    BadRequest,
    /// 404 Not Found
    NotFound,
    /// 405 Method Not Allowed
    MethodNotAllowed,
    /// 408 Request Timeout
    RequestTimeout,
    /// 500 Internal Server Error
    InternalServerError,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use lantern::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::NotFound.as_u16(), 404);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::BadRequest => 400,
            StatusCode::NotFound => 404,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::RequestTimeout => 408,
            StatusCode::InternalServerError => 500,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use lantern::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.reason_phrase(), "OK");
    /// assert_eq!(StatusCode::NotFound.reason_phrase(), "Not Found");
    /// ```
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::RequestTimeout => "Request Timeout",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }
}

/// Represents a complete HTTP response ready to be sent to a client.
#[derive(Debug)]
pub struct Response {
    /// The HTTP status code
    pub status: StatusCode,
    /// HTTP headers
    pub headers: Headers,
    /// Response body as bytes
    pub body: Vec<u8>,
    /// Streamed after `body`, for files too large to buffer
    pub file: Option<FileBody>,
}

/// An open file sent as the body, `len` bytes from its current position.
#[derive(Debug)]
pub struct FileBody {
    pub file: File,
    pub len: u64,
}

/// Builder for constructing HTTP responses in a fluent style.
///
/// # Example
///
/// ```ignore
/// let response = ResponseBuilder::new(StatusCode::Ok)
///     .header("Content-Type", "text/plain")
///     .body(b"hello".to_vec())
///     .build();
/// ```
pub struct ResponseBuilder {
    status: StatusCode,
    headers: Headers,
    body: Vec<u8>,
    file: Option<FileBody>,
}

impl ResponseBuilder {
    /// Creates a new response builder with the specified status code.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Vec::new(),
            file: None,
        }
    }

    /// Adds or replaces a header.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    /// Sets the response body.
    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Streams `len` bytes of `file` as the body instead of buffering them.
    pub fn file(mut self, file: File, len: u64) -> Self {
        self.headers.insert("Content-Length", len.to_string());
        self.body = Vec::new();
        self.file = Some(FileBody { file, len });
        self
    }

    /// Builds the final Response.
    ///
    /// Adds `Server`, and `Content-Length` from the body size unless a
    /// Content-Length was set explicitly (HEAD responses rely on that).
    pub fn build(mut self) -> Response {
        if !self.headers.contains_key("Content-Length") {
            self.headers
                .insert("Content-Length", self.body.len().to_string());
        }
        if !self.headers.contains_key("Server") {
            self.headers.insert("Server", SERVER_NAME);
        }

        Response {
            status: self.status,
            headers: self.headers,
            body: self.body,
            file: self.file,
        }
    }
}

impl Response {
    /// Creates a 200 OK response with the given body and content type.
    pub fn ok(body: impl Into<Vec<u8>>, content_type: &str) -> Self {
        ResponseBuilder::new(StatusCode::Ok)
            .header("Content-Type", content_type)
            .body(body.into())
            .build()
    }

    /// Creates a 400 Bad Request response.
    pub fn bad_request() -> Self {
        Self::error_page(StatusCode::BadRequest)
    }

    /// Creates a 404 Not Found response.
    pub fn not_found() -> Self {
        Self::error_page(StatusCode::NotFound)
    }

    /// Creates a 405 Method Not Allowed response advertising GET and HEAD.
    pub fn method_not_allowed() -> Self {
        let mut response = Self::error_page(StatusCode::MethodNotAllowed);
        response.headers.insert("Allow", ALLOWED_METHODS);
        response
    }

    /// Creates a 408 Request Timeout response.
    pub fn request_timeout() -> Self {
        Self::error_page(StatusCode::RequestTimeout)
    }

    /// Creates a 500 Internal Server Error response.
    pub fn internal_error() -> Self {
        Self::error_page(StatusCode::InternalServerError)
    }

    /// A small HTML page naming the status, e.g. "404 Not Found".
    pub fn error_page(status: StatusCode) -> Self {
        let title = format!("{} {}", status.as_u16(), status.reason_phrase());
        let page = format!(
            "<!DOCTYPE html>\n<html>\n<head><title>{title}</title></head>\n<body><h1>{title}</h1></body>\n</html>\n"
        );

        ResponseBuilder::new(status)
            .header("Content-Type", mime::HTML)
            .body(page.into_bytes())
            .build()
    }

    /// Drops the body while keeping every header, Content-Length included.
    ///
    /// This is how a HEAD response is derived from its GET counterpart.
    pub fn without_body(mut self) -> Self {
        self.body = Vec::new();
        self.file = None;
        self
    }

    /// Adds or replaces a header on an already built response.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(key, value);
    }
}
