use crate::http::headers::Headers;
use crate::http::request::{Method, Request};
use thiserror::Error;

/// Largest request head (request line + headers) we buffer before giving up.
pub const MAX_HEADER_SIZE: usize = 64 * 1024;

/// Largest request body we are willing to read off the wire.
pub const MAX_BODY_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed request line")]
    InvalidRequest,
    #[error("unknown request method")]
    InvalidMethod,
    #[error("malformed request target")]
    InvalidPath,
    #[error("unsupported HTTP version")]
    InvalidVersion,
    #[error("malformed header line")]
    InvalidHeader,
    #[error("invalid Content-Length")]
    InvalidContentLength(Method),
    #[error("transfer encodings are not supported")]
    UnsupportedTransferEncoding(Method),
    #[error("request head exceeds 64 KiB")]
    HeadersTooLarge,
    #[error("request body exceeds 16 MiB")]
    BodyTooLarge(Method),
    #[error("incomplete request")]
    Incomplete,
}

impl ParseError {
    /// The method of a request whose head parsed but whose body cannot be
    /// framed. Lets the caller still answer by method.
    pub fn method(&self) -> Option<Method> {
        match self {
            ParseError::InvalidContentLength(method)
            | ParseError::UnsupportedTransferEncoding(method)
            | ParseError::BodyTooLarge(method) => Some(*method),
            _ => None,
        }
    }
}

/// Parses one request from the front of `buf`.
///
/// Returns the request and the number of bytes it occupied, or
/// `ParseError::Incomplete` if the buffer does not yet hold a whole request.
pub fn parse_http_request(buf: &[u8]) -> Result<(Request, usize), ParseError> {
    // Empty lines ahead of the request line are ignored (RFC 9112 2.2).
    let start = buf
        .iter()
        .position(|b| *b != b'\r' && *b != b'\n')
        .unwrap_or(buf.len());
    let buf_rest = &buf[start..];

    let Some((head_len, body_offset)) = find_headers_end(buf_rest) else {
        if buf_rest.len() > MAX_HEADER_SIZE {
            return Err(ParseError::HeadersTooLarge);
        }
        return Err(ParseError::Incomplete);
    };

    if head_len > MAX_HEADER_SIZE {
        return Err(ParseError::HeadersTooLarge);
    }

    let head = std::str::from_utf8(&buf_rest[..head_len])
        .map_err(|_| ParseError::InvalidRequest)?;

    let mut lines = head.split('\n').map(|line| line.trim_end_matches('\r'));

    // Request line
    let request_line = lines.next().ok_or(ParseError::InvalidRequest)?;
    let mut parts = request_line.split_whitespace();

    let method_str = parts.next().ok_or(ParseError::InvalidRequest)?;
    let target = parts.next().ok_or(ParseError::InvalidRequest)?;
    let version = parts.next().ok_or(ParseError::InvalidRequest)?;

    if parts.next().is_some() {
        return Err(ParseError::InvalidRequest);
    }

    let method = Method::from_str(method_str).ok_or(ParseError::InvalidMethod)?;
    let path = normalize_target(target)?;

    if version != "HTTP/1.1" && version != "HTTP/1.0" {
        return Err(ParseError::InvalidVersion);
    }

    // Headers
    let mut headers = Headers::new();

    for line in lines {
        // Obsolete line folding is rejected along with other garbage.
        if line.starts_with([' ', '\t']) {
            return Err(ParseError::InvalidHeader);
        }

        let (key, value) = line.split_once(':').ok_or(ParseError::InvalidHeader)?;

        if key.is_empty() || key.contains(char::is_whitespace) {
            return Err(ParseError::InvalidHeader);
        }

        headers.insert(key, value.trim());
    }

    if headers.contains_key("Transfer-Encoding") {
        return Err(ParseError::UnsupportedTransferEncoding(method));
    }

    // Body
    let content_length = headers
        .get("Content-Length")
        .map(|v| {
            v.parse::<usize>()
                .map_err(|_| ParseError::InvalidContentLength(method))
        })
        .transpose()?
        .unwrap_or(0);

    if content_length > MAX_BODY_SIZE {
        return Err(ParseError::BodyTooLarge(method));
    }

    let body_bytes = &buf_rest[body_offset..];
    if body_bytes.len() < content_length {
        return Err(ParseError::Incomplete);
    }

    let request = Request {
        method,
        path,
        version: version.to_string(),
        headers,
        body: body_bytes[..content_length].to_vec(),
    };

    let total_consumed = start + body_offset + content_length;
    Ok((request, total_consumed))
}

/// Reduces a request target to origin-form (`/path?query`).
fn normalize_target(target: &str) -> Result<String, ParseError> {
    if target.starts_with('/') {
        return Ok(target.to_string());
    }

    // Absolute-form, as sent to proxies. Servers must accept it too.
    let url = url::Url::parse(target).map_err(|_| ParseError::InvalidPath)?;
    if !matches!(url.scheme(), "http" | "https") || !url.has_host() {
        return Err(ParseError::InvalidPath);
    }

    Ok(match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    })
}

/// Finds the empty line ending the request head.
///
/// Returns the length of the head (excluding the final line break) and the
/// offset where the body starts. Both CRLF and bare LF are accepted.
fn find_headers_end(buf: &[u8]) -> Option<(usize, usize)> {
    buf.iter()
        .enumerate()
        .filter(|(_, b)| **b == b'\n')
        .find_map(|(i, _)| match &buf[i + 1..] {
            [b'\n', ..] => Some((i, i + 2)),
            [b'\r', b'\n', ..] => Some((i, i + 3)),
            _ => None,
        })
}
