//! MIME type detection based on file extensions.

use std::path::Path;

pub const HTML: &str = "text/html; charset=utf-8";
pub const TEXT: &str = "text/plain; charset=utf-8";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Returns the `Content-Type` for a file, falling back to
/// `application/octet-stream` for unknown or missing extensions.
pub fn from_path(path: &Path) -> &'static str {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| from_extension(&ext.to_ascii_lowercase()))
        .unwrap_or(OCTET_STREAM)
}

fn from_extension(ext: &str) -> &'static str {
    match ext {
        "html" | "htm" => HTML,
        "txt" | "text" | "log" => TEXT,
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "xml" => "application/xml",
        "csv" => "text/csv; charset=utf-8",
        "md" => "text/markdown; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "wasm" => "application/wasm",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        _ => OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions() {
        assert_eq!(from_path(Path::new("index.html")), HTML);
        assert_eq!(from_path(Path::new("notes/existing.txt")), TEXT);
        assert_eq!(from_path(Path::new("logo.PNG")), "image/png");
    }

    #[test]
    fn unknown_extension_falls_back() {
        assert_eq!(from_path(Path::new("archive.xyz")), OCTET_STREAM);
        assert_eq!(from_path(Path::new("Makefile")), OCTET_STREAM);
        assert_eq!(from_path(Path::new(".hidden")), OCTET_STREAM);
    }
}
