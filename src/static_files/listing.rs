//! HTML directory listings.

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use std::io;
use std::path::Path;
use tokio::fs;

/// Characters escaped when a file name becomes a path segment in a link.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Reads a directory and renders its listing.
///
/// `url_path` is the percent-encoded request path of the directory and must
/// end in `/`.
pub async fn render_directory(dir: &Path, url_path: &str) -> io::Result<String> {
    let mut entries = Vec::new();
    let mut read_dir = fs::read_dir(dir).await?;

    while let Some(entry) = read_dir.next_entry().await? {
        // Names that are not valid UTF-8 cannot be linked to reliably.
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        let is_dir = entry.file_type().await?.is_dir();
        entries.push(ListingEntry { name, is_dir });
    }

    Ok(render_listing(url_path, entries))
}

/// Renders a listing page. Directories sort first, then names alphabetically.
pub fn render_listing(url_path: &str, mut entries: Vec<ListingEntry>) -> String {
    entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));

    let title = html_escape(
        &percent_encoding::percent_decode_str(url_path).decode_utf8_lossy(),
    );

    let mut page = String::with_capacity(256 + entries.len() * 64);
    page.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    page.push_str(&format!("<title>Index of {title}</title>\n</head>\n<body>\n"));
    page.push_str(&format!("<h1>Index of {title}</h1>\n<ul>\n"));

    if url_path != "/" {
        page.push_str("<li><a href=\"../\">../</a></li>\n");
    }

    for entry in &entries {
        let suffix = if entry.is_dir { "/" } else { "" };
        let href = format!(
            "{}{}{}",
            url_path,
            utf8_percent_encode(&entry.name, SEGMENT),
            suffix
        );
        page.push_str(&format!(
            "<li><a href=\"{}\">{}{}</a></li>\n",
            html_escape(&href),
            html_escape(&entry.name),
            suffix
        ));
    }

    page.push_str("</ul>\n</body>\n</html>\n");
    page
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
