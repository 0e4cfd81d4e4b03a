//! Tests for method dispatch: method x resource -> status, headers, body

use lantern::config::StaticFilesConfig;
use lantern::http::request::{Method, Request, RequestBuilder};
use lantern::http::response::{Response, StatusCode};
use lantern::http::writer::ResponseWriter;
use lantern::static_files::StaticFileHandler;
use lantern::static_files::handler::BUFFERED_FILE_LIMIT;
use std::path::{Path, PathBuf};

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn handler() -> StaticFileHandler {
    StaticFileHandler::from_config(&StaticFilesConfig {
        root: fixtures(),
        ..Default::default()
    })
    .unwrap()
}

fn handler_for(root: &Path) -> StaticFileHandler {
    StaticFileHandler::from_config(&StaticFilesConfig {
        root: root.to_path_buf(),
        ..Default::default()
    })
    .unwrap()
}

/// A throwaway directory under the system temp dir, unique per test.
fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("lantern-handler-{}-{}", std::process::id(), name));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn request(method: Method, path: &str) -> Request {
    RequestBuilder::new().method(method).path(path).build().unwrap()
}

async fn send(method: Method, path: &str) -> Response {
    handler().handle(&request(method, path)).await
}

#[tokio::test]
async fn test_get_root_directory() {
    let response = send(Method::GET, "/").await;

    assert_eq!(response.status, StatusCode::Ok);
    assert_eq!(
        response.headers.get("Content-Type"),
        Some("text/html; charset=utf-8")
    );
    let page = String::from_utf8(response.body).unwrap();
    assert!(page.contains("Index of /"));
    assert!(page.contains("href=\"/existing.txt\""));
    assert!(page.contains("href=\"/existing/\""));
}

#[tokio::test]
async fn test_get_existing_file() {
    let response = send(Method::GET, "/existing.txt").await;
    let expected = std::fs::read(fixtures().join("existing.txt")).unwrap();

    assert_eq!(response.status, StatusCode::Ok);
    assert_eq!(response.body, expected);
    assert_eq!(
        response.headers.get("Content-Type"),
        Some("text/plain; charset=utf-8")
    );
    assert_eq!(
        response.headers.get("Content-Length"),
        Some(expected.len().to_string().as_str())
    );
}

#[tokio::test]
async fn test_get_content_type_follows_extension() {
    let response = send(Method::GET, "/data.json").await;
    assert_eq!(response.headers.get("Content-Type"), Some("application/json"));
}

#[tokio::test]
async fn test_head_existing_file_matches_get_without_body() {
    let get = send(Method::GET, "/existing.txt").await;
    let head = send(Method::HEAD, "/existing.txt").await;

    assert_eq!(head.status, StatusCode::Ok);
    assert!(head.body.is_empty());
    assert_eq!(head.headers, get.headers);
}

#[tokio::test]
async fn test_head_missing_file() {
    let response = send(Method::HEAD, "/notExisting.txt").await;

    assert_eq!(response.status, StatusCode::NotFound);
    assert!(response.body.is_empty());
    assert_ne!(response.headers.get("Content-Length"), Some("0"));
}

#[tokio::test]
async fn test_get_missing_file() {
    let response = send(Method::GET, "/notExisting.txt").await;

    assert_eq!(response.status, StatusCode::NotFound);
    assert!(!response.body.is_empty());
}

#[tokio::test]
async fn test_get_existing_directory() {
    let response = send(Method::GET, "/existing/").await;

    assert_eq!(response.status, StatusCode::Ok);
    let page = String::from_utf8(response.body).unwrap();
    assert!(page.contains("href=\"/existing/nested.txt\""));
    assert!(page.contains("href=\"../\""));
}

#[tokio::test]
async fn test_get_missing_directory() {
    let response = send(Method::GET, "/notExisting/").await;
    assert_eq!(response.status, StatusCode::NotFound);
}

#[tokio::test]
async fn test_head_directory_has_no_body() {
    let get = send(Method::GET, "/existing/").await;
    let head = send(Method::HEAD, "/existing/").await;

    assert_eq!(head.status, StatusCode::Ok);
    assert!(head.body.is_empty());
    assert_eq!(head.headers, get.headers);
}

#[tokio::test]
async fn test_get_directory_serves_index_file() {
    let response = send(Method::GET, "/with_index/").await;
    let expected = std::fs::read(fixtures().join("with_index/index.html")).unwrap();

    assert_eq!(response.status, StatusCode::Ok);
    assert_eq!(response.body, expected);
    assert_eq!(
        response.headers.get("Content-Type"),
        Some("text/html; charset=utf-8")
    );
}

#[tokio::test]
async fn test_get_directory_listing_disabled() {
    let handler = StaticFileHandler::from_config(&StaticFilesConfig {
        root: fixtures(),
        directory_listing: false,
        index_file: None,
    })
    .unwrap();

    let response = handler.handle(&request(Method::GET, "/existing/")).await;

    assert_eq!(response.status, StatusCode::Ok);
    assert!(response.body.is_empty());
    assert_eq!(
        response.headers.get("Content-Type"),
        Some("text/html; charset=utf-8")
    );
}

#[tokio::test]
async fn test_put_root_is_method_not_allowed() {
    let req = RequestBuilder::new()
        .method(Method::PUT)
        .path("/")
        .header("Content-Type", "text/plain")
        .body(b"This file exists.\n".to_vec())
        .build()
        .unwrap();

    let response = handler().handle(&req).await;

    assert_eq!(response.status, StatusCode::MethodNotAllowed);
    assert_eq!(response.headers.get("Allow"), Some("GET, HEAD"));
}

#[tokio::test]
async fn test_disallowed_methods_ignore_resource_state() {
    let methods = [
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
        Method::PATCH,
        Method::CONNECT,
        Method::TRACE,
    ];

    for method in methods {
        for path in ["/", "/existing.txt", "/notExisting.txt", "/%ff"] {
            let response = send(method, path).await;
            assert_eq!(
                response.status,
                StatusCode::MethodNotAllowed,
                "{} {}",
                method,
                path
            );
        }
    }
}

#[tokio::test]
async fn test_invalid_path_is_bad_request() {
    let get = send(Method::GET, "/a%2Fb").await;
    assert_eq!(get.status, StatusCode::BadRequest);

    let head = send(Method::HEAD, "/a%2Fb").await;
    assert_eq!(head.status, StatusCode::BadRequest);
    assert!(head.body.is_empty());
}

#[tokio::test]
async fn test_repeated_get_is_idempotent() {
    let handler = handler();
    let req = request(Method::GET, "/existing.txt");

    let first = handler.handle(&req).await;
    let second = handler.handle(&req).await;

    assert_eq!(first.status, second.status);
    assert_eq!(first.body, second.body);
    assert_eq!(first.headers, second.headers);
}

#[tokio::test]
async fn test_overlong_name_is_not_found() {
    let path = format!("/{}", "a".repeat(300));

    let response = send(Method::GET, &path).await;
    assert_eq!(response.status, StatusCode::NotFound);
}

#[cfg(unix)]
#[tokio::test]
async fn test_filesystem_fault_is_internal_error() {
    let dir = scratch_dir("loop");
    // Resolving a self-referencing link fails with ELOOP.
    std::os::unix::fs::symlink(dir.join("loop"), dir.join("loop")).unwrap();
    let handler = handler_for(&dir);

    let get = handler.handle(&request(Method::GET, "/loop")).await;
    assert_eq!(get.status, StatusCode::InternalServerError);
    assert!(!get.body.is_empty());

    let head = handler.handle(&request(Method::HEAD, "/loop")).await;
    assert_eq!(head.status, StatusCode::InternalServerError);
    assert!(head.body.is_empty());

    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_large_file_is_streamed() {
    let dir = scratch_dir("large");
    let content: Vec<u8> = (0..BUFFERED_FILE_LIMIT + 4096).map(|i| (i % 251) as u8).collect();
    std::fs::write(dir.join("big.bin"), &content).unwrap();
    let handler = handler_for(&dir);

    let response = handler.handle(&request(Method::GET, "/big.bin")).await;
    assert_eq!(response.status, StatusCode::Ok);
    assert!(response.body.is_empty());
    assert!(response.file.is_some());
    assert_eq!(
        response.headers.get("Content-Length"),
        Some(content.len().to_string().as_str())
    );

    let mut out = Vec::new();
    ResponseWriter::new(response)
        .write_to_stream(&mut out)
        .await
        .unwrap();
    assert!(out.starts_with(b"HTTP/1.1 200 OK\r\n"));
    assert!(out.ends_with(&content));

    let head = handler.handle(&request(Method::HEAD, "/big.bin")).await;
    assert!(head.file.is_none());
    assert_eq!(
        head.headers.get("Content-Length"),
        Some(content.len().to_string().as_str())
    );

    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_small_file_is_buffered() {
    let response = send(Method::GET, "/existing.txt").await;
    assert!(response.file.is_none());
}
