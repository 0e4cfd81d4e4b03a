//! Method dispatch for the static file server.
//!
//! Turns a parsed request into exactly one response. Every failure below this
//! point (bad path, filesystem fault) is converted into an HTTP status here,
//! so the connection layer never sees an error from request handling.

use tokio::io::AsyncReadExt;

use crate::config::StaticFilesConfig;
use crate::http::mime;
use crate::http::request::{Method, Request};
use crate::http::response::{Response, ResponseBuilder, StatusCode};
use crate::static_files::listing;
use crate::static_files::resolver::{
    DirectoryResource, FileResource, ResolveError, Resolver, Resource,
};

/// Files up to this size are read whole before the response is written, so a
/// read failure still becomes a clean 500. Larger files are streamed.
pub const BUFFERED_FILE_LIMIT: u64 = 1024 * 1024;

/// Serves GET and HEAD requests out of a root directory.
#[derive(Debug, Clone)]
pub struct StaticFileHandler {
    resolver: Resolver,
    directory_listing: bool,
}

impl StaticFileHandler {
    pub fn new(resolver: Resolver, directory_listing: bool) -> Self {
        Self {
            resolver,
            directory_listing,
        }
    }

    /// Creates a handler from configuration, failing if the root is unusable.
    pub fn from_config(cfg: &StaticFilesConfig) -> std::io::Result<Self> {
        let resolver = Resolver::new(&cfg.root, cfg.index_file.clone())?;
        Ok(Self::new(resolver, cfg.directory_listing))
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Answers one request.
    ///
    /// Unsupported methods get 405 before the filesystem is consulted. HEAD
    /// responses carry the same headers as GET, without the body.
    pub async fn handle(&self, request: &Request) -> Response {
        if !request.method.is_allowed() {
            return Response::method_not_allowed();
        }

        let head = request.method == Method::HEAD;

        let resource = match self.resolver.resolve(&request.path).await {
            Ok(resource) => resource,
            Err(ResolveError::InvalidPath(path)) => {
                tracing::debug!(path = %path, "Rejected request path");
                return strip_for_head(Response::bad_request(), head);
            }
            Err(e @ ResolveError::Io { .. }) => {
                tracing::error!(
                    error = %e,
                    method = %request.method,
                    path = %request.path,
                    "Failed to resolve resource"
                );
                return strip_for_head(Response::internal_error(), head);
            }
        };

        let response = match resource {
            Resource::File(file) => self.serve_file(file, head).await,
            Resource::Directory(dir) => self.serve_directory(dir, head).await,
            Resource::Missing => Response::not_found(),
        };

        strip_for_head(response, head)
    }

    async fn serve_file(&self, mut resource: FileResource, head: bool) -> Response {
        if head {
            // No need to read the file: length and type come from resolution.
            return ResponseBuilder::new(StatusCode::Ok)
                .header("Content-Type", resource.content_type)
                .header("Content-Length", resource.len.to_string())
                .build();
        }

        if resource.len > BUFFERED_FILE_LIMIT {
            return ResponseBuilder::new(StatusCode::Ok)
                .header("Content-Type", resource.content_type)
                .file(resource.file, resource.len)
                .build();
        }

        let mut body = Vec::with_capacity(resource.len as usize);
        if let Err(e) = resource.file.read_to_end(&mut body).await {
            tracing::error!(
                error = %e,
                file = %resource.path.display(),
                "Failed to read file"
            );
            return Response::internal_error();
        }

        Response::ok(body, resource.content_type)
    }

    async fn serve_directory(&self, dir: DirectoryResource, head: bool) -> Response {
        if let Some(index) = dir.index {
            return match tokio::fs::File::open(&index).await {
                Ok(file) => {
                    let len = match file.metadata().await {
                        Ok(m) => m.len(),
                        Err(e) => {
                            tracing::error!(
                                error = %e,
                                file = %index.display(),
                                "Failed to stat index file"
                            );
                            return Response::internal_error();
                        }
                    };
                    let resource = FileResource {
                        file,
                        content_type: mime::from_path(&index),
                        path: index,
                        len,
                    };
                    self.serve_file(resource, head).await
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        file = %index.display(),
                        "Failed to open index file"
                    );
                    Response::internal_error()
                }
            };
        }

        if !self.directory_listing {
            return Response::ok(Vec::new(), mime::HTML);
        }

        match listing::render_directory(&dir.path, &dir.url_path).await {
            Ok(page) => Response::ok(page.into_bytes(), mime::HTML),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    dir = %dir.path.display(),
                    "Failed to list directory"
                );
                Response::internal_error()
            }
        }
    }
}

fn strip_for_head(response: Response, head: bool) -> Response {
    if head { response.without_body() } else { response }
}
