//! Mapping request paths onto the filesystem.
//!
//! Every call touches the filesystem again. Nothing is cached, so changes on
//! disk are visible to the very next request.

use percent_encoding::percent_decode_str;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{self, File};
use url::Url;

use crate::http::mime;

/// What a request path names at resolution time.
#[derive(Debug)]
pub enum Resource {
    File(FileResource),
    Directory(DirectoryResource),
    Missing,
}

/// An opened regular file.
#[derive(Debug)]
pub struct FileResource {
    pub file: File,
    pub path: PathBuf,
    /// Size in bytes according to metadata at open time
    pub len: u64,
    pub content_type: &'static str,
}

#[derive(Debug)]
pub struct DirectoryResource {
    /// Canonical filesystem path
    pub path: PathBuf,
    /// Normalized URL path, percent-encoded, always ending in `/`
    pub url_path: String,
    /// Index file inside the directory, if configured and present
    pub index: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("request path cannot be mapped to a file: {0}")]
    InvalidPath(String),
    #[error("filesystem error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Resolves request paths against a root directory.
#[derive(Debug, Clone)]
pub struct Resolver {
    root: PathBuf,
    index_file: Option<String>,
}

impl Resolver {
    /// Creates a resolver for `root`, which must be an existing directory.
    pub fn new(root: impl AsRef<Path>, index_file: Option<String>) -> io::Result<Self> {
        let root = std::fs::canonicalize(root.as_ref())?;

        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("{} is not a directory", root.display()),
            ));
        }

        Ok(Self { root, index_file })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Classifies the resource named by a request target.
    ///
    /// Query strings and fragments are ignored. The result never points
    /// outside the root, through `..` segments or through symlinks.
    pub async fn resolve(&self, target: &str) -> Result<Resource, ResolveError> {
        let (url_path, relative) = split_target(target)?;
        let candidate = self.root.join(&relative);

        let canonical = match fs::canonicalize(&candidate).await {
            Ok(p) => p,
            Err(e) if is_missing(&e) => return Ok(Resource::Missing),
            Err(e) => return Err(io_error(candidate, e)),
        };

        if !canonical.starts_with(&self.root) {
            tracing::warn!(
                path = %url_path,
                target = %canonical.display(),
                "Refusing to follow link outside the root"
            );
            return Ok(Resource::Missing);
        }

        let metadata = match fs::metadata(&canonical).await {
            Ok(m) => m,
            Err(e) if is_missing(&e) => return Ok(Resource::Missing),
            Err(e) => return Err(io_error(canonical, e)),
        };

        // A trailing slash promises a directory.
        if metadata.is_file() && !url_path.ends_with('/') {
            let file = match File::open(&canonical).await {
                Ok(f) => f,
                Err(e) if is_missing(&e) => return Ok(Resource::Missing),
                Err(e) => return Err(io_error(canonical, e)),
            };

            return Ok(Resource::File(FileResource {
                file,
                content_type: mime::from_path(&canonical),
                path: canonical,
                len: metadata.len(),
            }));
        }

        if metadata.is_dir() {
            let index = self.find_index(&canonical).await;
            let url_path = if url_path.ends_with('/') {
                url_path
            } else {
                format!("{}/", url_path)
            };

            return Ok(Resource::Directory(DirectoryResource {
                path: canonical,
                url_path,
                index,
            }));
        }

        // Sockets, fifos and device nodes are not served.
        Ok(Resource::Missing)
    }

    async fn find_index(&self, dir: &Path) -> Option<PathBuf> {
        let name = self.index_file.as_deref()?;
        let candidate = dir.join(name);

        match fs::metadata(&candidate).await {
            Ok(m) if m.is_file() => Some(candidate),
            _ => None,
        }
    }
}

/// Splits a request target into its normalized URL path and the relative
/// filesystem path it names.
///
/// Dot segments are collapsed the way a browser would, so `/a/../../b`
/// becomes `/b`. Empty segments are dropped, so `//a` names the same file as
/// `/a`. Segments that only turn dangerous after percent-decoding (an encoded
/// `/` or `\`, a NUL byte) are rejected.
pub fn split_target(target: &str) -> Result<(String, PathBuf), ResolveError> {
    // A leading `//` would make the first segment an authority.
    let origin = format!("/{}", target.trim_start_matches(['/', '\\']));

    let url = Url::parse("http://localhost/")
        .and_then(|base| base.join(&origin))
        .map_err(|_| ResolveError::InvalidPath(target.to_string()))?;

    let mut relative = PathBuf::new();
    let mut segments = Vec::new();

    for segment in url.path_segments().into_iter().flatten() {
        if segment.is_empty() {
            continue;
        }

        let decoded = percent_decode_str(segment)
            .decode_utf8()
            .map_err(|_| ResolveError::InvalidPath(target.to_string()))?;

        if decoded == "."
            || decoded == ".."
            || decoded.contains(['/', '\\', '\0'])
        {
            return Err(ResolveError::InvalidPath(target.to_string()));
        }

        relative.push(&*decoded);
        segments.push(segment);
    }

    let mut url_path = format!("/{}", segments.join("/"));
    if !segments.is_empty() && url.path().ends_with('/') {
        url_path.push('/');
    }

    Ok((url_path, relative))
}

fn is_missing(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory | io::ErrorKind::InvalidFilename
    )
}

fn io_error(path: PathBuf, source: io::Error) -> ResolveError {
    ResolveError::Io { path, source }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_plain_path() {
        let (url_path, relative) = split_target("/docs/readme.txt").unwrap();
        assert_eq!(url_path, "/docs/readme.txt");
        assert_eq!(relative, PathBuf::from("docs/readme.txt"));
    }

    #[test]
    fn split_drops_query_and_fragment() {
        let (url_path, relative) = split_target("/a.txt?download=1#top").unwrap();
        assert_eq!(url_path, "/a.txt");
        assert_eq!(relative, PathBuf::from("a.txt"));
    }

    #[test]
    fn split_collapses_dot_segments_at_root() {
        let (url_path, relative) = split_target("/../../etc/passwd").unwrap();
        assert_eq!(url_path, "/etc/passwd");
        assert_eq!(relative, PathBuf::from("etc/passwd"));

        let (_, relative) = split_target("/a/./b/../c").unwrap();
        assert_eq!(relative, PathBuf::from("a/c"));
    }

    #[test]
    fn split_decodes_percent_escapes() {
        let (_, relative) = split_target("/my%20file.txt").unwrap();
        assert_eq!(relative, PathBuf::from("my file.txt"));
    }

    #[test]
    fn split_rejects_encoded_separators() {
        assert!(matches!(
            split_target("/a%2F..%2F..%2Fetc"),
            Err(ResolveError::InvalidPath(_))
        ));
        assert!(matches!(
            split_target("/a%5Cb"),
            Err(ResolveError::InvalidPath(_))
        ));
        assert!(matches!(
            split_target("/a%00b"),
            Err(ResolveError::InvalidPath(_))
        ));
        assert!(matches!(
            split_target("/%ff"),
            Err(ResolveError::InvalidPath(_))
        ));
    }

    #[test]
    fn split_collapses_repeated_slashes() {
        let (url_path, relative) = split_target("//existing/nested.txt").unwrap();
        assert_eq!(url_path, "/existing/nested.txt");
        assert_eq!(relative, PathBuf::from("existing/nested.txt"));

        let (url_path, _) = split_target("/\\existing//dir/").unwrap();
        assert_eq!(url_path, "/existing/dir/");

        let (url_path, _) = split_target("/.//existing/").unwrap();
        assert_eq!(url_path, "/existing/");
    }

    #[test]
    fn split_root_is_empty_relative_path() {
        let (url_path, relative) = split_target("/").unwrap();
        assert_eq!(url_path, "/");
        assert_eq!(relative, PathBuf::new());
    }
}
