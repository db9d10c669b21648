//! Static assets of the viewer bundle
//!
//! Assets are served byte for byte with a content type inferred from the
//! file extension.

mod build;

pub use build::ensure_viewer_bundle;

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{RelayError, Result};

/// A loaded asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

/// Anything that can resolve a request path to asset bytes
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Load the asset at `path` (request path, leading `/` allowed).
    ///
    /// Returns [`RelayError::AssetNotFound`] when the path does not name an
    /// existing file and [`RelayError::Io`] when reading it fails.
    async fn load(&self, path: &str) -> Result<Asset>;
}

/// Content type for a file path, by lowercase extension
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("js") => "application/javascript",
        Some("css") => "text/css",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("html") => "text/html",
        _ => "application/octet-stream",
    }
}

/// Assets read from a directory on disk
#[derive(Debug, Clone)]
pub struct DiskAssets {
    root: PathBuf,
}

impl DiskAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl AssetSource for DiskAssets {
    async fn load(&self, path: &str) -> Result<Asset> {
        let not_found = || RelayError::AssetNotFound(path.to_string());
        let file = resolve_path(&self.root, path).ok_or_else(not_found)?;

        let metadata = match tokio::fs::metadata(&file).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_file() {
            return Err(not_found());
        }

        // Symlinked files must still live under the root
        let root = tokio::fs::canonicalize(&self.root).await?;
        let real = tokio::fs::canonicalize(&file).await?;
        if !real.starts_with(&root) {
            warn!(
                "Asset path escapes root via symlink: {:?} -> {}",
                path,
                real.display()
            );
            return Err(not_found());
        }

        let body = tokio::fs::read(&real).await?;
        debug!(path = %file.display(), bytes = body.len(), "Serving asset");

        Ok(Asset {
            content_type: content_type_for(&file),
            body,
        })
    }
}

/// Join a request path onto `root`. Parent, absolute and NUL-bearing
/// components never resolve.
fn resolve_path(root: &Path, request_path: &str) -> Option<PathBuf> {
    let relative = request_path.trim_start_matches('/');
    if relative.is_empty() {
        return None;
    }

    let mut result = root.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(name) => {
                if name.to_string_lossy().contains('\0') {
                    warn!("Asset path contains null byte: {:?}", request_path);
                    return None;
                }
                result.push(name);
            }
            Component::CurDir => continue,
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                warn!("Rejected asset path outside root: {:?}", request_path);
                return None;
            }
        }
    }

    Some(result)
}
