//! Frame payload loaders
//!
//! The player never decodes images; it only needs "load the bytes behind
//! this identifier". `FrameLoader` is that capability. Implementations:
//! - `FileLoader`: local files via tokio::fs
//! - `HttpLoader`: http(s) via reqwest
//! - `SourceLoader`: picks one of the above per identifier and resolves
//!   relative identifiers against the manifest location

use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::manifest::{is_remote_id, ManifestLocation};
use reqwest::Url;
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Asynchronous "load payload by identifier" capability
///
/// Loads for one buffer fill run concurrently on the player task, so the
/// returned future must be `Send` and the loader shareable.
pub trait FrameLoader: Send + Sync + 'static {
    fn load(&self, frame_id: &str) -> impl Future<Output = Result<Frame>> + Send;
}

/// Loads frames from the local filesystem
#[derive(Debug, Clone)]
pub struct FileLoader {
    root: PathBuf,
}

impl FileLoader {
    /// Relative identifiers are resolved against `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve(&self, frame_id: &str) -> PathBuf {
        let path = Path::new(frame_id);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl FrameLoader for FileLoader {
    async fn load(&self, frame_id: &str) -> Result<Frame> {
        let path = self.resolve(frame_id);
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| Error::frame_load(frame_id, format!("{}: {}", path.display(), e)))?;
        debug!("Loaded {} ({} bytes)", path.display(), data.len());
        Ok(Frame::new(frame_id, data))
    }
}

/// Loads frames over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpLoader {
    client: reqwest::Client,
    base: Option<Url>,
}

impl HttpLoader {
    /// `base` is used to resolve identifiers that are not absolute URLs
    pub fn new(client: reqwest::Client, base: Option<Url>) -> Self {
        Self { client, base }
    }

    pub fn resolve(&self, frame_id: &str) -> Result<Url> {
        if is_remote_id(frame_id) {
            return Url::parse(frame_id.trim()).map_err(|e| Error::frame_load(frame_id, e));
        }
        match &self.base {
            Some(base) => base.join(frame_id).map_err(|e| Error::frame_load(frame_id, e)),
            None => Err(Error::frame_load(
                frame_id,
                "relative identifier without a base URL",
            )),
        }
    }
}

impl FrameLoader for HttpLoader {
    async fn load(&self, frame_id: &str) -> Result<Frame> {
        let url = self.resolve(frame_id)?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::frame_load(frame_id, e))?
            .error_for_status()
            .map_err(|e| Error::frame_load(frame_id, e))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::frame_load(frame_id, e))?;

        debug!("Fetched {} ({} bytes)", url, bytes.len());
        Ok(Frame::new(frame_id, bytes.to_vec()))
    }
}

/// Loader used by the binary: resolves identifiers the way the manifest
/// lists them
///
/// - absolute `http(s)://` identifiers always go over HTTP
/// - relative identifiers of a remote manifest are joined onto its URL
/// - relative identifiers of a local manifest are read next to it
#[derive(Debug, Clone)]
pub struct SourceLoader {
    http: HttpLoader,
    file: FileLoader,
    remote_base: bool,
}

impl SourceLoader {
    pub fn for_manifest(client: reqwest::Client, location: &ManifestLocation) -> Self {
        let file_root = location
            .base_dir()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self {
            http: HttpLoader::new(client, location.base_url().cloned()),
            file: FileLoader::new(file_root),
            remote_base: location.is_remote(),
        }
    }

    fn is_http(&self, frame_id: &str) -> bool {
        self.remote_base || is_remote_id(frame_id)
    }
}

impl FrameLoader for SourceLoader {
    async fn load(&self, frame_id: &str) -> Result<Frame> {
        if self.is_http(frame_id) {
            self.http.load(frame_id).await
        } else {
            self.file.load(frame_id).await
        }
    }
}
