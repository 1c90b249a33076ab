//! Manifest loading
//!
//! The manifest is a single JSON document: an array of frame identifier
//! strings in playback order. It is fetched exactly once per session, from
//! either an `http(s)://` URL or a local path. Any failure surfaces as
//! `Error::ManifestUnavailable`; there is no retry.

use crate::error::{Error, Result};
use crate::frame::FrameList;
use reqwest::Url;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Where the manifest lives
///
/// Also serves as the base against which relative frame identifiers are
/// resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestLocation {
    Remote(Url),
    Local(PathBuf),
}

impl ManifestLocation {
    /// Interpret a CLI/config string: `http://` and `https://` are remote,
    /// everything else is a filesystem path.
    pub fn parse(location: &str) -> Result<Self> {
        let location = location.trim();
        if location.is_empty() {
            return Err(Error::InvalidInput("empty manifest location".to_string()));
        }

        if is_remote_id(location) {
            let url = Url::parse(location).map_err(|e| {
                Error::InvalidInput(format!("invalid manifest URL {:?}: {}", location, e))
            })?;
            Ok(ManifestLocation::Remote(url))
        } else {
            Ok(ManifestLocation::Local(PathBuf::from(location)))
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, ManifestLocation::Remote(_))
    }

    /// Directory that relative local identifiers are resolved against
    pub fn base_dir(&self) -> Option<&Path> {
        match self {
            ManifestLocation::Local(path) => Some(path.parent().unwrap_or_else(|| Path::new(""))),
            ManifestLocation::Remote(_) => None,
        }
    }

    /// URL that relative remote identifiers are joined onto
    pub fn base_url(&self) -> Option<&Url> {
        match self {
            ManifestLocation::Remote(url) => Some(url),
            ManifestLocation::Local(_) => None,
        }
    }
}

impl std::fmt::Display for ManifestLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManifestLocation::Remote(url) => write!(f, "{}", url),
            ManifestLocation::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// True for identifiers that carry their own http(s) scheme
pub fn is_remote_id(id: &str) -> bool {
    let lower = id.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Parse a manifest payload (`Array<string>`, no other fields)
pub fn parse_manifest(payload: &[u8]) -> Result<FrameList> {
    let ids: Vec<String> = serde_json::from_slice(payload)
        .map_err(|e| Error::ManifestUnavailable(format!("malformed manifest: {}", e)))?;

    let blank = ids.iter().filter(|id| id.trim().is_empty()).count();
    if blank > 0 {
        warn!("Manifest contains {} blank frame identifiers", blank);
    }

    Ok(FrameList::new(ids))
}

/// Fetches the manifest once
pub struct ManifestLoader {
    client: reqwest::Client,
    location: ManifestLocation,
}

impl ManifestLoader {
    pub fn new(client: reqwest::Client, location: ManifestLocation) -> Self {
        Self { client, location }
    }

    pub fn location(&self) -> &ManifestLocation {
        &self.location
    }

    /// Single fetch + parse attempt
    ///
    /// An empty array is a valid manifest; the player treats it as
    /// "nothing to do".
    pub async fn load(&self) -> Result<FrameList> {
        info!("Fetching manifest from {}", self.location);

        let payload = match &self.location {
            ManifestLocation::Remote(url) => fetch_remote(&self.client, url).await?,
            ManifestLocation::Local(path) => tokio::fs::read(path).await.map_err(|e| {
                Error::ManifestUnavailable(format!("cannot read {}: {}", path.display(), e))
            })?,
        };

        debug!("Manifest payload: {} bytes", payload.len());
        let frames = parse_manifest(&payload)?;
        info!("Manifest lists {} frames", frames.len());
        Ok(frames)
    }
}

async fn fetch_remote(client: &reqwest::Client, url: &Url) -> Result<Vec<u8>> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| Error::ManifestUnavailable(format!("request to {} failed: {}", url, e)))?;

    let response = response
        .error_for_status()
        .map_err(|e| Error::ManifestUnavailable(format!("{}: {}", url, e)))?;

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::ManifestUnavailable(format!("reading {} failed: {}", url, e)))?;

    Ok(bytes.to_vec())
}
