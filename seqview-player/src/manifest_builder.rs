//! Manifest builder
//!
//! Produces the manifest from a local directory of frames: picks the files
//! carrying the frame suffix, keeps the newest N (file names sort
//! chronologically), writes `images.json` and `latest.json`, and
//! optionally prunes files that are no longer listed.
//!
//! With a remote source the directory is first topped up from an HTTP
//! directory listing: anchor hrefs go through the same frame selection
//! and every selected frame not yet on disk is downloaded. A failed
//! download is logged and skipped; only the listing itself is fatal.

use crate::error::{Error, Result};
use futures::stream::{self, StreamExt};
use regex::Regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_SUFFIX: &str = "2400x2400.jpg";
pub const DEFAULT_KEEP: usize = 50;
pub const DEFAULT_PREFIX: &str = "images";

pub const DEFAULT_LISTING_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Frames downloaded at once
const DOWNLOAD_CONCURRENCY: usize = 4;

/// HTTP directory listing the frames are mirrored from
#[derive(Debug, Clone)]
pub struct RemoteSource {
    client: reqwest::Client,
    /// Listing URL; frame names are resolved against it
    pub url: Url,
    pub listing_timeout: Duration,
    pub download_timeout: Duration,
}

impl RemoteSource {
    pub fn new(client: reqwest::Client, url: &str) -> Result<Self> {
        let mut url = Url::parse(url.trim())
            .map_err(|e| Error::InvalidInput(format!("bad source URL {:?}: {}", url, e)))?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(Self {
            client,
            url,
            listing_timeout: DEFAULT_LISTING_TIMEOUT,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
        })
    }
}

/// Outcome of mirroring the remote listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// Frame names selected from the listing
    pub selected: Vec<String>,
    /// Newly downloaded
    pub downloaded: Vec<String>,
    /// Already on disk
    pub present: Vec<String>,
    /// Download failed, skipped
    pub failed: Vec<String>,
}

/// `latest.json` document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestImage {
    pub latest_image: String,
}

#[derive(Debug, Clone)]
pub struct ManifestBuildOptions {
    /// Directory holding the frame files
    pub dir: PathBuf,
    /// Manifest output path
    pub manifest_out: PathBuf,
    /// `latest.json` output path
    pub latest_out: PathBuf,
    /// Only names ending with this are frames
    pub suffix: String,
    /// Newest frames to keep
    pub keep: usize,
    /// Path prefix written in front of each file name
    pub prefix: String,
    /// Delete files in `dir` that are not kept
    pub prune: bool,
    /// Mirror frames from here before indexing
    pub source: Option<RemoteSource>,
}

impl ManifestBuildOptions {
    /// Defaults with outputs next to `dir` (`<parent>/images.json`,
    /// `<parent>/latest.json`)
    pub fn for_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let parent = dir.parent().map(Path::to_path_buf).unwrap_or_default();
        Self {
            manifest_out: parent.join("images.json"),
            latest_out: parent.join("latest.json"),
            dir,
            suffix: DEFAULT_SUFFIX.to_string(),
            keep: DEFAULT_KEEP,
            prefix: DEFAULT_PREFIX.to_string(),
            prune: false,
            source: None,
        }
    }

    fn entry(&self, file_name: &str) -> String {
        let prefix = self.prefix.trim_end_matches('/');
        if prefix.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{}", prefix, file_name)
        }
    }
}

/// What a build produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestBuild {
    /// Manifest entries in playback order
    pub entries: Vec<String>,
    /// `latest.json` contents, None when no frame was found
    pub latest: Option<LatestImage>,
    /// File names removed by pruning
    pub pruned: Vec<String>,
    /// Remote mirroring, when a source was given
    pub fetched: Option<FetchReport>,
}

/// Frame file names to keep, oldest first
pub fn select_frames<I, S>(names: I, suffix: &str, keep: usize) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut frames: Vec<String> = names
        .into_iter()
        .map(|name| name.as_ref().to_string())
        .filter(|name| name.ends_with(suffix) && name.contains('_'))
        .collect();
    frames.sort();
    frames.dedup();

    let skip = frames.len().saturating_sub(keep);
    frames.split_off(skip)
}

/// `href` values of the anchors in an HTML page, in document order
pub fn listing_hrefs(html: &str) -> Result<Vec<String>> {
    let anchor = Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#)
        .map_err(|e| Error::Internal(format!("href pattern: {}", e)))?;
    Ok(anchor
        .captures_iter(html)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)))
        .map(|href| href.as_str().trim().to_string())
        .filter(|href| !href.is_empty())
        .collect())
}

/// Frame names to mirror from a listing page
///
/// Only hrefs naming a file in the listed directory itself are
/// considered, so nothing is ever written outside the frame directory.
pub fn listing_frames(html: &str, suffix: &str, keep: usize) -> Result<Vec<String>> {
    let hrefs = listing_hrefs(html)?;
    let names = hrefs.iter().filter(|href| is_plain_file_name(href));
    Ok(select_frames(names, suffix, keep))
}

fn is_plain_file_name(href: &str) -> bool {
    !href.starts_with('.') && !href.contains(['/', '\\', '?', '#', ':'])
}

/// Download the listing's newest frames that are not yet in `dir`
pub async fn fetch_frames(source: &RemoteSource, dir: &Path, suffix: &str, keep: usize) -> Result<FetchReport> {
    info!("Fetching frame listing {}", source.url);
    let html = fetch_listing(source)
        .await
        .map_err(|e| Error::ManifestUnavailable(format!("listing {}: {}", source.url, e)))?;
    let selected = listing_frames(&html, suffix, keep)?;
    info!("Listing offers {} frames", selected.len());

    tokio::fs::create_dir_all(dir).await?;

    let mut report = FetchReport {
        selected: selected.clone(),
        ..FetchReport::default()
    };
    let mut missing = Vec::new();
    for name in selected {
        if tokio::fs::try_exists(dir.join(&name)).await? {
            report.present.push(name);
        } else {
            missing.push(name);
        }
    }

    let outcomes: Vec<(String, Result<()>)> = stream::iter(missing)
        .map(|name| async move {
            let result = download_frame(source, dir, &name).await;
            (name, result)
        })
        .buffer_unordered(DOWNLOAD_CONCURRENCY)
        .collect()
        .await;

    for (name, result) in outcomes {
        match result {
            Ok(()) => report.downloaded.push(name),
            Err(e) => {
                warn!("Failed to download {}: {}", name, e);
                report.failed.push(name);
            }
        }
    }
    report.downloaded.sort();
    report.failed.sort();

    info!(
        "Downloaded {} frames, {} already present, {} failed",
        report.downloaded.len(),
        report.present.len(),
        report.failed.len()
    );
    Ok(report)
}

async fn fetch_listing(source: &RemoteSource) -> reqwest::Result<String> {
    source
        .client
        .get(source.url.clone())
        .timeout(source.listing_timeout)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await
}

async fn download_frame(source: &RemoteSource, dir: &Path, name: &str) -> Result<()> {
    let url = source
        .url
        .join(name)
        .map_err(|e| Error::frame_load(name, e))?;
    let bytes = async {
        source
            .client
            .get(url)
            .timeout(source.download_timeout)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await
    }
    .await
    .map_err(|e| Error::frame_load(name, e))?;

    // Write under a temporary name so an interrupted run leaves no partial frame
    let path = dir.join(name);
    let partial = dir.join(format!(".{}.part", name));
    tokio::fs::write(&partial, &bytes).await?;
    tokio::fs::rename(&partial, &path).await?;
    debug!("Downloaded {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// Mirror the remote source if any, scan the directory, write the
/// manifest and `latest.json`
pub async fn build_manifest(options: &ManifestBuildOptions) -> Result<ManifestBuild> {
    if options.keep == 0 {
        return Err(Error::InvalidInput("keep must be at least 1".to_string()));
    }

    let fetched = match &options.source {
        Some(source) => Some(fetch_frames(source, &options.dir, &options.suffix, options.keep).await?),
        None => None,
    };

    let names = list_file_names(&options.dir).await?;
    let kept = select_frames(&names, &options.suffix, options.keep);
    info!(
        "Selected {} of {} files in {}",
        kept.len(),
        names.len(),
        options.dir.display()
    );

    let entries: Vec<String> = kept.iter().map(|name| options.entry(name)).collect();
    write_json(&options.manifest_out, &entries).await?;
    info!("Wrote manifest {} ({} frames)", options.manifest_out.display(), entries.len());

    let latest = entries.last().map(|entry| LatestImage {
        latest_image: entry.clone(),
    });
    match &latest {
        Some(latest) => {
            write_json(&options.latest_out, latest).await?;
            info!("Latest frame: {}", latest.latest_image);
        }
        None => warn!("No frames matching *{} in {}", options.suffix, options.dir.display()),
    }

    let pruned = if options.prune {
        prune_files(&options.dir, &names, &kept).await
    } else {
        Vec::new()
    };

    Ok(ManifestBuild {
        entries,
        latest,
        pruned,
        fetched,
    })
}

async fn list_file_names(dir: &Path) -> Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| {
        Error::InvalidInput(format!("cannot read image directory {}: {}", dir.display(), e))
    })?;

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(name) => debug!("Skipping non UTF-8 file name {:?}", name),
        }
    }
    Ok(names)
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut json = serde_json::to_vec_pretty(value)
        .map_err(|e| Error::Internal(format!("serializing {}: {}", path.display(), e)))?;
    json.push(b'\n');

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, json).await?;
    Ok(())
}

/// Remove every listed file that is not kept; failures are logged
async fn prune_files(dir: &Path, names: &[String], kept: &[String]) -> Vec<String> {
    let mut pruned = Vec::new();
    for name in names.iter().filter(|name| !kept.contains(name)) {
        let path = dir.join(name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Pruned {}", path.display());
                pruned.push(name.clone());
            }
            Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
        }
    }
    if !pruned.is_empty() {
        info!("Pruned {} files from {}", pruned.len(), dir.display());
    }
    pruned.sort();
    pruned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_frames_keeps_newest() {
        let names = [
            "20250101_0030_GOES19-ABI-umv-GEOCOLOR-2400x2400.jpg",
            "20250101_0010_GOES19-ABI-umv-GEOCOLOR-2400x2400.jpg",
            "20250101_0020_GOES19-ABI-umv-GEOCOLOR-2400x2400.jpg",
            "20250101_0020_GOES19-ABI-umv-GEOCOLOR-1200x1200.jpg",
            "latest-2400x2400.jpg",
            "thumbnails",
        ];
        let kept = select_frames(names, DEFAULT_SUFFIX, 2);
        assert_eq!(
            kept,
            vec![
                "20250101_0020_GOES19-ABI-umv-GEOCOLOR-2400x2400.jpg".to_string(),
                "20250101_0030_GOES19-ABI-umv-GEOCOLOR-2400x2400.jpg".to_string(),
            ]
        );
    }

    #[test]
    fn test_select_frames_fewer_than_keep() {
        let kept = select_frames(["a_1-2400x2400.jpg"], DEFAULT_SUFFIX, 50);
        assert_eq!(kept.len(), 1);
        assert!(select_frames(Vec::<String>::new(), DEFAULT_SUFFIX, 50).is_empty());
    }

    const LISTING: &str = r#"<html><body><h1>Index of /GEOCOLOR</h1><pre>
<a href="../">../</a>
<a href="20250101_0010_GOES19-ABI-umv-GEOCOLOR-2400x2400.jpg">20250101_0010_...</a>  14M
<a href='20250101_0000_GOES19-ABI-umv-GEOCOLOR-2400x2400.jpg'>20250101_0000_...</a>  14M
<A HREF="20250101_0010_GOES19-ABI-umv-GEOCOLOR-1200x1200.jpg">1200</A>
<a href="latest-2400x2400.jpg">latest</a>
<a class="x" href="/elsewhere/20250101_0020_umv-2400x2400.jpg">abs</a>
<a href="https://cdn.example.org/20250101_0030_umv-2400x2400.jpg">remote</a>
<a href="../20250101_0040_umv-2400x2400.jpg">up</a>
<a name="anchor-without-href">x</a>
</pre></body></html>"#;

    #[test]
    fn test_listing_hrefs() {
        let hrefs = listing_hrefs(LISTING).unwrap();
        assert_eq!(hrefs.len(), 8);
        assert_eq!(hrefs[0], "../");
        assert_eq!(hrefs[2], "20250101_0000_GOES19-ABI-umv-GEOCOLOR-2400x2400.jpg");
        assert_eq!(hrefs[3], "20250101_0010_GOES19-ABI-umv-GEOCOLOR-1200x1200.jpg");
    }

    #[test]
    fn test_listing_frames_only_local_full_size() {
        let frames = listing_frames(LISTING, DEFAULT_SUFFIX, DEFAULT_KEEP).unwrap();
        assert_eq!(
            frames,
            vec![
                "20250101_0000_GOES19-ABI-umv-GEOCOLOR-2400x2400.jpg".to_string(),
                "20250101_0010_GOES19-ABI-umv-GEOCOLOR-2400x2400.jpg".to_string(),
            ]
        );

        let newest = listing_frames(LISTING, DEFAULT_SUFFIX, 1).unwrap();
        assert_eq!(newest, vec!["20250101_0010_GOES19-ABI-umv-GEOCOLOR-2400x2400.jpg".to_string()]);
        assert!(listing_frames("<p>no links</p>", DEFAULT_SUFFIX, 5).unwrap().is_empty());
    }

    #[test]
    fn test_remote_source_url_is_a_directory() {
        let source = RemoteSource::new(reqwest::Client::new(), "https://cdn.example.org/umv/GEOCOLOR").unwrap();
        assert_eq!(source.url.as_str(), "https://cdn.example.org/umv/GEOCOLOR/");
        assert_eq!(
            source.url.join("a_1-2400x2400.jpg").unwrap().as_str(),
            "https://cdn.example.org/umv/GEOCOLOR/a_1-2400x2400.jpg"
        );
        assert!(RemoteSource::new(reqwest::Client::new(), "not a url").is_err());
    }

    #[test]
    fn test_entry_prefix() {
        let mut options = ManifestBuildOptions::for_dir("docs/images");
        assert_eq!(options.entry("a.jpg"), "images/a.jpg");
        assert_eq!(options.manifest_out, PathBuf::from("docs/images.json"));

        options.prefix = "frames/".to_string();
        assert_eq!(options.entry("a.jpg"), "frames/a.jpg");

        options.prefix.clear();
        assert_eq!(options.entry("a.jpg"), "a.jpg");
    }
}
