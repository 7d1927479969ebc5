//! Image reference resolution and downloading
//!
//! Downloads every distinct remote image once per conversion, writes it under
//! the target directory and points the `<img>` at the local copy. Files are
//! created exclusively, so conversions sharing a directory never overwrite
//! each other's images. Failed downloads keep their original reference. Data URIs, local files, relative
//! references without a base URL and SVG images are never fetched.

use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::config::ClipperConfig;
use crate::dom::{Element, Node};

const FALLBACK_EXTENSION: &str = "png";

const MAX_FILENAME_STEM: usize = 64;

/// Downloads in flight at once for a single conversion
pub const MAX_CONCURRENT_DOWNLOADS: usize = 4;

/// Names tried before giving up on a crowded image directory
const MAX_NAME_ATTEMPTS: usize = 1000;

/// Per-conversion image policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageOptions {
    pub download_images: bool,
    pub target_path: PathBuf,
    pub rewrite_absolute: bool,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            download_images: false,
            target_path: PathBuf::from("images"),
            rewrite_absolute: false,
        }
    }
}

/// What happened to one distinct image reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub original_url: String,
    pub resolved_url: Option<String>,
    pub local_path: Option<PathBuf>,
    pub downloaded: bool,
}

struct FetchedImage {
    bytes: Vec<u8>,
    content_type: Option<String>,
}

/// Resolves, rewrites and downloads `<img>` references
#[derive(Debug, Clone)]
pub struct ImageProcessor {
    client: Client,
    timeout: Duration,
    max_bytes: u64,
    user_agent: String,
}

impl ImageProcessor {
    #[must_use]
    pub fn new(client: Client, timeout: Duration, max_bytes: u64, user_agent: impl Into<String>) -> Self {
        Self {
            client,
            timeout,
            max_bytes,
            user_agent: user_agent.into(),
        }
    }

    #[must_use]
    pub fn from_config(client: Client, config: &ClipperConfig) -> Self {
        Self::new(
            client,
            config.image_timeout(),
            config.max_image_bytes(),
            config.user_agent(),
        )
    }

    /// Rewrite image references in `root`, downloading them when asked to.
    pub async fn process(
        &self,
        root: &Element,
        options: &ImageOptions,
        base_url: Option<&Url>,
    ) -> (Element, Vec<ImageRecord>) {
        if !options.download_images {
            return Self::rewrite_references(root, options, base_url);
        }

        let mut records: Vec<ImageRecord> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut targets: Vec<(Url, String)> = Vec::new();

        for (src, alt) in collect_images(root) {
            if !seen.insert(src.clone()) {
                continue;
            }
            let resolved = fetchable_url(&src, base_url);
            if let Some(url) = &resolved
                && !targets.iter().any(|(queued, _)| queued == url)
            {
                targets.push((url.clone(), alt));
            }
            records.push(ImageRecord {
                original_url: src,
                resolved_url: resolved.map(|url| url.to_string()),
                local_path: None,
                downloaded: false,
            });
        }

        // Ordered so results line up with `targets`
        let fetches: Vec<_> = targets.iter().map(|(url, _)| self.fetch(url)).collect();
        let fetched: Vec<anyhow::Result<FetchedImage>> = futures::stream::iter(fetches)
            .buffered(MAX_CONCURRENT_DOWNLOADS)
            .collect()
            .await;

        let mut local_refs: HashMap<String, PathBuf> = HashMap::new();
        let mut used_names: HashSet<String> = HashSet::new();
        let mut dir_ready = false;
        for (idx, ((url, alt), result)) in targets.iter().zip(fetched).enumerate() {
            let image = match result {
                Ok(image) => image,
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Image download failed, keeping original reference");
                    continue;
                }
            };

            if !dir_ready {
                if let Err(e) = tokio::fs::create_dir_all(&options.target_path).await {
                    tracing::warn!(
                        dir = %options.target_path.display(),
                        error = %e,
                        "Cannot create image directory, keeping original references"
                    );
                    break;
                }
                dir_ready = true;
            }

            let extension = extension_for(image.content_type.as_deref(), url);
            let name_for = |used: &mut HashSet<String>| unique_filename(alt, idx + 1, &extension, used);
            match save_unique(&options.target_path, &image.bytes, &mut used_names, name_for).await {
                Ok(path) => {
                    tracing::debug!(url = %url, path = %path.display(), bytes = image.bytes.len(), "Saved image");
                    local_refs.insert(url.to_string(), path);
                }
                Err(e) => {
                    tracing::warn!(
                        dir = %options.target_path.display(),
                        error = %e,
                        "Failed to write image, keeping original reference"
                    );
                }
            }
        }

        for record in &mut records {
            if let Some(path) = record.resolved_url.as_ref().and_then(|url| local_refs.get(url)) {
                record.local_path = Some(path.clone());
                record.downloaded = true;
            }
        }

        let mut out = root.clone();
        for_each_image_mut(&mut out, &mut |img| {
            let Some(src) = img.attr("src") else {
                return;
            };
            if let Some(path) = fetchable_url(src, base_url).and_then(|url| local_refs.get(url.as_str())) {
                img.set_attr("src", path_reference(path));
            }
        });

        (out, records)
    }

    /// Non-downloading pass: when `rewrite_absolute` is set, same-origin
    /// absolute URLs become relative to the base URL. Everything else is kept.
    #[must_use]
    pub fn rewrite_references(
        root: &Element,
        options: &ImageOptions,
        base_url: Option<&Url>,
    ) -> (Element, Vec<ImageRecord>) {
        let mut records: Vec<ImageRecord> = Vec::new();
        let mut out = root.clone();
        for_each_image_mut(&mut out, &mut |img| {
            let Some(src) = img.attr("src").map(str::to_string) else {
                return;
            };
            let resolved = match base_url {
                Some(base) => base.join(&src).ok(),
                None => Url::parse(&src).ok(),
            };

            if options.rewrite_absolute
                && let Some(base) = base_url
                && let Ok(absolute) = Url::parse(&src)
                && same_origin(&absolute, base)
                && let Some(relative) = base.make_relative(&absolute).filter(|r| !r.is_empty())
            {
                img.set_attr("src", relative);
            }

            if !records.iter().any(|r| r.original_url == src) {
                records.push(ImageRecord {
                    original_url: src,
                    resolved_url: resolved.map(|url| url.to_string()),
                    local_path: None,
                    downloaded: false,
                });
            }
        });
        (out, records)
    }

    async fn fetch(&self, url: &Url) -> anyhow::Result<FetchedImage> {
        match tokio::time::timeout(self.timeout, self.fetch_inner(url)).await {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!(
                "Image download exceeded deadline of {:?}",
                self.timeout
            )),
        }
    }

    async fn fetch_inner(&self, url: &Url) -> anyhow::Result<FetchedImage> {
        let response = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "image/avif,image/webp,image/apng,image/*,*/*;q=0.8")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Image download failed with status: {}",
                response.status()
            ));
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase());
        if content_type.as_deref() == Some("image/svg+xml") {
            return Err(anyhow::anyhow!("SVG images are not downloaded"));
        }

        let expected_size = response.content_length().unwrap_or(0);
        if expected_size > self.max_bytes {
            return Err(anyhow::anyhow!(
                "Image too large: {} bytes exceeds limit of {} bytes",
                expected_size,
                self.max_bytes
            ));
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if (bytes.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(anyhow::anyhow!(
                    "Image download exceeded size limit of {} bytes",
                    self.max_bytes
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(FetchedImage {
            bytes,
            content_type,
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// `(src, alt)` of every `<img>` in document order
fn collect_images(root: &Element) -> Vec<(String, String)> {
    let mut images = Vec::new();
    let mut visit = |el: &Element| {
        if el.is("img")
            && let Some(src) = el.attr("src").map(str::trim).filter(|s| !s.is_empty())
        {
            images.push((src.to_string(), el.attr("alt").unwrap_or_default().to_string()));
        }
    };
    visit(root);
    for el in root.find_all(&|el| el.is("img")) {
        visit(el);
    }
    images
}

fn for_each_image_mut(root: &mut Element, f: &mut dyn FnMut(&mut Element)) {
    if root.is("img") {
        f(root);
    }
    for child in &mut root.children {
        if let Node::Element(el) = child {
            for_each_image_mut(el, f);
        }
    }
}

/// The absolute http(s) URL to download for `src`, if it should be fetched at all.
fn fetchable_url(src: &str, base_url: Option<&Url>) -> Option<Url> {
    let src = src.trim();
    if src.is_empty() || src.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("data:")) {
        return None;
    }
    let resolved = match Url::parse(src) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => base_url?.join(src).ok()?,
        Err(_) => return None,
    };
    if !matches!(resolved.scheme(), "http" | "https") {
        return None;
    }
    if resolved.path().to_ascii_lowercase().ends_with(".svg") {
        return None;
    }
    Some(resolved)
}

fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme() && a.host_str() == b.host_str() && a.port_or_known_default() == b.port_or_known_default()
}

fn extension_for(content_type: Option<&str>, url: &Url) -> String {
    let from_type = content_type.and_then(|ct| match ct {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" | "image/pjpeg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/avif" => Some("avif"),
        "image/bmp" => Some("bmp"),
        "image/tiff" => Some("tiff"),
        "image/x-icon" | "image/vnd.microsoft.icon" => Some("ico"),
        _ => None,
    });
    if let Some(ext) = from_type {
        return ext.to_string();
    }

    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|last| last.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}

/// Filename from sanitized alt text, or `image-{counter}`, made unique per call
fn unique_filename(alt: &str, counter: usize, extension: &str, used: &mut HashSet<String>) -> String {
    let sanitized = sanitize_filename::sanitize(alt.trim());
    let stem: String = sanitized
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
        .trim_matches('.')
        .chars()
        .take(MAX_FILENAME_STEM)
        .collect();
    let stem = if stem.is_empty() { format!("image-{counter}") } else { stem };

    let mut candidate = format!("{stem}.{extension}");
    let mut suffix = 2;
    while used.contains(&candidate) {
        candidate = format!("{stem}-{suffix}.{extension}");
        suffix += 1;
    }
    used.insert(candidate.clone());
    candidate
}

/// Write `bytes` to a file in `dir` that did not exist before, taking names
/// from `next_name` until one is free.
async fn save_unique(
    dir: &Path,
    bytes: &[u8],
    used: &mut HashSet<String>,
    mut next_name: impl FnMut(&mut HashSet<String>) -> String,
) -> io::Result<PathBuf> {
    for _ in 0..MAX_NAME_ATTEMPTS {
        let path = dir.join(next_name(used));
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await;
        let mut file = match file {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        };
        file.write_all(bytes).await?;
        file.flush().await?;
        return Ok(path);
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free image filename after {MAX_NAME_ATTEMPTS} attempts"),
    ))
}

/// Markdown-friendly reference for a local path
fn path_reference(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn img(src: &str) -> Node {
        Node::Element(Element::new("img").with_attr("src", src).with_attr("alt", "x"))
    }

    #[test]
    fn test_fetchable_url_skips_local_and_svg() {
        let base = Url::parse("https://example.com/post/").ok();
        assert!(fetchable_url("data:image/png;base64,AA", base.as_ref()).is_none());
        assert!(fetchable_url("file:///tmp/a.png", base.as_ref()).is_none());
        assert!(fetchable_url("diagram.SVG", base.as_ref()).is_none());
        assert!(fetchable_url("cat.png", None).is_none());
        assert_eq!(
            fetchable_url("cat.png", base.as_ref()).map(|u| u.to_string()),
            Some("https://example.com/post/cat.png".to_string())
        );
    }

    #[test]
    fn test_extension_from_type_then_suffix() {
        let url = Url::parse("https://a.com/img/photo.JPEG?x=1").expect("valid url");
        assert_eq!(extension_for(Some("image/webp"), &url), "webp");
        assert_eq!(extension_for(Some("application/octet-stream"), &url), "jpeg");
        let bare = Url::parse("https://a.com/img/raw").expect("valid url");
        assert_eq!(extension_for(None, &bare), "png");
    }

    #[test]
    fn test_unique_filenames() {
        let mut used = HashSet::new();
        assert_eq!(unique_filename("A cat: sleeping", 1, "png", &mut used), "a-cat-sleeping.png");
        assert_eq!(unique_filename("A cat: sleeping", 2, "png", &mut used), "a-cat-sleeping-2.png");
        assert_eq!(unique_filename("  ", 3, "gif", &mut used), "image-3.gif");
    }

    #[tokio::test]
    async fn test_save_unique_skips_existing_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("logo.png"), b"earlier").expect("seed file");

        let mut used = HashSet::new();
        let name_for = |used: &mut HashSet<String>| unique_filename("Logo", 1, "png", used);
        let path = save_unique(dir.path(), b"new", &mut used, name_for)
            .await
            .expect("saved");

        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("logo-2.png"));
        assert_eq!(std::fs::read(dir.path().join("logo.png")).expect("kept"), b"earlier");
        assert_eq!(std::fs::read(&path).expect("written"), b"new");
    }

    #[test]
    fn test_rewrite_absolute_same_origin_only() {
        let root = Element::new("div")
            .with_child(img("https://example.com/blog/img/cat.png"))
            .with_child(img("https://cdn.other.com/dog.png"))
            .with_child(img("local.png"));
        let base = Url::parse("https://example.com/blog/post.html").ok();
        let options = ImageOptions {
            rewrite_absolute: true,
            ..ImageOptions::default()
        };
        let (out, records) = ImageProcessor::rewrite_references(&root, &options, base.as_ref());
        let srcs: Vec<&str> = out.find_all(&|e| e.is("img")).iter().filter_map(|e| e.attr("src")).collect();
        assert_eq!(srcs, vec!["img/cat.png", "https://cdn.other.com/dog.png", "local.png"]);
        assert_eq!(records.len(), 3);
        assert_eq!(
            records[2].resolved_url.as_deref(),
            Some("https://example.com/blog/local.png")
        );
    }

    #[test]
    fn test_without_rewrite_references_are_untouched() {
        let root = Element::new("div").with_child(img("https://example.com/a.png"));
        let base = Url::parse("https://example.com/").ok();
        let (out, _) = ImageProcessor::rewrite_references(&root, &ImageOptions::default(), base.as_ref());
        assert_eq!(out, root);
    }
}
