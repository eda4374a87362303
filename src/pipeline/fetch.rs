//! Input resolution: fetch remote documents and classify content.
//!
//! An [`Input`] is either a URL or an uploaded file. URLs are fetched with a
//! single GET and classified by the response `Content-Type`, falling back to
//! the URL suffix and finally the `%PDF-` magic bytes when the header is
//! missing or generic. Uploads are classified by their filename extension.
//!
//! Links into search-engine caches are rejected before any network traffic:
//! they serve a re-rendered snapshot, never the original document.

use crate::error::{FetchError, SummaryError};
use crate::output::ContentKind;
use std::time::Duration;
use tracing::{debug, info};

/// Hosts that only ever proxy cached copies of other documents.
const CACHE_PROXY_HOSTS: [&str; 1] = ["webcache.googleusercontent.com"];

/// Identity used when neither a filename nor a URL yields any characters.
pub const DEFAULT_BASE_NAME: &str = "default_name";

/// What the caller wants summarised.
#[derive(Debug, Clone)]
pub enum Input {
    /// Absolute http(s) URL.
    Url(String),
    /// Uploaded file: original filename plus contents.
    Bytes { name: String, data: Vec<u8> },
}

impl Input {
    pub fn url(url: impl Into<String>) -> Self {
        Input::Url(url.into())
    }

    pub fn upload(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Input::Bytes {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Identity of the document when no explicit base name is supplied.
    pub fn base_name(&self) -> String {
        match self {
            Input::Url(url) => sanitize_base_name(url),
            Input::Bytes { name, .. } => sanitize_base_name(name),
        }
    }

    /// Reference stored alongside the summary: the URL, or the upload's base name.
    pub fn input_ref(&self, base_name: &str) -> String {
        match self {
            Input::Url(url) => url.clone(),
            Input::Bytes { .. } => base_name.to_string(),
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Replace every character outside `[A-Za-z0-9_.\- ]` with `_`.
pub fn sanitize_base_name(raw: &str) -> String {
    let name: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if name.is_empty() {
        DEFAULT_BASE_NAME.to_string()
    } else {
        name
    }
}

/// True for links into a search-engine cache proxy.
pub fn is_cache_proxy_link(url: &str) -> bool {
    CACHE_PROXY_HOSTS.iter().any(|host| url.contains(host))
}

/// Classify a fetched body.
///
/// Order: explicit header type, then URL suffix, then magic bytes. Any
/// `*/octet-stream` header (or none at all) is treated as generic.
pub fn classify_response(content_type: Option<&str>, url: &str, head: &[u8]) -> Option<ContentKind> {
    let ct = content_type
        .map(|ct| ct.to_ascii_lowercase())
        .unwrap_or_default();
    let mime = ct.split(';').next().unwrap_or("").trim();

    if mime.contains("application/pdf") || mime == "application/x-pdf" {
        return Some(ContentKind::Pdf);
    }
    if mime.contains("html") {
        return Some(ContentKind::Html);
    }
    if mime == "text/plain" {
        return Some(ContentKind::Text);
    }

    let generic = mime.is_empty() || mime.ends_with("octet-stream");
    if !generic {
        return None;
    }

    classify_path(url_path(url)).or_else(|| head.starts_with(b"%PDF-").then_some(ContentKind::Pdf))
}

/// Classify an upload by its declared filename.
pub fn classify_filename(name: &str) -> Option<ContentKind> {
    classify_path(name)
}

fn classify_path(path: &str) -> Option<ContentKind> {
    let lower = path.to_ascii_lowercase();
    if lower.ends_with(".pdf") {
        Some(ContentKind::Pdf)
    } else if lower.ends_with(".htm") || lower.ends_with(".html") {
        Some(ContentKind::Html)
    } else if lower.ends_with(".txt") {
        Some(ContentKind::Text)
    } else {
        None
    }
}

/// The URL without query string or fragment, for suffix sniffing.
fn url_path(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

/// A remote document that passed classification.
#[derive(Debug)]
pub struct FetchedDocument {
    pub kind: ContentKind,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Stateless HTTP fetcher; one GET per call.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl Fetcher {
    pub fn new(timeout_secs: u64) -> Result<Self, SummaryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SummaryError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            timeout_secs,
        })
    }

    /// Download and classify a URL.
    pub async fn fetch(&self, url: &str) -> Result<FetchedDocument, SummaryError> {
        if is_cache_proxy_link(url) {
            return Err(FetchError::CacheLinkUnsupported {
                url: url.to_string(),
            }
            .into());
        }
        if !is_url(url) {
            return Err(FetchError::InvalidUrl {
                url: url.to_string(),
            }
            .into());
        }

        info!("Fetching document: {}", url);

        let response = self.client.get(url).send().await.map_err(|e| {
            let reason = if e.is_timeout() {
                format!("timed out after {}s", self.timeout_secs)
            } else {
                e.to_string()
            };
            FetchError::Network {
                url: url.to_string(),
                reason,
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .map(|s| s.to_string());
        debug!("{} returned Content-Type: {:?}", url, content_type);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network {
                url: url.to_string(),
                reason: e.to_string(),
            })?
            .to_vec();

        let head = &bytes[..bytes.len().min(8)];
        let kind = classify_response(content_type.as_deref(), url, head).ok_or_else(|| {
            SummaryError::UnsupportedType {
                detail: content_type.clone().unwrap_or_else(|| "unknown".to_string()),
            }
        })?;

        info!("Fetched {} bytes from {} as {}", bytes.len(), url, kind);
        Ok(FetchedDocument {
            kind,
            content_type,
            bytes,
        })
    }
}
