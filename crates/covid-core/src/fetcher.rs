use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::country::Country;
use crate::error::AppError;
use crate::models::Payload;
use crate::traits::{Fetcher, ImageFetcher, Transport};

/// Reads pre-recorded payloads from a local directory tree.
///
/// Layout: `<directory>/<country code, lowercase>/<source>/<file>`. The feed
/// lives at a fixed filename; news pages and images are stored under the
/// last path segment of their original URL.
#[derive(Debug, Clone)]
pub struct FixtureFetcher {
    directory: PathBuf,
    country: Country,
    source_name: String,
    feed_file: String,
}

impl FixtureFetcher {
    pub fn new(
        directory: impl Into<PathBuf>,
        country: Country,
        source_name: impl Into<String>,
        feed_file: impl Into<String>,
    ) -> Self {
        Self {
            directory: directory.into(),
            country,
            source_name: source_name.into(),
            feed_file: feed_file.into(),
        }
    }

    /// Path of a file inside this source's fixture directory.
    pub fn path(&self, name: &str) -> PathBuf {
        self.directory
            .join(self.country.code().to_ascii_lowercase())
            .join(&self.source_name)
            .join(name)
    }

    async fn open(&self, name: &str) -> Result<Payload, AppError> {
        let path = self.path(name);
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| AppError::FetchError(format!("fixture {}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), "Opened fixture");
        Ok(Payload::new(path.display().to_string(), file))
    }
}

#[async_trait]
impl Fetcher for FixtureFetcher {
    fn source(&self) -> String {
        self.path("").display().to_string()
    }

    async fn feed(&self) -> Result<Payload, AppError> {
        self.open(&self.feed_file).await
    }
}

#[async_trait]
impl ImageFetcher for FixtureFetcher {
    async fn news(&self, id: &str) -> Result<Payload, AppError> {
        let name = url_to_filename(id)?;
        self.open(&name).await
    }

    async fn image(&self, id: &str) -> Result<Vec<u8>, AppError> {
        let name = url_to_filename(id)?;
        self.open(&name).await?.into_bytes().await
    }
}

/// Map an identifier to its fixture filename: the last non-empty segment of
/// its URL path. Query and fragment are ignored, so two URLs that share the
/// final segment resolve to the same file. The segment is percent-decoded.
pub fn url_to_filename(raw: &str) -> Result<String, AppError> {
    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse("fixture://local/")
            .and_then(|base| base.join(raw))
            .map_err(|e| AppError::FetchError(format!("invalid identifier '{raw}': {e}")))?,
        Err(e) => {
            return Err(AppError::FetchError(format!(
                "invalid identifier '{raw}': {e}"
            )));
        }
    };

    let segment = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
        .ok_or_else(|| AppError::FetchError(format!("identifier '{raw}' has no file name")))?;

    urlencoding::decode(segment)
        .map(|name| name.into_owned())
        .map_err(|e| AppError::FetchError(format!("identifier '{raw}': {e}")))
}

/// Retrieves a source over the network through a [`Transport`].
#[derive(Clone)]
pub struct RemoteFetcher {
    transport: Arc<dyn Transport>,
    base_url: Url,
    feed_path: String,
}

impl RemoteFetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: &str,
        feed_path: impl Into<String>,
    ) -> Result<Self, AppError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::ConfigError(format!("invalid base URL '{base_url}': {e}")))?;
        Ok(Self {
            transport,
            base_url,
            feed_path: feed_path.into(),
        })
    }

    /// Resolve an identifier found in a document against the base URL.
    fn resolve(&self, id: &str) -> Result<Url, AppError> {
        self.base_url
            .join(id)
            .map_err(|e| AppError::FetchError(format!("invalid identifier '{id}': {e}")))
    }
}

#[async_trait]
impl Fetcher for RemoteFetcher {
    fn source(&self) -> String {
        self.base_url.to_string()
    }

    async fn feed(&self) -> Result<Payload, AppError> {
        let url = self.resolve(&self.feed_path)?;
        self.transport.get(url.as_str()).await
    }
}

#[async_trait]
impl ImageFetcher for RemoteFetcher {
    async fn news(&self, id: &str) -> Result<Payload, AppError> {
        let url = self.resolve(id)?;
        self.transport.get(url.as_str()).await
    }

    async fn image(&self, id: &str) -> Result<Vec<u8>, AppError> {
        let url = self.resolve(id)?;
        self.transport.get(url.as_str()).await?.into_bytes().await
    }
}

/// True if `path` looks like a fixture tree root (used by the CLI to warn early).
pub fn is_fixture_root(path: &Path) -> bool {
    Country::ALL
        .iter()
        .any(|c| path.join(c.code().to_ascii_lowercase()).is_dir())
}
