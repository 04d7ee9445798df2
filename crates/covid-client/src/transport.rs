use std::time::Duration;

use async_trait::async_trait;
use covid_core::error::AppError;
use covid_core::models::Payload;
use covid_core::traits::Transport;
use futures::TryStreamExt;
use reqwest::Client;
use tokio_util::io::StreamReader;
use url::Url;

const USER_AGENT: &str = concat!("covid-update-bot/", env!("CARGO_PKG_VERSION"));

/// HTTP transport using reqwest.
///
/// Bodies are handed out as streams; the connection is released when the
/// returned [`Payload`] is dropped.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    timeout_secs: u64,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::ConfigError(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            timeout_secs: timeout.as_secs(),
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<Payload, AppError> {
        validate_url(url)?;
        tracing::debug!(%url, "GET");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::FetchError(format!("{url} timed out after {}s", self.timeout_secs))
            } else if e.is_connect() {
                AppError::FetchError(format!("connection to {url} failed: {e}"))
            } else {
                AppError::FetchError(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::FetchError(format!(
                "HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }

        let body = response.bytes_stream().map_err(std::io::Error::other);
        Ok(Payload::new(url, StreamReader::new(body)))
    }
}

/// Only plain http/https URLs with a host are fetched.
fn validate_url(url: &str) -> Result<(), AppError> {
    let parsed = Url::parse(url).map_err(|e| AppError::FetchError(format!("invalid URL: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(AppError::FetchError(format!(
                "URL scheme '{scheme}' is not allowed (only http/https)"
            )));
        }
    }

    if parsed.host_str().is_none() {
        return Err(AppError::FetchError("URL has no host".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url_accepts_http() {
        assert!(validate_url("https://data.covid19.go.id/public/api/update.json").is_ok());
        assert!(validate_url("http://www.mhlw.go.jp/stf/news.rdf").is_ok());
    }

    #[test]
    fn test_validate_url_rejects_bad_scheme() {
        let err = validate_url("file:///etc/passwd").unwrap_err();
        assert!(err.to_string().contains("not allowed"));
    }

    #[test]
    fn test_validate_url_rejects_garbage() {
        assert!(matches!(
            validate_url("not a url").unwrap_err(),
            AppError::FetchError(_)
        ));
    }

    #[tokio::test]
    async fn test_get_rejects_before_network() {
        let transport = ReqwestTransport::new().unwrap();
        let err = transport.get("ftp://example.com/x").await.unwrap_err();
        assert!(matches!(err, AppError::FetchError(_)));
    }
}
