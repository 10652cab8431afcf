use std::time::Duration;

use adminkit_core::error::FetchError;
use adminkit_core::source::RemoteSource;
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{StatusCode, Url};

/// Remote catalog served over HTTP(S). Logical paths are resolved against
/// `base_url`.
pub struct HttpSource {
    client: reqwest::Client,
    base: Url,
}

impl HttpSource {
    pub fn new(base_url: &str, timeout_ms: u64) -> Result<Self> {
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base).with_context(|| format!("invalid catalog url: {base_url}"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .user_agent(concat!("adminkit/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build http client")?;
        Ok(Self { client, base })
    }

    fn url_for(&self, path: &str) -> Result<Url, FetchError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| FetchError::InvalidPath(format!("{path}: {e}")))
    }
}

#[async_trait]
impl RemoteSource for HttpSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, path: &str) -> Result<Bytes, FetchError> {
        let url = self.url_for(path)?;
        tracing::debug!(target: "adminkit.cache", %url, "GET");

        let unreachable = |e: reqwest::Error| FetchError::Unreachable {
            path: path.to_string(),
            message: e.to_string(),
        };
        let resp = self.client.get(url).send().await.map_err(unreachable)?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound {
                path: path.to_string(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }
        resp.bytes().await.map_err(unreachable)
    }
}
