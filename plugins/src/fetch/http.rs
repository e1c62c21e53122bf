use async_trait::async_trait;
use bioscfg_core::config::FetchConfig;
use bioscfg_core::runner::{BiosConfigSource, FetchError};
use reqwest::StatusCode;

use crate::http::{build_client, HttpError};

/// Downloads BIOS configuration documents over plain HTTP(S).
pub struct HttpConfigSource {
    http: reqwest::Client,
    max_bytes: usize,
}

impl HttpConfigSource {
    pub fn new(cfg: &FetchConfig) -> anyhow::Result<Self> {
        Ok(Self {
            http: build_client(cfg.timeout_ms, false)?,
            max_bytes: cfg.max_bytes,
        })
    }
}

fn transport(err: reqwest::Error, url: &str) -> FetchError {
    FetchError::Transport(HttpError::from_reqwest(err, url.to_string()).to_string())
}

#[async_trait]
impl BiosConfigSource for HttpConfigSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| transport(e, url))?;

        let status = resp.status();
        if status != StatusCode::OK {
            tracing::warn!(
                target: "bioscfg.fetch",
                url = %url,
                status = status.as_u16(),
                "bios config download rejected"
            );
            return Err(FetchError::status(
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown Status"),
            ));
        }

        if resp
            .content_length()
            .is_some_and(|len| len > self.max_bytes as u64)
        {
            return Err(FetchError::TooLarge {
                limit: self.max_bytes,
            });
        }

        let mut body = Vec::new();
        while let Some(chunk) = resp.chunk().await.map_err(|e| transport(e, url))? {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        tracing::debug!(
            target: "bioscfg.fetch",
            url = %url,
            bytes = body.len(),
            "bios config downloaded"
        );
        String::from_utf8(body).map_err(|e| FetchError::InvalidBody(e.to_string()))
    }
}
