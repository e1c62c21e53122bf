//! Shared HTTP plumbing for the Redfish, FleetDB and config-source clients.

use std::time::Duration;

use bioscfg_core::BmcError;
use serde_json::Value;
use thiserror::Error;

pub const BODY_PREVIEW_LIMIT: usize = 512;

/// What went wrong before the remote side produced a usable answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Timeout,
    Connect,
    Request,
    Body,
    Decode,
    Unknown,
}

impl TransportKind {
    fn of(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect
        } else if err.is_request() {
            Self::Request
        } else if err.is_body() {
            Self::Body
        } else if err.is_decode() {
            Self::Decode
        } else {
            Self::Unknown
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::Request => "request",
            Self::Body => "body",
            Self::Decode => "decode",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Error, Debug)]
pub enum HttpError {
    #[error("{} failure calling {url}: {source}", .kind.as_str())]
    Transport {
        kind: TransportKind,
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered {status}: {body}")]
    Status { status: u16, url: String, body: String },
    #[error("{url} answered {status} with an unreadable body: {message}")]
    Decode {
        status: u16,
        url: String,
        message: String,
    },
}

impl HttpError {
    pub(crate) fn from_reqwest(source: reqwest::Error, url: String) -> Self {
        HttpError::Transport {
            kind: TransportKind::of(&source),
            url,
            source,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            HttpError::Status { status, .. } | HttpError::Decode { status, .. } => Some(*status),
        }
    }

    pub fn url(&self) -> &str {
        match self {
            HttpError::Transport { url, .. }
            | HttpError::Status { url, .. }
            | HttpError::Decode { url, .. } => url,
        }
    }

    /// Reachability problems become `Transport`, everything the controller
    /// actually answered becomes `Protocol`.
    pub fn into_bmc_error(self) -> BmcError {
        match self {
            HttpError::Transport { .. } => BmcError::Transport(self.to_string()),
            HttpError::Status { .. } | HttpError::Decode { .. } => {
                BmcError::Protocol(self.to_string())
            }
        }
    }
}

pub fn preview_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }

    let mut out = String::new();
    let mut truncated = false;
    for (idx, ch) in trimmed.chars().enumerate() {
        if idx >= BODY_PREVIEW_LIMIT {
            truncated = true;
            break;
        }
        out.push(ch);
    }

    if truncated {
        out.push_str("...");
    }

    out
}

pub async fn parse_json_response(resp: reqwest::Response) -> Result<Value, HttpError> {
    let status = resp.status();
    let url = resp.url().to_string();
    let body = resp
        .text()
        .await
        .map_err(|err| HttpError::from_reqwest(err, url.clone()))?;

    if !status.is_success() {
        let preview = preview_body(&body);
        return Err(HttpError::Status {
            status: status.as_u16(),
            url,
            body: preview,
        });
    }

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str::<Value>(&body).map_err(|err| HttpError::Decode {
        status: status.as_u16(),
        url,
        message: format!("{err} | body={}", preview_body(&body)),
    })
}

pub async fn ensure_success(resp: reqwest::Response) -> Result<(), HttpError> {
    let status = resp.status();
    let url = resp.url().to_string();

    if status.is_success() {
        return Ok(());
    }

    let body = resp
        .text()
        .await
        .map_err(|err| HttpError::from_reqwest(err, url.clone()))?;
    Err(HttpError::Status {
        status: status.as_u16(),
        url,
        body: preview_body(&body),
    })
}

pub fn build_client(timeout_ms: u64, insecure_tls: bool) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .danger_accept_invalid_certs(insecure_tls)
        .build()
}
