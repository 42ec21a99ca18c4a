//! Blocking HTTP client for the platform API.

use std::time::Duration;

use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::api::auth::Credentials;
use crate::util::cancel::CancelToken;

/// Network, auth or API failure during collection. Always fatal for the
/// whole run: a partial cross-reference graph is unsafe.
#[derive(Debug, Error, Diagnostic)]
pub enum FetchError {
    #[error("request to {path} failed: {source}")]
    #[diagnostic(code(moor::fetch::transport))]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{path} returned {status}: {message}")]
    #[diagnostic(
        code(moor::fetch::api),
        help("Check the deployment URL and credentials, then retry the export")
    )]
    Api {
        path: String,
        status: u16,
        message: String,
    },

    #[error("invalid deployment URL: {0}")]
    #[diagnostic(code(moor::fetch::url))]
    Url(#[from] url::ParseError),

    #[error("operation cancelled")]
    #[diagnostic(code(moor::fetch::cancelled))]
    Cancelled(#[from] crate::util::cancel::Cancelled),

    #[error("unexpected response shape from {path}")]
    #[diagnostic(code(moor::fetch::shape))]
    Shape { path: String },
}

/// Read access to the platform, as much of it as the exporter needs.
///
/// `list` pages through a collection endpoint, observing the cancel
/// token between pages; `get` fetches one object.
pub trait PlatformApi: Sync {
    fn list(
        &self,
        path: &str,
        org: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<Vec<serde_json::Value>, FetchError>;
    fn get(&self, path: &str) -> Result<serde_json::Value, FetchError>;
}

#[derive(Debug, Deserialize)]
struct Page {
    items: Vec<serde_json::Value>,
    #[serde(default)]
    next_cursor: Option<String>,
}

/// The real client. One instance per run; reqwest pools connections
/// internally.
pub struct HttpPlatformApi {
    base: Url,
    credentials: Credentials,
    http: reqwest::blocking::Client,
}

impl HttpPlatformApi {
    pub fn new(deployment_url: &str, credentials: Credentials) -> Result<Self, FetchError> {
        let base = Url::parse(deployment_url)?;
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(concat!("moor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| FetchError::Transport {
                path: deployment_url.to_string(),
                source,
            })?;
        Ok(HttpPlatformApi {
            base,
            credentials,
            http,
        })
    }

    fn request(&self, path: &str, query: &[(&str, &str)]) -> Result<serde_json::Value, FetchError> {
        let mut url = self
            .base
            .join(path.trim_start_matches('/'))
            .map_err(FetchError::Url)?;
        for (k, v) in query {
            url.query_pairs_mut().append_pair(k, v);
        }

        debug!(%url, "GET");
        let response = self
            .http
            .get(url)
            .header("Authorization", self.credentials.authorization_header())
            .send()
            .map_err(|source| FetchError::Transport {
                path: path.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(FetchError::Api {
                path: path.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        response.json().map_err(|source| FetchError::Transport {
            path: path.to_string(),
            source,
        })
    }
}

impl PlatformApi for HttpPlatformApi {
    fn list(
        &self,
        path: &str,
        org: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<Vec<serde_json::Value>, FetchError> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            cancel.check()?;
            let mut query: Vec<(&str, &str)> = Vec::new();
            if let Some(org) = org {
                query.push(("org", org));
            }
            if let Some(ref c) = cursor {
                query.push(("cursor", c));
            }
            let body = self.request(path, &query)?;
            let page: Page =
                serde_json::from_value(body).map_err(|_| FetchError::Shape {
                    path: path.to_string(),
                })?;
            items.extend(page.items);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }
        debug!(path, count = items.len(), "listed");
        Ok(items)
    }

    fn get(&self, path: &str) -> Result<serde_json::Value, FetchError> {
        self.request(path, &[])
    }
}
