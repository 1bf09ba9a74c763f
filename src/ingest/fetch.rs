// src/ingest/fetch.rs
//! Bounded outbound GET: one deadline covering connect, headers and body.

use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode, Url};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with HTTP {status}")]
    UpstreamStatus { url: String, status: StatusCode },
}

impl FetchError {
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Timeout { .. } => "timeout",
            FetchError::Transport { .. } => "transport",
            FetchError::UpstreamStatus { .. } => "status",
        }
    }

    /// True when the upstream answered, just not with 2xx.
    pub fn reached_server(&self) -> bool {
        matches!(self, FetchError::UpstreamStatus { .. })
    }
}

/// Per-call request options.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: HeaderName, value: &'static str) -> Self {
        self.headers.insert(name, HeaderValue::from_static(value));
        self
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: StatusCode,
    pub body: String,
}

/// Holds two clients: a normal one and one that skips certificate checks.
/// The relaxed client is only ever used for hosts listed in `insecure_hosts`.
#[derive(Clone)]
pub struct BoundedFetcher {
    client: Client,
    insecure: Client,
    insecure_hosts: Vec<String>,
}

impl BoundedFetcher {
    pub fn new(insecure_hosts: Vec<String>) -> Result<Self, reqwest::Error> {
        let ua = concat!("quake-relay/", env!("CARGO_PKG_VERSION"));
        let client = Client::builder().user_agent(ua).build()?;
        let insecure = Client::builder()
            .user_agent(ua)
            .danger_accept_invalid_certs(true)
            .build()?;
        let insecure_hosts = insecure_hosts
            .into_iter()
            .map(|h| h.trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        Ok(Self {
            client,
            insecure,
            insecure_hosts,
        })
    }

    fn is_insecure_host(&self, url: &str) -> bool {
        let Some(host) = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        else {
            return false;
        };
        self.insecure_hosts.iter().any(|h| *h == host)
    }

    fn client_for(&self, url: &str) -> &Client {
        if self.is_insecure_host(url) {
            &self.insecure
        } else {
            &self.client
        }
    }

    /// GET `url`, failing with [`FetchError::Timeout`] once `timeout` elapses.
    ///
    /// The in-flight request future is dropped on timeout, which closes its
    /// connection. No retries happen here.
    pub async fn fetch(
        &self,
        url: &str,
        opts: &FetchOptions,
        timeout: Duration,
    ) -> Result<FetchedPage, FetchError> {
        let req = self
            .client_for(url)
            .get(url)
            .headers(opts.headers.clone())
            .query(&opts.query);

        let t0 = Instant::now();
        let work = async {
            let resp = req.send().await.map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;
            let status = resp.status();
            if !status.is_success() {
                return Err(FetchError::UpstreamStatus {
                    url: url.to_string(),
                    status,
                });
            }
            let body = resp.text().await.map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;
            Ok::<_, FetchError>(FetchedPage { status, body })
        };

        let out = match tokio::time::timeout(timeout, work).await {
            Ok(res) => res,
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        };
        tracing::debug!(
            url,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            ok = out.is_ok(),
            "fetch finished"
        );
        out
    }
}
