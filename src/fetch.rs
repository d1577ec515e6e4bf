use reqwest::blocking::Client as HttpClient;
use reqwest::header::{ACCEPT, CACHE_CONTROL, PRAGMA, USER_AGENT};
use url::Url;

use crate::model::{ThreadNode, ThreadResponse};

pub const DEFAULT_API_BASE: &str = "https://public.api.bsky.app";
pub const GET_POST_THREAD: &str = "xrpc/app.bsky.feed.getPostThread";

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid uri: a non-empty post uri is required")]
    MissingUri,
    #[error("invalid api base url: {0}")]
    BaseUrl(#[from] url::ParseError),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to fetch thread: {0}")]
    Status(String),
    #[error("decode thread response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid thread data: missing expected properties")]
    InvalidThread,
}

/// Source of reply threads. The widget only ever talks to this seam.
pub trait ThreadFetcher: Send + Sync {
    fn fetch_thread(&self, uri: &str) -> Result<ThreadNode, FetchError>;
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub base_url: Option<String>,
    pub user_agent: Option<String>,
    pub http_client: Option<HttpClient>,
}

/// Read-only AppView client for `app.bsky.feed.getPostThread`.
pub struct Client {
    http: HttpClient,
    user_agent: String,
    endpoint: Url,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self, FetchError> {
        let base = config
            .base_url
            .filter(|base| !base.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let base = if base.ends_with('/') {
            base
        } else {
            format!("{base}/")
        };
        let endpoint = Url::parse(&base)?.join(GET_POST_THREAD)?;
        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder().build()?,
        };
        let user_agent = config
            .user_agent
            .filter(|agent| !agent.trim().is_empty())
            .unwrap_or_else(|| format!("bsky-comments/{}", crate::VERSION));

        Ok(Client {
            http,
            user_agent,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn thread_url(&self, uri: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("uri", uri);
        url
    }
}

impl ThreadFetcher for Client {
    fn fetch_thread(&self, uri: &str) -> Result<ThreadNode, FetchError> {
        if uri.trim().is_empty() {
            return Err(FetchError::MissingUri);
        }

        let url = self.thread_url(uri);
        tracing::debug!(%url, "fetching post thread");
        let resp = self
            .http
            .get(url)
            .header(ACCEPT, "application/json")
            .header(CACHE_CONTROL, "no-cache, no-store")
            .header(PRAGMA, "no-cache")
            .header(USER_AGENT, &self.user_agent)
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            tracing::error!(status = %status, body = %body, "thread fetch returned an error status");
            let reason = status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.as_u16().to_string());
            return Err(FetchError::Status(reason));
        }

        let body = resp.text()?;
        let payload: ThreadResponse = serde_json::from_str(&body)?;
        match payload.thread {
            Some(thread) if thread.replies.is_some() => Ok(thread),
            _ => Err(FetchError::InvalidThread),
        }
    }
}
