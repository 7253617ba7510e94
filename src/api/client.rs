use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::types::{
    ErrorBody, LastSyncResponse, MoveFeed, ReadFilterSetting, RenameFeed, UnreadCountResponse,
    WireDigest, WireEntry,
};
use crate::sync::{
    CollectionKind, Item, PageRequest, ReadFilter, ReadTicket, Scope, SidebarSnapshot,
};

const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024; // 10MB
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors returned by the aggregation server client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Request timed out")]
    Timeout,
    /// Non-2xx response, with the server's `error` message when it sent one
    #[error("HTTP error: status {status}{}", detail(.message))]
    Status {
        status: u16,
        message: Option<String>,
    },
    #[error("Response too large")]
    ResponseTooLarge,
    #[error("Invalid response: {0}")]
    Decode(String),
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),
    #[error("Not supported for this view: {0}")]
    Unsupported(&'static str),
    /// The background task running the request panicked.
    #[error("Request task panicked: {0}")]
    TaskPanicked(String),
}

fn detail(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(" ({})", m))
        .unwrap_or_default()
}

impl ApiError {
    /// Short text for the status bar.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Status {
                message: Some(m), ..
            } => m.clone(),
            ApiError::Timeout => "Server did not respond in time".to_string(),
            ApiError::Network(_) => "Cannot reach server".to_string(),
            other => other.to_string(),
        }
    }
}

fn create_redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= 3 {
            return attempt.error("Too many redirects (max 3)");
        }

        // mark_as_read_all answers with a redirect to the page it came from;
        // anything leaving the server is refused.
        let same_origin = attempt
            .previous()
            .first()
            .map(|first| first.origin() == attempt.url().origin())
            .unwrap_or(true);
        if !same_origin {
            return attempt.error("Cross-origin redirect refused");
        }

        tracing::debug!(
            to = %attempt.url(),
            hop = attempt.previous().len(),
            "Following redirect"
        );
        attempt.follow()
    })
}

/// HTTP client for the aggregation server. Cheap to clone; spawned tasks
/// each take their own copy.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let mut base =
            Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ApiError::InvalidUrl(format!(
                "{}: scheme must be http or https",
                base_url
            )));
        }
        // Relative joins must land under the base path
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .redirect(create_redirect_policy())
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base,
            timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", path, e)))
    }

    /// URL of the collection page described by `request`.
    pub fn page_url(&self, request: &PageRequest) -> Result<Url, ApiError> {
        let selection = request.selection;
        let all = selection.filter == ReadFilter::All;

        let path = match selection.scope {
            Scope::Daily => "api/daily/feed".to_string(),
            Scope::Global => "api/feeditems".to_string(),
            Scope::Category(cat) => format!("api/feeditems/{}", cat),
            Scope::Feed { category, feed } => format!("api/feeditems/{}/{}", category, feed),
        };
        let path = if all && selection.scope != Scope::Daily {
            format!("{}/all", path)
        } else {
            path
        };

        let mut url = self.endpoint(&path)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &request.limit.to_string());
            if selection.scope == Scope::Daily && !all {
                query.append_pair("unread", "true");
            }
            if let Some(cursor) = request.cursor {
                query.append_pair("last_item_id", &cursor.to_string());
            }
        }
        Ok(url)
    }

    pub async fn fetch_page(&self, request: &PageRequest) -> Result<Vec<Item>, ApiError> {
        let url = self.page_url(request)?;
        let items = match request.selection.kind() {
            CollectionKind::Entries => self
                .get_json::<Vec<WireEntry>>(url)
                .await?
                .into_iter()
                .map(Item::from)
                .collect(),
            CollectionKind::Digest => self
                .get_json::<Vec<WireDigest>>(url)
                .await?
                .into_iter()
                .map(Item::from)
                .collect(),
        };
        Ok(items)
    }

    pub async fn mark_read(&self, ticket: &ReadTicket) -> Result<(), ApiError> {
        let path = match ticket.kind {
            CollectionKind::Entries => format!("mark_as_read/{}", ticket.id),
            CollectionKind::Digest => format!("mark_as_read/daily/{}", ticket.id),
        };
        let url = self.endpoint(&path)?;
        self.send(self.http.post(url)).await.map(drop)
    }

    /// Mark every item in `scope` read on the server.
    pub async fn mark_all_read(&self, scope: Scope) -> Result<(), ApiError> {
        let path = match scope {
            Scope::Global => "mark_as_read_all".to_string(),
            Scope::Category(cat) => format!("category/{}/mark_as_read_all", cat),
            Scope::Feed { category, feed } => {
                format!("category/{}/feed/{}/mark_as_read_all", category, feed)
            }
            Scope::Daily => return Err(ApiError::Unsupported("daily digest")),
        };
        let url = self.endpoint(&path)?;
        self.send(self.http.post(url)).await.map(drop)
    }

    pub async fn sidebar_snapshot(&self) -> Result<SidebarSnapshot, ApiError> {
        let url = self.endpoint("api/categories_and_blogs")?;
        self.get_json(url).await
    }

    /// Human-readable time of the server's last feed sync.
    pub async fn last_sync(&self) -> Result<String, ApiError> {
        let url = self.endpoint("api/last_sync")?;
        let body: LastSyncResponse = self.get_json(url).await?;
        Ok(body.last_sync.unwrap_or_else(|| "Never".to_string()))
    }

    pub async fn unread_count(&self) -> Result<i64, ApiError> {
        let url = self.endpoint("api/unread-count")?;
        let body: UnreadCountResponse = self.get_json(url).await?;
        Ok(body.unread_count)
    }

    pub async fn save_read_filter(&self, filter: ReadFilter) -> Result<(), ApiError> {
        let body = ReadFilterSetting {
            unread: filter == ReadFilter::Unread,
        };
        self.send_json(Method::POST, "api/settings", &body).await
    }

    pub async fn rename_feed(&self, feed_id: i64, title: &str) -> Result<(), ApiError> {
        self.send_json(
            Method::PUT,
            &format!("api/feeds/{}", feed_id),
            &RenameFeed { title },
        )
        .await
    }

    pub async fn delete_feed(&self, feed_id: i64) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("api/feeds/{}", feed_id))?;
        self.send(self.http.delete(url)).await.map(drop)
    }

    pub async fn move_feed(&self, feed_id: i64, category_id: i64) -> Result<(), ApiError> {
        self.send_json(
            Method::PUT,
            &format!("api/feeds/{}/category", feed_id),
            &MoveFeed { category_id },
        )
        .await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let response = self.send(self.http.get(url)).await?;
        let bytes = read_limited_bytes(response, MAX_RESPONSE_SIZE).await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn send_json<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<(), ApiError> {
        let url = self.endpoint(path)?;
        let payload = serde_json::to_vec(body).map_err(|e| ApiError::Decode(e.to_string()))?;
        let request = self
            .http
            .request(method, url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload);
        self.send(request).await.map(drop)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| ApiError::Timeout)??;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = error_message(response).await;
        tracing::debug!(status = status.as_u16(), message = ?message, "Server returned error");
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

/// Best-effort extraction of `{"error": ...}` from an error response.
async fn error_message(response: reqwest::Response) -> Option<String> {
    let bytes = read_limited_bytes(response, 64 * 1024).await.ok()?;
    serde_json::from_slice::<ErrorBody>(&bytes)
        .ok()
        .and_then(ErrorBody::into_message)
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, ApiError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(ApiError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ApiError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}
