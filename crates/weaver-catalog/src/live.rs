//! The live catalog is the set of step ids actually installable for the
//! configured account and region. It is fetched from the platform, cached for
//! a TTL and replaced wholesale when stale.

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::error::{CatalogError, CatalogResult};

/// Default time-to-live of a live catalog snapshot
pub const DEFAULT_LIVE_CATALOG_TTL: Duration = Duration::from_secs(300);

/// Immutable set of installable step ids plus the time it was fetched
#[derive(Debug, Clone)]
pub struct LiveCatalogSnapshot {
    ids: BTreeSet<String>,
    fetched_at: Instant,
}

impl LiveCatalogSnapshot {
    /// Create a snapshot fetched now
    pub fn new(ids: impl IntoIterator<Item = String>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
            fetched_at: Instant::now(),
        }
    }

    /// Whether a step id is installable
    pub fn contains(&self, step_id: &str) -> bool {
        self.ids.contains(step_id)
    }

    /// All installable step ids
    pub fn ids(&self) -> &BTreeSet<String> {
        &self.ids
    }

    /// Number of installable step ids
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the snapshot holds no ids
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Time elapsed since the snapshot was fetched
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    /// Whether the snapshot is older than `ttl`
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.age() > ttl
    }
}

/// Source of installable step ids
#[async_trait]
pub trait LiveCatalogSource: Send + Sync + Debug {
    /// Fetch the current list of installable step ids
    async fn fetch_step_ids(&self) -> CatalogResult<Vec<String>>;
}

/// Configuration for the remote live catalog client
#[derive(Debug, Clone)]
pub struct RemoteLiveCatalogConfig {
    /// Endpoint listing installable step ids
    pub url: String,
    /// API token; without one the catalog is reported as unavailable
    pub api_token: Option<String>,
    /// Optional team scope passed as `teamId`
    pub team_id: Option<String>,
    /// Timeout in seconds for HTTP requests
    pub timeout_secs: u64,
}

impl Default for RemoteLiveCatalogConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080/api/v2/modules".to_string(),
            api_token: None,
            team_id: None,
            timeout_secs: 30,
        }
    }
}

/// Live catalog fetched over HTTP from the automation platform
#[derive(Debug, Clone)]
pub struct RemoteLiveCatalog {
    config: RemoteLiveCatalogConfig,
    client: Client,
}

impl RemoteLiveCatalog {
    /// Creates a new client with the provided configuration
    pub fn new(config: RemoteLiveCatalogConfig) -> CatalogResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CatalogError::CommunicationError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Maps an HTTP error to a CatalogError
    fn map_http_error(error: reqwest::Error) -> CatalogError {
        if error.is_timeout() {
            CatalogError::CommunicationError(format!("Request timeout: {}", error))
        } else if error.is_connect() {
            CatalogError::CommunicationError(format!("Connection error: {}", error))
        } else {
            CatalogError::CommunicationError(format!("HTTP error: {}", error))
        }
    }
}

#[async_trait]
impl LiveCatalogSource for RemoteLiveCatalog {
    #[instrument(skip(self), fields(url = %self.config.url))]
    async fn fetch_step_ids(&self) -> CatalogResult<Vec<String>> {
        let token = self
            .config
            .api_token
            .as_deref()
            .ok_or(CatalogError::MissingCredentials)?;

        let mut request = self
            .client
            .get(&self.config.url)
            .header("Authorization", format!("Token {}", token));
        if let Some(team_id) = &self.config.team_id {
            request = request.query(&[("teamId", team_id)]);
        }

        let response = request.send().await.map_err(Self::map_http_error)?;

        match response.status() {
            StatusCode::OK => {
                let body: Value = response
                    .json()
                    .await
                    .map_err(|e| CatalogError::ParseError(format!("Failed to parse response: {}", e)))?;
                let ids = extract_step_ids(&body).ok_or_else(|| {
                    CatalogError::ParseError("Live catalog response contains no step list".to_string())
                })?;
                debug!(count = ids.len(), "Fetched live catalog");
                Ok(ids)
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(CatalogError::UnexpectedResponse {
                    status: status.as_u16(),
                    body: body.chars().take(512).collect(),
                })
            }
        }
    }
}

/// Pull step ids out of the shapes the platform is known to answer with:
/// a bare array, or an object wrapping it under `modules`, `steps`, `data`
/// or `result`. Array items may be strings or objects carrying the id under
/// `id`, `module` or `name`.
fn extract_step_ids(body: &Value) -> Option<Vec<String>> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(map) => ["modules", "steps", "data", "result"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))?,
        _ => return None,
    };

    let ids = items
        .iter()
        .filter_map(|item| match item {
            Value::String(id) => Some(id.clone()),
            Value::Object(obj) => ["id", "module", "name"]
                .iter()
                .find_map(|key| obj.get(*key).and_then(Value::as_str))
                .map(str::to_string),
            _ => None,
        })
        .filter(|id| id.contains(':'))
        .collect();
    Some(ids)
}

/// TTL cache over a [`LiveCatalogSource`].
///
/// Readers receive either the cached snapshot or trigger exactly one refetch;
/// the refetch runs under the cache lock so concurrent readers wait for it
/// instead of issuing their own.
#[derive(Debug)]
pub struct LiveCatalogCache {
    source: Arc<dyn LiveCatalogSource>,
    ttl: Duration,
    current: Mutex<Option<Arc<LiveCatalogSnapshot>>>,
}

impl LiveCatalogCache {
    /// Create a cache with the given TTL
    pub fn new(source: Arc<dyn LiveCatalogSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            current: Mutex::new(None),
        }
    }

    /// Create a cache with the default TTL
    pub fn with_default_ttl(source: Arc<dyn LiveCatalogSource>) -> Self {
        Self::new(source, DEFAULT_LIVE_CATALOG_TTL)
    }

    /// Configured TTL
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached snapshot, refetching it when missing or expired.
    ///
    /// Fetch failures are logged and reported as `None` ("unknown"), never as
    /// errors. A failed refetch drops the stale snapshot.
    pub async fn get_or_refresh(&self) -> Option<Arc<LiveCatalogSnapshot>> {
        let mut current = self.current.lock().await;

        if let Some(snapshot) = current.as_ref() {
            if !snapshot.is_expired(self.ttl) {
                return Some(Arc::clone(snapshot));
            }
            debug!(age_secs = snapshot.age().as_secs(), "Live catalog snapshot expired");
        }

        match self.source.fetch_step_ids().await {
            Ok(ids) => {
                let snapshot = Arc::new(LiveCatalogSnapshot::new(ids));
                info!(steps = snapshot.len(), "Refreshed live catalog snapshot");
                *current = Some(Arc::clone(&snapshot));
                Some(snapshot)
            }
            Err(CatalogError::MissingCredentials) => {
                debug!("No live catalog credentials configured, skipping live check");
                *current = None;
                None
            }
            Err(e) => {
                warn!(error = %e, code = e.error_code(), "Live catalog unavailable");
                *current = None;
                None
            }
        }
    }

    /// Drop the cached snapshot so the next read refetches
    pub async fn invalidate(&self) {
        *self.current.lock().await = None;
    }
}
