//! Reddit gateway.
//!
//! Reads subreddit listings through the Reddit OAuth API using the
//! application-only (client credentials) grant. No user login is involved:
//! the user supplies a client id and secret for a "script" app, which are
//! read from the [`CredentialStore`] on every fetch.
//!
//! # Configuration
//!
//! ```toml
//! [reddit]
//! credentials_path = "./credentials.json"
//! timeout_secs = 16
//! packaged = false          # true caps session reuse at 5 minutes
//! # session_ttl_secs = 300
//! ```
//!
//! # Sessions
//!
//! The bearer token is reused across fetches until one of these happens:
//! the credentials on disk change, the configured TTL elapses, the token's
//! own `expires_in` passes, or the API answers `401` (which also drops it).
//!
//! # Galleries
//!
//! Gallery posts carry a `media_metadata` object keyed by media id. One URL
//! per entry is extracted in the order the payload lists them. That order
//! is whatever Reddit sends and may differ between fetches.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::collection::CollectionKey;
use crate::config::RedditConfig;
use crate::credentials::{CredentialStatus, CredentialStore, Credentials};
use crate::error::{Result, SelectionError};
use crate::gateway::{Gateway, ListingType};
use crate::models::{Item, ItemFlags};

/// Time window used for `top` listings.
const TOP_TIME_FILTER: &str = "day";

/// An authenticated API session.
#[derive(Debug, Clone)]
pub struct Session {
    access_token: String,
    credentials: Credentials,
    obtained_at: Instant,
    expires_at: Option<Instant>,
}

impl Session {
    fn usable_for(&self, creds: &Credentials, ttl: Option<Duration>, now: Instant) -> bool {
        if &self.credentials != creds {
            return false;
        }
        if let Some(ttl) = ttl {
            if now.duration_since(self.obtained_at) >= ttl {
                return false;
            }
        }
        match self.expires_at {
            Some(expires_at) => now < expires_at,
            None => true,
        }
    }
}

/// Production [`Gateway`] backed by the Reddit OAuth API.
pub struct RedditGateway {
    client: reqwest::Client,
    auth_url: String,
    api_url: String,
    credentials: CredentialStore,
    session_ttl: Option<Duration>,
    session: Mutex<Option<Session>>,
}

impl RedditGateway {
    pub fn new(config: &RedditConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            auth_url: config.auth_url.clone(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            credentials: CredentialStore::new(&config.credentials_path),
            session_ttl: config.session_ttl(),
            session: Mutex::new(None),
        })
    }

    /// Exchange application credentials for a bearer token.
    pub async fn authenticate(&self, creds: &Credentials) -> Result<Session> {
        if !creds.is_complete() {
            let status = CredentialStatus::from(creds);
            return Err(SelectionError::Auth(format!(
                "Reddit API credentials are incomplete (client_id present: {}, client_secret present: {})",
                status.client_id_present, status.client_secret_present
            )));
        }

        let resp = self
            .client
            .post(&self.auth_url)
            .basic_auth(&creds.client_id, Some(&creds.client_secret))
            .header(reqwest::header::USER_AGENT, &creds.user_agent)
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| SelectionError::SourceUnavailable(format!("token request failed: {}", e)))?;

        let status = resp.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(SelectionError::Auth(format!(
                "Reddit rejected the credentials ({})",
                status
            )));
        }
        if !status.is_success() {
            return Err(SelectionError::SourceUnavailable(format!(
                "token endpoint returned {}",
                status
            )));
        }

        let token: TokenResponse = resp.json().await.map_err(|e| {
            SelectionError::SourceUnavailable(format!("invalid token response: {}", e))
        })?;
        let access_token = match (token.access_token, token.error) {
            (Some(t), _) if !t.is_empty() => t,
            (_, Some(err)) => {
                return Err(SelectionError::Auth(format!("token request refused: {}", err)))
            }
            _ => {
                return Err(SelectionError::Auth(
                    "token response carried no access token".to_string(),
                ))
            }
        };

        let now = Instant::now();
        info!("obtained Reddit API token");
        Ok(Session {
            access_token,
            credentials: creds.clone(),
            obtained_at: now,
            expires_at: token
                .expires_in
                .map(|secs| now + Duration::from_secs(secs)),
        })
    }

    /// Current bearer token, authenticating when no reusable session exists.
    async fn bearer_token(&self, creds: &Credentials) -> Result<String> {
        {
            let guard = self.session.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(session) = guard.as_ref() {
                if session.usable_for(creds, self.session_ttl, Instant::now()) {
                    debug!("reusing Reddit API session");
                    return Ok(session.access_token.clone());
                }
            }
        }

        let session = self.authenticate(creds).await?;
        let token = session.access_token.clone();
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(session);
        Ok(token)
    }

    fn load_credentials(&self) -> Result<Credentials> {
        self.credentials
            .load()
            .map_err(|e| SelectionError::Auth(format!("{:#}", e)))
    }
}

#[async_trait]
impl Gateway for RedditGateway {
    async fn fetch_listing(
        &self,
        key: &CollectionKey,
        listing: ListingType,
        limit: u32,
    ) -> Result<Vec<Item>> {
        let creds = self.load_credentials()?;
        let token = self.bearer_token(&creds).await?;

        let url = format!("{}/r/{}/{}", self.api_url, key, listing);
        let mut query: Vec<(&str, String)> = vec![
            ("limit", limit.to_string()),
            ("raw_json", "1".to_string()),
        ];
        if listing == ListingType::Top {
            query.push(("t", TOP_TIME_FILTER.to_string()));
        }

        let resp = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .header(reqwest::header::USER_AGENT, &creds.user_agent)
            .query(&query)
            .send()
            .await
            .map_err(|e| {
                SelectionError::SourceUnavailable(format!("r/{} {}: {}", key, listing, e))
            })?;

        let status = resp.status();
        if status.as_u16() == 401 {
            warn!(collection = %key, "Reddit API token rejected; dropping session");
            self.invalidate_session();
            return Err(SelectionError::Auth(
                "Reddit API token was rejected".to_string(),
            ));
        }
        if !status.is_success() {
            return Err(SelectionError::SourceUnavailable(format!(
                "r/{} {} returned {}",
                key, listing, status
            )));
        }

        let body: ListingResponse = resp.json().await.map_err(|e| {
            SelectionError::SourceUnavailable(format!("r/{} {}: invalid listing: {}", key, listing, e))
        })?;

        let items: Vec<Item> = body
            .data
            .children
            .into_iter()
            .map(|child| child.data.into_item())
            .collect();
        debug!(collection = %key, %listing, count = items.len(), "fetched listing");
        Ok(items)
    }

    fn invalidate_session(&self) {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

// ============ Wire types ============

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ListingResponse {
    data: ListingData,
}

#[derive(Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<ListingChild>,
}

#[derive(Deserialize)]
struct ListingChild {
    data: RawPost,
}

/// A post as the listing endpoint returns it. Reddit omits or nulls many
/// fields depending on post type, so everything is optional.
#[derive(Deserialize, Default)]
#[serde(default)]
struct RawPost {
    id: Option<String>,
    title: Option<String>,
    url: Option<String>,
    permalink: Option<String>,
    stickied: Option<bool>,
    is_self: Option<bool>,
    over_18: Option<bool>,
    is_gallery: Option<bool>,
    media_metadata: Option<Map<String, Value>>,
    created_utc: Option<f64>,
    author: Option<String>,
    subreddit: Option<String>,
}

impl RawPost {
    fn into_item(self) -> Item {
        let is_gallery = self.is_gallery.unwrap_or(false);
        let gallery_images = match (&self.media_metadata, is_gallery) {
            (Some(meta), true) => gallery_urls(meta),
            _ => Vec::new(),
        };
        let created_at = self
            .created_utc
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs as i64, 0))
            .unwrap_or_default();

        Item {
            id: self.id.unwrap_or_default(),
            title: self.title.unwrap_or_default(),
            url: self.url.unwrap_or_default(),
            permalink: self.permalink.unwrap_or_default(),
            flags: ItemFlags {
                stickied: self.stickied.unwrap_or(false),
                is_self: self.is_self.unwrap_or(false),
                over_18: self.over_18.unwrap_or(false),
                is_gallery,
            },
            gallery_images,
            created_at,
            author: self.author.unwrap_or_default(),
            subreddit: self.subreddit.unwrap_or_default(),
        }
    }
}

/// One representative URL per gallery media entry, in payload order.
///
/// Uses the full-size source (`s`): the still image URL, falling back to
/// the animated variants. Entries without a usable source are skipped.
fn gallery_urls(media_metadata: &Map<String, Value>) -> Vec<String> {
    media_metadata
        .values()
        .filter_map(|entry| {
            if entry.get("status").and_then(Value::as_str) == Some("failed") {
                return None;
            }
            let source = entry.get("s")?;
            ["u", "gif", "mp4"]
                .iter()
                .find_map(|k| source.get(*k).and_then(Value::as_str))
                .map(str::to_string)
        })
        .collect()
}
