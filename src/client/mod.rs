pub mod session;

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::config::AppConfig;
use crate::types::{Item, ItemKind};
use session::Session;

const SID_HEADER: &str = "X-Futuware-SID";
const UID_HEADER: &str = "X-Futuware-UID";

/// Why a single vote call did not succeed. `Rejected` carries the API's
/// structured error codes so the queue can tell a permanently disallowed
/// item from a passing failure.
#[derive(Debug, Error)]
pub enum VoteError {
    #[error("vote rejected with status {status}, codes {codes:?}")]
    Rejected { status: u16, codes: Vec<String> },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl VoteError {
    pub fn codes(&self) -> &[String] {
        match self {
            VoteError::Rejected { codes, .. } => codes,
            VoteError::Transport(_) => &[],
        }
    }
}

/// The one remote call the queue depends on. Split out as a trait so the
/// queue can run against a recording stub in tests.
#[async_trait]
pub trait Voter: Send + Sync {
    async fn apply_vote(&self, kind: ItemKind, id: u64, vote: i8) -> Result<(), VoteError>;
}

/// Owning account identity, from `my/mini/`.
#[derive(Debug, Deserialize)]
pub struct Owner {
    pub id: u64,
    pub login: String,
}

/// Target profile, from `users/{name}/info/`.
#[derive(Debug, Deserialize)]
pub struct Profile {
    pub user_info: UserInfo,
    #[serde(default)]
    pub posts_count: u64,
    #[serde(default)]
    pub comments_count: u64,
}

#[derive(Debug, Deserialize)]
pub struct UserInfo {
    pub id: u64,
    pub login: String,
}

/// One page of a listing endpoint. The API wraps the items in a field
/// named after the category, so both are declared and the caller picks.
#[derive(Debug, Default, Deserialize)]
struct PageResponse {
    #[serde(default)]
    posts: Vec<Item>,
    #[serde(default)]
    comments: Vec<Item>,
}

impl PageResponse {
    fn take(self, kind: ItemKind) -> Vec<Item> {
        match kind {
            ItemKind::Post => self.posts,
            ItemKind::Comment => self.comments,
        }
    }
}

/// Error envelope the API returns on a failed vote:
/// `{"errors": [{"description": {"code": "voting_disabled", ...}}]}`.
#[derive(Debug, Default, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    description: Option<ErrorDescription>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorDescription {
    #[serde(default)]
    code: String,
}

impl ErrorResponse {
    fn codes(self) -> Vec<String> {
        self.errors
            .into_iter()
            .filter_map(|e| e.description)
            .map(|d| d.code)
            .filter(|c| !c.is_empty())
            .collect()
    }
}

#[derive(Clone)]
pub struct LepraClient {
    client: reqwest::Client,
    base_url: String,
    per_page: usize,
}

impl LepraClient {
    pub fn new(config: &AppConfig, session: &Session) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            SID_HEADER,
            HeaderValue::from_str(&session.sid).context("Invalid session id value")?,
        );
        headers.insert(
            UID_HEADER,
            HeaderValue::from_str(&session.uid).context("Invalid session user id value")?,
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("Mozilla/5.0"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(15))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            per_page: config.per_page,
        })
    }

    /// Verify the session and identify the owning account.
    pub async fn check_auth(&self) -> Result<Owner> {
        let response = self
            .client
            .get(format!("{}my/mini/", self.base_url))
            .send()
            .await
            .context("Auth check request failed")?
            .error_for_status()
            .context("Session rejected, log in again or set LEPRA_SID/LEPRA_UID")?;
        response.json().await.context("Failed to parse auth response")
    }

    /// Load the target profile. `None` means the user does not exist.
    pub async fn user_profile(&self, username: &str) -> Result<Option<Profile>> {
        let response = self
            .client
            .get(format!("{}users/{}/info/", self.base_url, username))
            .send()
            .await
            .context("Profile request failed")?;
        if !response.status().is_success() {
            debug!(username, status = %response.status(), "profile lookup failed");
            return Ok(None);
        }
        let profile = response
            .json()
            .await
            .context("Failed to parse profile response")?;
        Ok(Some(profile))
    }

    /// Walk the paginated listing for one category until a short page
    /// (end of data) or `limit` items. Progress is shown on a spinner.
    pub async fn user_items(
        &self,
        kind: ItemKind,
        username: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Item>> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
        spinner.enable_steady_tick(Duration::from_millis(120));

        let url = format!("{}users/{}/{}/", self.base_url, username, kind.endpoint());
        let mut items = Vec::new();
        let mut page = 1usize;
        loop {
            spinner.set_message(format!("page {}", page));
            let response = self
                .client
                .get(&url)
                .query(&[("page", page), ("per_page", self.per_page)])
                .send()
                .await
                .with_context(|| format!("Failed to fetch {} page {}", kind.endpoint(), page))?
                .error_for_status()
                .with_context(|| format!("Listing {} failed", kind.endpoint()))?;
            let body: PageResponse = response
                .json()
                .await
                .context("Failed to parse listing response")?;

            let batch = body.take(kind);
            let batch_len = batch.len();
            items.extend(batch);

            if let Some(limit) = limit {
                if items.len() >= limit {
                    items.truncate(limit);
                    break;
                }
            }
            if batch_len < self.per_page {
                break;
            }
            page += 1;
        }

        spinner.finish_with_message(format!("{} {} loaded", items.len(), kind.plural()));
        Ok(items)
    }
}

#[async_trait]
impl Voter for LepraClient {
    async fn apply_vote(&self, kind: ItemKind, id: u64, vote: i8) -> Result<(), VoteError> {
        let url = format!("{}{}/{}/vote/", self.base_url, kind.endpoint(), id);
        let response = self
            .client
            .post(url)
            .json(&serde_json::json!({ "vote": vote }))
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status().as_u16();
        // Body may be empty or non-JSON on gateway errors; treat that as
        // no codes, which classifies as transient downstream.
        let codes = response
            .json::<ErrorResponse>()
            .await
            .map(ErrorResponse::codes)
            .unwrap_or_default();
        Err(VoteError::Rejected { status, codes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_response_picks_category_field() {
        let body: PageResponse =
            serde_json::from_str(r#"{"posts": [{"id": 1}, {"id": 2}]}"#).unwrap();
        let items = body.take(ItemKind::Post);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, 1);

        let body: PageResponse = serde_json::from_str(r#"{"comments": [{"id": 3}]}"#).unwrap();
        assert!(body.take(ItemKind::Post).is_empty());
    }

    #[test]
    fn test_error_response_code_extraction() {
        let body: ErrorResponse = serde_json::from_str(
            r#"{"errors": [
                {"description": {"code": "voting_disabled", "message": "nope"}},
                {"description": {"code": ""}},
                {}
            ]}"#,
        )
        .unwrap();
        assert_eq!(body.codes(), vec!["voting_disabled".to_string()]);
    }

    #[test]
    fn test_error_response_tolerates_empty_body() {
        let body: ErrorResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(body.codes().is_empty());
    }

    #[test]
    fn test_profile_parse() {
        let profile: Profile = serde_json::from_str(
            r#"{"user_info": {"id": 42, "login": "someone"}, "posts_count": 7, "comments_count": 1900}"#,
        )
        .unwrap();
        assert_eq!(profile.user_info.id, 42);
        assert_eq!(profile.comments_count, 1900);
    }
}
