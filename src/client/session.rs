use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::ledger::Store;
use crate::prompt;

/// The opaque header pair the API uses to identify a logged-in session.
pub struct Session {
    pub sid: String,
    pub uid: String,
}

#[derive(Deserialize)]
struct LoginResponse {
    sid: String,
    uid: String,
}

impl Session {
    /// Resolve session credentials, in order of precedence: environment
    /// variables, the pair cached from a previous login, and finally a
    /// one-time interactive login whose result is cached for future runs.
    pub async fn resolve(store: &Store, base_url: &str) -> Result<Self> {
        let sid = dotenv::var("LEPRA_SID").ok().filter(|v| !v.is_empty());
        let uid = dotenv::var("LEPRA_UID").ok().filter(|v| !v.is_empty());
        if let (Some(sid), Some(uid)) = (sid, uid) {
            return Ok(Self { sid, uid });
        }

        if let Some((sid, uid)) = store.cached_session().await? {
            return Ok(Self { sid, uid });
        }

        let username = prompt::required("Your leprosorium.ru login")?;
        let password = prompt::password("Your leprosorium.ru password")?;

        let client = reqwest::Client::new();
        let response = client
            .post(format!("{}auth/login/", base_url))
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await
            .context("Login request failed")?
            .error_for_status()
            .context("Credential exchange failed")?;
        let body: LoginResponse = response
            .json()
            .await
            .context("Failed to parse login response")?;

        store.store_session(&body.sid, &body.uid).await?;
        info!("session cached for future runs");

        Ok(Self {
            sid: body.sid,
            uid: body.uid,
        })
    }
}
