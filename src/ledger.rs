use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use cnidarium::{StateDelta, StateWrite, Storage};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// Key prefixes (no trailing slashes — cnidarium convention)
const VOTE_PREFIX: &str = "vote";
const SESSION_PREFIX: &str = "session";

fn session_key(name: &str) -> String {
    format!("{}/{}", SESSION_PREFIX, name)
}

/// What a successful vote leaves behind. Consumers only ever test for
/// presence; the timestamp is kept for manual inspection of the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRecord {
    pub fingerprint: String,
    pub voted_at: i64,
}

/// Read/write boundary the queue needs from the ledger. Kept narrow on
/// purpose: no deletion, no scans, no transactions.
#[async_trait]
pub trait FingerprintStore: Send + Sync {
    /// Whether a vote for this fingerprint has already been recorded.
    async fn has(&self, fingerprint: &str) -> Result<bool>;
    /// Record a confirmed vote. Called strictly after the remote call
    /// succeeded.
    async fn put(&self, fingerprint: &str) -> Result<()>;
}

/// Durable local store shared by the session cache and the per-target
/// vote ledgers. Opened once per run.
pub struct Store {
    storage: Storage,
}

impl Store {
    pub async fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let prefixes = vec![VOTE_PREFIX.to_string(), SESSION_PREFIX.to_string()];
        let storage = Storage::load(data_dir.to_path_buf(), prefixes)
            .await
            .context("Failed to init cnidarium storage")?;
        Ok(Self { storage })
    }

    /// Session headers cached from a previous interactive login, if any.
    pub async fn cached_session(&self) -> Result<Option<(String, String)>> {
        let snapshot = self.storage.latest_snapshot();
        use cnidarium::StateRead;
        let sid = snapshot.get_raw(&session_key("sid")).await?;
        let uid = snapshot.get_raw(&session_key("uid")).await?;
        match (sid, uid) {
            (Some(sid), Some(uid)) => Ok(Some((
                String::from_utf8_lossy(&sid).into_owned(),
                String::from_utf8_lossy(&uid).into_owned(),
            ))),
            _ => Ok(None),
        }
    }

    pub async fn store_session(&self, sid: &str, uid: &str) -> Result<()> {
        let snapshot = self.storage.latest_snapshot();
        let mut delta = StateDelta::new(snapshot);
        delta.put_raw(session_key("sid"), sid.as_bytes().to_vec());
        delta.put_raw(session_key("uid"), uid.as_bytes().to_vec());
        self.storage.commit(delta).await?;
        debug!("session cached");
        Ok(())
    }

    /// Vote ledger scoped to one (owner account, target profile) pair.
    /// Ledgers for different pairs never see each other's entries.
    pub fn ledger(&self, owner_id: u64, target_id: u64) -> Ledger {
        Ledger {
            storage: self.storage.clone(),
            namespace: format!("{}::{}", owner_id, target_id),
        }
    }
}

pub struct Ledger {
    storage: Storage,
    namespace: String,
}

impl Ledger {
    fn vote_key(&self, fingerprint: &str) -> String {
        format!("{}/{}/{}", VOTE_PREFIX, self.namespace, fingerprint)
    }

    /// Number of fingerprints recorded for this (owner, target) pair.
    pub async fn count(&self) -> Result<usize> {
        let snapshot = self.storage.latest_snapshot();
        use cnidarium::StateRead;
        let prefix = format!("{}/{}/", VOTE_PREFIX, self.namespace);
        let mut stream = snapshot.prefix_raw(&prefix);
        let mut count = 0usize;
        while let Some(entry) = stream.next().await {
            match entry {
                Ok(_) => count += 1,
                Err(e) => warn!("Error reading ledger stream: {}", e),
            }
        }
        Ok(count)
    }
}

#[async_trait]
impl FingerprintStore for Ledger {
    async fn has(&self, fingerprint: &str) -> Result<bool> {
        let snapshot = self.storage.latest_snapshot();
        use cnidarium::StateRead;
        Ok(snapshot.get_raw(&self.vote_key(fingerprint)).await?.is_some())
    }

    async fn put(&self, fingerprint: &str) -> Result<()> {
        let record = VoteRecord {
            fingerprint: fingerprint.to_string(),
            voted_at: chrono::Utc::now().timestamp(),
        };
        let snapshot = self.storage.latest_snapshot();
        let mut delta = StateDelta::new(snapshot);
        delta.put_raw(
            self.vote_key(fingerprint),
            serde_json::to_vec(&record).context("serialize vote record")?,
        );
        self.storage.commit(delta).await?;
        debug!(fingerprint, namespace = %self.namespace, "fingerprint recorded");
        Ok(())
    }
}

/// In-memory fingerprint store for queue and filter tests.
#[cfg(test)]
pub(crate) struct MemoryStore {
    entries: std::sync::Mutex<std::collections::HashMap<String, usize>>,
}

#[cfg(test)]
impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self {
            entries: std::sync::Mutex::new(std::collections::HashMap::new()),
        }
    }

    /// Pre-seed a fingerprint, as if recorded by a previous run.
    pub(crate) fn seed(&self, fingerprint: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(fingerprint.to_string(), 1);
    }

    /// How many times `put` was called for this fingerprint.
    pub(crate) fn writes(&self, fingerprint: &str) -> usize {
        self.entries
            .lock()
            .unwrap()
            .get(fingerprint)
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
#[async_trait]
impl FingerprintStore for MemoryStore {
    async fn has(&self, fingerprint: &str) -> Result<bool> {
        Ok(self.entries.lock().unwrap().contains_key(fingerprint))
    }

    async fn put(&self, fingerprint: &str) -> Result<()> {
        *self
            .entries
            .lock()
            .unwrap()
            .entry(fingerprint.to_string())
            .or_insert(0) += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ledger_put_then_has() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).await.unwrap();
        let ledger = store.ledger(10, 20);

        assert!(!ledger.has("p-1").await.unwrap());
        ledger.put("p-1").await.unwrap();
        assert!(ledger.has("p-1").await.unwrap());
        assert_eq!(ledger.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_ledger_namespaces_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).await.unwrap();

        let a = store.ledger(10, 20);
        let b = store.ledger(10, 21);
        a.put("c-5").await.unwrap();

        assert!(a.has("c-5").await.unwrap());
        assert!(!b.has("c-5").await.unwrap());
        assert_eq!(b.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_session_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).await.unwrap();

        assert!(store.cached_session().await.unwrap().is_none());
        store.store_session("sid-value", "uid-value").await.unwrap();
        let (sid, uid) = store.cached_session().await.unwrap().unwrap();
        assert_eq!(sid, "sid-value");
        assert_eq!(uid, "uid-value");
    }

    #[tokio::test]
    async fn test_memory_store_counts_writes() {
        let store = MemoryStore::new();
        assert!(!store.has("p-9").await.unwrap());
        store.put("p-9").await.unwrap();
        store.put("p-9").await.unwrap();
        assert!(store.has("p-9").await.unwrap());
        assert_eq!(store.writes("p-9"), 2);
    }
}
