use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use tracing::{debug, error, info};

use crate::client::{VoteError, Voter};
use crate::config::AppConfig;
use crate::ledger::FingerprintStore;
use crate::types::{Action, Item, ItemKind};

/// Build the actions for one category: items that can still be voted on
/// and whose fingerprint is not already in the ledger. The ledger check
/// and the later enqueue are not atomic across concurrent runs, so this
/// is an at-least-once guard, not exactly-once.
pub async fn select_actions<S: FingerprintStore>(
    kind: ItemKind,
    items: &[Item],
    vote: i8,
    ledger: &S,
) -> Result<Vec<Action>> {
    let mut actions = Vec::new();
    for item in items {
        if !item.votable() {
            continue;
        }
        let action = Action::new(kind, item.id, vote);
        if ledger.has(&action.fingerprint()).await? {
            debug!(fingerprint = %action.fingerprint(), "already recorded, skipping");
            continue;
        }
        actions.push(action);
    }
    Ok(actions)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainSummary {
    pub completed: usize,
    pub dropped: usize,
    pub retries: usize,
}

/// Single-lane vote queue. Exactly one action is in flight at any time,
/// consecutive submissions are spaced by at least `interval` (plus a
/// random jitter so successive calls do not land in lock-step), transient
/// failures go to the back of the queue forever, and permanently
/// disallowed items are dropped without a ledger write.
pub struct VoteQueue<V, S> {
    voter: Arc<V>,
    ledger: Arc<S>,
    interval: Duration,
    jitter_ms: u64,
    permanent_codes: HashSet<String>,
    pending: VecDeque<Action>,
}

impl<V: Voter, S: FingerprintStore> VoteQueue<V, S> {
    pub fn new(voter: Arc<V>, ledger: Arc<S>, config: &AppConfig) -> Self {
        Self {
            voter,
            ledger,
            interval: config.interval,
            jitter_ms: config.jitter_ms,
            permanent_codes: config.permanent_codes.clone(),
            pending: VecDeque::new(),
        }
    }

    /// Schedule one action. Callers are expected to have checked the
    /// ledger first (see `select_actions`); a duplicate enqueue within a
    /// run causes at worst one redundant vote.
    pub fn enqueue(&mut self, action: Action) {
        self.pending.push_back(action);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn is_permanent(&self, err: &VoteError) -> bool {
        err.codes().iter().any(|c| self.permanent_codes.contains(c))
    }

    /// Run until every pending action has either completed or been
    /// dropped. Only ledger I/O errors abort the drain; per-action remote
    /// failures are handled here and never propagate.
    pub async fn drain(&mut self) -> Result<DrainSummary> {
        let mut summary = DrainSummary::default();

        while let Some(action) = self.pending.pop_front() {
            let fingerprint = action.fingerprint();
            match self
                .voter
                .apply_vote(action.kind, action.id, action.vote)
                .await
            {
                Ok(()) => {
                    // The ledger reflects confirmed remote effects only,
                    // so the write happens strictly after success.
                    self.ledger.put(&fingerprint).await?;
                    info!(fingerprint = %fingerprint, "vote applied");
                    summary.completed += 1;
                }
                Err(err) if self.is_permanent(&err) => {
                    info!(fingerprint = %fingerprint, %err, "voting disallowed, dropping");
                    summary.dropped += 1;
                }
                Err(err) => {
                    error!(fingerprint = %fingerprint, %err, "vote failed, re-queued");
                    summary.retries += 1;
                    self.pending.push_back(action);
                }
            }

            if !self.pending.is_empty() {
                tokio::time::sleep(self.pause()).await;
            }
        }

        Ok(summary)
    }

    fn pause(&self) -> Duration {
        let jitter = rand::thread_rng().gen_range(0..=self.jitter_ms);
        self.interval + Duration::from_millis(jitter)
    }
}
