mod client;
mod config;
mod ledger;
mod prompt;
mod queue;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, Level};

use client::session::Session;
use client::LepraClient;
use config::AppConfig;
use ledger::Store;
use queue::VoteQueue;
use types::ItemKind;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    let _ = dotenv::dotenv();
    let config = AppConfig::from_env();

    let store = Store::open(&config.data_dir).await?;
    info!("Ledger store initialized at {:?}", config.data_dir);

    let session = Session::resolve(&store, &config.base_url).await?;
    let client = Arc::new(LepraClient::new(&config, &session)?);

    let owner = client.check_auth().await?;
    println!("\nRunning as {}\n", owner.login);

    let username = prompt::required("Username")?;
    let profile = client
        .user_profile(&username)
        .await?
        .with_context(|| format!("user {} not found", username))?;

    // One ledger namespace per (owner, target) pair, so switching targets
    // never sees stale entries.
    let ledger = Arc::new(store.ledger(owner.id, profile.user_info.id));
    let recorded = ledger.count().await?;
    if recorded > 0 {
        info!(recorded, target = %profile.user_info.login, "votes already recorded for this target");
    }

    let mut queue = VoteQueue::new(client.clone(), ledger.clone(), &config);

    for kind in [ItemKind::Post, ItemKind::Comment] {
        let total = match kind {
            ItemKind::Post => profile.posts_count,
            ItemKind::Comment => profile.comments_count,
        };
        let wanted = prompt::confirm(&format!(
            "\"{}\" has {} {}, vote them down?",
            profile.user_info.login,
            total,
            kind.plural()
        ))?;
        if !wanted {
            continue;
        }
        let limit =
            prompt::optional_count(&format!("How many {}? (blank for all)", kind.plural()))?;

        let items = client.user_items(kind, &username, limit).await?;
        let actions = queue::select_actions(kind, &items, config.vote, ledger.as_ref()).await?;
        info!(
            kind = kind.plural(),
            fetched = items.len(),
            selected = actions.len(),
            "items selected for voting"
        );
        for action in actions {
            queue.enqueue(action);
        }
    }

    if queue.is_empty() {
        info!("nothing to do");
        return Ok(());
    }

    info!(queued = queue.len(), "starting drain");
    let summary = queue.drain().await?;
    info!(
        completed = summary.completed,
        dropped = summary.dropped,
        retries = summary.retries,
        "queue drained"
    );

    Ok(())
}
