//! The sync pipeline.
//!
//! Linear and retry-free: Init (bootstrap) → Unlock → FetchMetadata →
//! FetchIdentities → Reconcile → Report.  Any stage failure aborts the run
//! with the triggering error; artifacts already written stay written, there
//! is no rollback.

use anyhow::Result;
use tracing::{debug, info};
use zeroize::Zeroizing;

use bwssh_core::reconcile::{EntryAction, build_host_lookup, reconcile_identity};
use bwssh_core::{AgentError, KeyAgent, MetadataStore, StoreError};

use crate::bootstrap::{Paths, bootstrap};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Filesystem failures: directory/link bootstrap and artifact writes.
    #[error("filesystem failure: {0}")]
    Bootstrap(#[source] anyhow::Error),

    /// Status query or unlock failed (bad credential, provider error).
    #[error("vault unlock failed: {0}")]
    Unlock(#[source] StoreError),

    /// Provider error during sync or item listing.
    #[error("metadata fetch failed: {0}")]
    Metadata(#[source] StoreError),

    /// No agent reachable, or the identity query failed.
    #[error("ssh agent unavailable: {0}")]
    Agent(#[source] AgentError),
}

/// Outcome counts for one run.
///
/// `added` counts config blocks written this run; `present` counts
/// identities whose alias already had a block (their key file was still
/// refreshed).  The summary reports both; "processed" is their sum.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub added: usize,
    pub present: usize,
}

impl SyncReport {
    pub fn processed(&self) -> usize {
        self.added + self.present
    }
}

/// Run the full pipeline once.
///
/// `prompt_password` is invoked at most once, and only when the store
/// reports itself locked.
pub async fn run_sync<P>(
    store: &dyn MetadataStore,
    agent: &dyn KeyAgent,
    paths: &Paths,
    prompt_password: P,
) -> Result<SyncReport, SyncError>
where
    P: FnOnce() -> Result<Zeroizing<String>>,
{
    let mut ssh_config = bootstrap(paths).map_err(SyncError::Bootstrap)?;

    let status = store.status().await.map_err(SyncError::Unlock)?;
    let session = if status.locked {
        let password =
            prompt_password().map_err(|e| SyncError::Unlock(StoreError::Other(e)))?;
        Some(store.unlock(password).await.map_err(SyncError::Unlock)?)
    } else {
        debug!(store = store.name(), "store already unlocked");
        None
    };

    store
        .sync(session.as_ref())
        .await
        .map_err(SyncError::Metadata)?;
    let items = store
        .list_items(session.as_ref())
        .await
        .map_err(SyncError::Metadata)?;
    let lookup = build_host_lookup(&items);

    let identities = agent.list_identities().await.map_err(SyncError::Agent)?;

    let mut report = SyncReport::default();
    for identity in &identities {
        let action = reconcile_identity(identity, &lookup, &paths.keys_dir, &mut ssh_config)
            .map_err(SyncError::Bootstrap)?;
        match action {
            EntryAction::Added => report.added += 1,
            EntryAction::Present => report.present += 1,
        }
    }

    ssh_config
        .save(&paths.config_file)
        .map_err(SyncError::Bootstrap)?;

    info!(
        added = report.added,
        present = report.present,
        "sync complete"
    );
    Ok(report)
}
