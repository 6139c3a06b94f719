//! Metadata lookup and per-identity reconciliation.
//!
//! [`build_host_lookup`] turns raw vault items into a name-keyed map of
//! connection attributes.  [`reconcile_identity`] resolves one agent
//! identity against that map, refreshes its exported public key, and
//! appends a config block unless one already exists for the alias.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::alias::alias_for;
use crate::ssh_config::{HostEntry, SshConfig};
use crate::{Identity, ItemKind, VaultItem};

/// Field names read from vault items.  Everything else is ignored.
const FIELD_HOSTNAME: &str = "HostName";
const FIELD_USER: &str = "User";

/// Connection attributes resolved from one vault item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostMeta {
    pub hostname: Option<String>,
    pub user: Option<String>,
}

/// What happened to one identity during reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryAction {
    /// A new config block was appended.
    Added,
    /// A block for this alias already existed; only the key file was
    /// refreshed.
    Present,
}

/// Build the name → attributes map from the store's items.
///
/// Only SSH-key items qualify.  Duplicate names keep the later item
/// (last-write-wins) but are logged, since a shadowed record is usually a
/// vault-hygiene mistake.  Missing fields yield `None`, never an error.
pub fn build_host_lookup(items: &[VaultItem]) -> HashMap<String, HostMeta> {
    let mut lookup = HashMap::new();
    for item in items {
        if item.kind != ItemKind::SshKey {
            continue;
        }
        let mut meta = HostMeta::default();
        for field in &item.fields {
            match field.name.as_deref() {
                Some(FIELD_HOSTNAME) => meta.hostname = field.value.clone(),
                Some(FIELD_USER) => meta.user = field.value.clone(),
                _ => {}
            }
        }
        if lookup.insert(item.name.clone(), meta).is_some() {
            warn!(name = %item.name, "duplicate vault item name, later entry wins");
        }
    }
    lookup
}

/// Reconcile one identity into the key directory and config file.
///
/// The exported key is rewritten on every run, even when the config block
/// already exists (key material can rotate under an unchanged alias).  The
/// config append is gated on the alias being absent.
pub fn reconcile_identity(
    identity: &Identity,
    lookup: &HashMap<String, HostMeta>,
    keys_dir: &Path,
    config: &mut SshConfig,
) -> Result<EntryAction> {
    // A record with no resolvable hostname counts as no match at all: both
    // the hostname and the user fall back together.
    let meta = lookup
        .get(&identity.comment)
        .filter(|m| m.hostname.as_deref().is_some_and(|h| !h.is_empty()));

    let hostname = meta
        .and_then(|m| m.hostname.clone())
        .unwrap_or_else(|| identity.comment.clone());
    let user = meta
        .and_then(|m| m.user.clone())
        .filter(|u| !u.is_empty());

    let alias = alias_for(&identity.comment);
    let pubkey_path = keys_dir.join(format!("{alias}.pub"));

    std::fs::write(
        &pubkey_path,
        format!(
            "{} {} {}\n",
            identity.key_type, identity.key_material, identity.comment
        ),
    )
    .with_context(|| format!("failed to write {}", pubkey_path.display()))?;

    if config.contains_host(&alias) {
        debug!(alias = %alias, "config block already present, skipping");
        return Ok(EntryAction::Present);
    }

    config.append_host_block(&HostEntry {
        alias: alias.clone(),
        hostname,
        identity_file: pubkey_path,
        user,
    });
    debug!(alias = %alias, "appended config block");
    Ok(EntryAction::Added)
}
