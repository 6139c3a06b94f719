use zeroize::Zeroizing;

pub mod alias;
pub mod config;
pub mod reconcile;
pub mod ssh_config;

/// One SSH key as reported by the agent.
///
/// Built fresh on every sync by parsing one line of agent output
/// (`<type> <base64> <comment>`).  Never persisted directly; only the
/// derived artifacts (the exported `.pub` file and the config block) live
/// on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Algorithm identifier (e.g. `ssh-ed25519`).
    pub key_type: String,
    /// Base64 public key material, treated as an opaque token.
    pub key_material: String,
    /// Free-form comment.  Doubles as the join key against vault item names
    /// and as the source of the config alias; may contain whitespace.
    pub comment: String,
}

/// Lock state of the metadata store.
#[derive(Debug, Clone)]
pub struct StoreStatus {
    pub locked: bool,
}

/// Vault item categories, as reported by the store.
///
/// Only [`ItemKind::SshKey`] items contribute connection metadata; the rest
/// are carried through so providers can map their full type tag space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Login,
    SecureNote,
    Card,
    Identity,
    SshKey,
    Other,
}

/// A named field on a vault item.  Both halves are optional: stores may
/// return unnamed or empty fields, and neither case is an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemField {
    pub name: Option<String>,
    pub value: Option<String>,
}

/// Provider-neutral shape of one metadata-store item.
#[derive(Debug, Clone)]
pub struct VaultItem {
    pub name: String,
    pub kind: ItemKind,
    pub fields: Vec<ItemField>,
}

/// Session token returned by a successful unlock.
///
/// Threaded as an explicit value into every subsequent store call, never
/// exported into this process's environment.  The inner string is zeroized
/// on drop and redacted from `Debug` output.
#[derive(Clone)]
pub struct SessionToken(Zeroizing<String>);

impl SessionToken {
    pub fn new(raw: String) -> Self {
        Self(Zeroizing::new(raw))
    }

    /// Access the raw token for handing to a provider call.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionToken([redacted])")
    }
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("store locked")]
    Locked,
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("unexpected store response: {0}")]
    Protocol(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum AgentError {
    #[error("agent unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// The metadata store boundary: an external vault of named records carrying
/// optional connection attributes, gated by a lock.
///
/// Calls are synchronous from the pipeline's point of view: each one blocks
/// the sync until the provider answers.  There is no timeout layer; a hung
/// provider hangs the sync.
#[async_trait::async_trait]
pub trait MetadataStore: Send + Sync {
    /// Short identifier for logs and the status command.
    fn name(&self) -> &str;

    async fn status(&self) -> Result<StoreStatus, StoreError>;

    /// Authenticate with the master password and return a session token for
    /// subsequent calls.  The password must never be echoed or logged.
    async fn unlock(&self, password: Zeroizing<String>) -> Result<SessionToken, StoreError>;

    /// Pull fresh data from the remote source.  `session` is `None` only
    /// when the store reported itself already unlocked out-of-band.
    async fn sync(&self, session: Option<&SessionToken>) -> Result<(), StoreError>;

    async fn list_items(
        &self,
        session: Option<&SessionToken>,
    ) -> Result<Vec<VaultItem>, StoreError>;
}

/// The agent boundary: whatever process holds the loaded SSH keys and can
/// enumerate their public halves.
#[async_trait::async_trait]
pub trait KeyAgent: Send + Sync {
    /// List the identities currently held by the agent.
    ///
    /// Fails with [`AgentError::Unavailable`] when no agent is reachable;
    /// an agent that is running but empty returns an empty list.
    async fn list_identities(&self) -> Result<Vec<Identity>, AgentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_token_debug_redacts() {
        let token = SessionToken::new("hunter2-session".to_string());
        let debug = format!("{token:?}");
        assert_eq!(debug, "SessionToken([redacted])");
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn session_token_expose_roundtrips() {
        let token = SessionToken::new("abc123".to_string());
        assert_eq!(token.expose(), "abc123");
        let cloned = token.clone();
        assert_eq!(cloned.expose(), "abc123");
    }
}
