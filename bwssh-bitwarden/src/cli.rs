//! `bw` CLI driver.
//!
//! All vault access goes through the Bitwarden CLI as a subprocess:
//! `status`, `unlock --raw`, `sync`, and `list items`.  The master password
//! is piped to `unlock` on stdin (never passed as an argument), and the
//! session token returned by unlock is handed to later calls as a value:
//! it reaches only the spawned child's environment, never this process's.

use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};
use zeroize::Zeroizing;

use bwssh_core::{
    ItemField, ItemKind, MetadataStore, SessionToken, StoreError, StoreStatus, VaultItem,
};

use crate::error::BwError;

/// `type` tag values in `bw list items` JSON.
const TYPE_LOGIN: u8 = 1;
const TYPE_SECURE_NOTE: u8 = 2;
const TYPE_CARD: u8 = 3;
const TYPE_IDENTITY: u8 = 4;
const TYPE_SSH_KEY: u8 = 5;

/// [`MetadataStore`] backed by the Bitwarden CLI.
#[derive(Debug, Clone)]
pub struct BwCli {
    program: String,
}

impl BwCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Spawn `bw <args>` and return its stdout on success.
    ///
    /// `session`, when present, is exported into the child's environment
    /// only; this process's environment is never touched.
    async fn run(
        &self,
        command: &'static str,
        args: &[&str],
        session: Option<&SessionToken>,
    ) -> Result<Vec<u8>, BwError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .arg("--nointeraction")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(token) = session {
            cmd.env("BW_SESSION", token.expose());
        }

        let child = cmd
            .spawn()
            .map_err(|e| BwError::Spawn(format!("failed to run {}: {e}", self.program)))?;

        let output = child.wait_with_output().await.map_err(|e| BwError::Command {
            command,
            message: e.to_string(),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BwError::Command {
                command,
                message: format!("({}) {}", output.status, stderr.trim()),
            });
        }

        debug!(command, "bw call succeeded");
        Ok(output.stdout)
    }
}

// ---------------------------------------------------------------------------
// bw JSON models
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct BwStatus {
    status: String,
}

#[derive(Debug, Deserialize)]
struct BwItem {
    name: String,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    fields: Vec<BwField>,
}

#[derive(Debug, Deserialize)]
struct BwField {
    name: Option<String>,
    value: Option<String>,
}

fn item_kind(tag: u8) -> ItemKind {
    match tag {
        TYPE_LOGIN => ItemKind::Login,
        TYPE_SECURE_NOTE => ItemKind::SecureNote,
        TYPE_CARD => ItemKind::Card,
        TYPE_IDENTITY => ItemKind::Identity,
        TYPE_SSH_KEY => ItemKind::SshKey,
        _ => ItemKind::Other,
    }
}

fn to_vault_item(item: BwItem) -> VaultItem {
    VaultItem {
        name: item.name,
        kind: item_kind(item.kind),
        fields: item
            .fields
            .into_iter()
            .map(|f| ItemField {
                name: f.name,
                value: f.value,
            })
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// MetadataStore impl
// ---------------------------------------------------------------------------

#[async_trait]
impl MetadataStore for BwCli {
    fn name(&self) -> &str {
        "bitwarden"
    }

    async fn status(&self) -> Result<StoreStatus, StoreError> {
        let stdout = self.run("status", &["status"], None).await?;
        let parsed: BwStatus = serde_json::from_slice(&stdout)
            .map_err(|e| BwError::Protocol(format!("bad status JSON: {e}")))?;
        match parsed.status.as_str() {
            "unauthenticated" => Err(BwError::Unauthenticated.into()),
            status => Ok(StoreStatus {
                locked: status != "unlocked",
            }),
        }
    }

    async fn unlock(&self, password: Zeroizing<String>) -> Result<SessionToken, StoreError> {
        // No `--nointeraction` here: `bw` reads the master password from the
        // piped stdin, which it treats as non-interactive input.
        let mut cmd = Command::new(&self.program);
        cmd.args(["unlock", "--raw"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| BwError::Spawn(format!("failed to run {}: {e}", self.program)))?;

        if let Some(mut stdin) = child.stdin.take() {
            let mut line = Zeroizing::new(Vec::with_capacity(password.len() + 1));
            line.extend_from_slice(password.as_bytes());
            line.push(b'\n');
            stdin.write_all(&line).await.map_err(|e| BwError::Command {
                command: "unlock",
                message: format!("failed to send password: {e}"),
            })?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| BwError::Command {
                command: "unlock",
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BwError::Auth(stderr.trim().to_string()).into());
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(BwError::Protocol("unlock returned no session token".to_string()).into());
        }

        info!("vault unlocked");
        Ok(SessionToken::new(token))
    }

    async fn sync(&self, session: Option<&SessionToken>) -> Result<(), StoreError> {
        self.run("sync", &["sync"], session).await?;
        debug!("vault synced");
        Ok(())
    }

    async fn list_items(
        &self,
        session: Option<&SessionToken>,
    ) -> Result<Vec<VaultItem>, StoreError> {
        let stdout = self.run("list items", &["list", "items"], session).await?;
        let items: Vec<BwItem> = serde_json::from_slice(&stdout)
            .map_err(|e| BwError::Protocol(format!("bad item list JSON: {e}")))?;
        debug!(count = items.len(), "vault items listed");
        Ok(items.into_iter().map(to_vault_item).collect())
    }
}
