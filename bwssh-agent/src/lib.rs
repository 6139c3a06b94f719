//! SSH agent provider.
//!
//! Lists the identities currently held by the running agent by invoking
//! `ssh-add -L` and parsing its line-oriented output.  The parser is a pure
//! function over the raw text so it can be exercised without an agent.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use bwssh_core::{AgentError, Identity, KeyAgent};

/// Sentinel printed by `ssh-add` when the agent is reachable but empty.
const NO_IDENTITIES: &str = "The agent has no identities";

/// Parse raw `ssh-add -L` output into identities.
///
/// Each line is trimmed; empty lines and the no-identities sentinel are
/// skipped.  A line splits into at most three whitespace-delimited fields:
/// key type, key material, and the comment.  The comment is the un-split
/// remainder, so it keeps interior whitespace.  Lines with fewer than three
/// fields are skipped silently (they cannot name an alias).
pub fn parse_identities(raw: &str) -> Vec<Identity> {
    let mut identities = Vec::new();
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(NO_IDENTITIES) {
            continue;
        }
        let mut fields = line.splitn(3, [' ', '\t']);
        let (Some(key_type), Some(key_material), Some(rest)) =
            (fields.next(), fields.next(), fields.next())
        else {
            debug!(line, "skipping malformed identity line");
            continue;
        };
        let comment = rest.trim();
        if key_type.is_empty() || key_material.is_empty() || comment.is_empty() {
            debug!(line, "skipping malformed identity line");
            continue;
        }
        identities.push(Identity {
            key_type: key_type.to_string(),
            key_material: key_material.to_string(),
            comment: comment.to_string(),
        });
    }
    identities
}

/// [`KeyAgent`] backed by the `ssh-add` binary.
#[derive(Debug, Clone)]
pub struct SshAddAgent {
    program: String,
}

impl SshAddAgent {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl KeyAgent for SshAddAgent {
    async fn list_identities(&self) -> Result<Vec<Identity>, AgentError> {
        let output = Command::new(&self.program)
            .arg("-L")
            .output()
            .await
            .map_err(|e| {
                AgentError::Unavailable(format!("failed to run {}: {e}", self.program))
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);

        // `ssh-add -L` exits 1 when the agent holds no identities (printing
        // the sentinel) and 2 when no agent is reachable at all.  Only the
        // latter is a provider failure.
        match output.status.code() {
            Some(0) => {}
            Some(1) if stdout.contains(NO_IDENTITIES) => {}
            _ => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(AgentError::Unavailable(format!(
                    "{} -L failed ({}): {}",
                    self.program,
                    output.status,
                    stderr.trim()
                )));
            }
        }

        let identities = parse_identities(&stdout);
        debug!(count = identities.len(), "agent identities listed");
        Ok(identities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_one_identity_per_line() {
        let raw = "ssh-ed25519 AAAAC3Nza build-server\n\
                   ssh-rsa AAAAB3Nza laptop-key\n";
        let identities = parse_identities(raw);
        assert_eq!(identities.len(), 2);
        assert_eq!(identities[0].key_type, "ssh-ed25519");
        assert_eq!(identities[0].key_material, "AAAAC3Nza");
        assert_eq!(identities[0].comment, "build-server");
        assert_eq!(identities[1].comment, "laptop-key");
    }

    #[test]
    fn comment_keeps_interior_whitespace() {
        let identities = parse_identities("ssh-ed25519 AAAAC3Nza home lab nuc\n");
        assert_eq!(identities.len(), 1);
        assert_eq!(identities[0].comment, "home lab nuc");
    }

    #[test]
    fn skips_sentinel_and_blank_lines() {
        let raw = "\nThe agent has no identities.\n\n";
        assert!(parse_identities(raw).is_empty());
    }

    #[test]
    fn skips_lines_with_fewer_than_three_fields() {
        let raw = "ssh-ed25519 AAAAC3Nza\nlonetoken\n\
                   ssh-rsa AAAAB3Nza ok\n";
        let identities = parse_identities(raw);
        assert_eq!(identities.len(), 1);
        assert_eq!(identities[0].comment, "ok");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let identities = parse_identities("  ssh-ed25519 AAAAC3Nza padded \n");
        assert_eq!(identities.len(), 1);
        assert_eq!(identities[0].comment, "padded");
    }

    #[test]
    fn fresh_parse_is_order_preserving() {
        let raw = "ssh-ed25519 k1 a\nssh-ed25519 k2 b\nssh-ed25519 k3 c\n";
        let comments: Vec<_> = parse_identities(raw)
            .into_iter()
            .map(|i| i.comment)
            .collect();
        assert_eq!(comments, ["a", "b", "c"]);
    }
}
