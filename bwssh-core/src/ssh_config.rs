//! Structure-preserving edits to the generated ssh_config.
//!
//! The file is owned by this tool but additive-only: anything already in it
//! (hand edits, unrelated blocks, comments) must survive a sync
//! byte-for-byte.  The model keeps the verbatim text alongside a parsed set
//! of `Host` pattern tokens; presence checks run against the token set, so
//! an alias can never be confused with a longer alias it happens to prefix
//! (`prod` does not match a `Host prod-backup` block) and stray comment text
//! never produces a false positive.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Defaults written once at the top of a config that has no `Host *` block.
const DEFAULT_BLOCK: &str = "Host *\n  Port 22\n  AddKeysToAgent yes\n";

/// One resolved entry to be persisted as a `Host` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    pub alias: String,
    pub hostname: String,
    /// Absolute path of the exported public key.
    pub identity_file: PathBuf,
    /// Emitted as a `User` line only when metadata supplied one.
    pub user: Option<String>,
}

/// An ssh_config file: opaque lines plus recognisable `Host` blocks.
#[derive(Debug, Default)]
pub struct SshConfig {
    text: String,
    hosts: BTreeSet<String>,
}

impl SshConfig {
    /// Read `path`, treating a missing file as empty.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = if path.exists() {
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?
        } else {
            String::new()
        };
        Ok(Self::from_text(raw))
    }

    pub fn from_text(text: String) -> Self {
        let hosts = parse_host_patterns(&text);
        Self { text, hosts }
    }

    /// Whether a block for `alias` exists, by exact pattern-token match.
    pub fn contains_host(&self, alias: &str) -> bool {
        self.hosts.contains(alias)
    }

    pub fn has_defaults(&self) -> bool {
        self.hosts.contains("*")
    }

    /// Prepend the default `Host *` block unless one already exists,
    /// preserving any existing content verbatim after it.
    ///
    /// Returns `true` when the block was added.
    pub fn ensure_default_block(&mut self) -> bool {
        if self.has_defaults() {
            return false;
        }
        let mut text = String::from(DEFAULT_BLOCK);
        if !self.text.is_empty() {
            text.push('\n');
            text.push_str(&self.text);
        }
        self.text = text;
        self.hosts.insert("*".to_string());
        true
    }

    /// Append a rendered `Host` block, preceded by one blank line.
    ///
    /// The caller is expected to have checked [`contains_host`] first; this
    /// method appends unconditionally.
    pub fn append_host_block(&mut self, entry: &HostEntry) {
        if !self.text.is_empty() {
            if !self.text.ends_with('\n') {
                self.text.push('\n');
            }
            self.text.push('\n');
        }
        self.text.push_str(&render_entry(entry));
        self.hosts.insert(entry.alias.clone());
    }

    /// Write the full text back in place.  The file is truncated and
    /// rewritten under the same inode, so a hard link elsewhere stays valid.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        std::fs::write(path, &self.text)
            .with_context(|| format!("failed to write {}", path.display()))
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

fn render_entry(entry: &HostEntry) -> String {
    let mut block = format!(
        "Host {}\n  HostName {}\n  IdentityFile {}\n  IdentitiesOnly yes\n",
        entry.alias,
        entry.hostname,
        entry.identity_file.display()
    );
    if let Some(user) = &entry.user {
        block.push_str(&format!("  User {user}\n"));
    }
    block
}

/// Collect every pattern token from `Host` lines.
///
/// The `Host` keyword is matched case-insensitively (as ssh itself does);
/// the pattern tokens keep their case.  A `Host` line may carry several
/// patterns; each becomes its own set entry.
fn parse_host_patterns(text: &str) -> BTreeSet<String> {
    let mut hosts = BTreeSet::new();
    for line in text.lines() {
        let mut tokens = line.split_whitespace();
        let Some(keyword) = tokens.next() else {
            continue;
        };
        if keyword.eq_ignore_ascii_case("Host") {
            hosts.extend(tokens.map(str::to_string));
        }
    }
    hosts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(alias: &str) -> HostEntry {
        HostEntry {
            alias: alias.to_string(),
            hostname: "10.0.0.5".to_string(),
            identity_file: PathBuf::from(format!("/keys/{alias}.pub")),
            user: Some("deploy".to_string()),
        }
    }

    #[test]
    fn parses_host_patterns() {
        let config = SshConfig::from_text(
            "# comment\nHost alpha beta\n  HostName a\n\nhost gamma\n  Port 2222\n".to_string(),
        );
        assert!(config.contains_host("alpha"));
        assert!(config.contains_host("beta"));
        assert!(config.contains_host("gamma"));
        assert!(!config.contains_host("delta"));
    }

    #[test]
    fn alias_is_not_a_prefix_match() {
        let config =
            SshConfig::from_text("Host prod-backup\n  HostName backup.example\n".to_string());
        assert!(config.contains_host("prod-backup"));
        assert!(!config.contains_host("prod"));
    }

    #[test]
    fn comment_text_is_not_a_false_positive() {
        let config =
            SshConfig::from_text("# Host build-server used to live here\n".to_string());
        assert!(!config.contains_host("build-server"));
    }

    #[test]
    fn default_block_on_empty_file() {
        let mut config = SshConfig::from_text(String::new());
        assert!(config.ensure_default_block());
        assert_eq!(config.as_str(), "Host *\n  Port 22\n  AddKeysToAgent yes\n");
        assert!(config.has_defaults());
    }

    #[test]
    fn default_block_prepends_and_preserves_existing_content() {
        let existing = "# my notes\nHost legacy\n  HostName legacy.example\n";
        let mut config = SshConfig::from_text(existing.to_string());
        assert!(config.ensure_default_block());
        assert!(config.as_str().starts_with("Host *\n"));
        assert!(config.as_str().ends_with(existing));
    }

    #[test]
    fn default_block_added_once() {
        let mut config = SshConfig::from_text(String::new());
        assert!(config.ensure_default_block());
        assert!(!config.ensure_default_block());
    }

    #[test]
    fn append_separates_with_one_blank_line() {
        let mut config = SshConfig::from_text("Host *\n  Port 22\n".to_string());
        config.append_host_block(&entry("build-server"));
        assert_eq!(
            config.as_str(),
            "Host *\n  Port 22\n\nHost build-server\n  HostName 10.0.0.5\n  \
             IdentityFile /keys/build-server.pub\n  IdentitiesOnly yes\n  User deploy\n"
        );
        assert!(config.contains_host("build-server"));
    }

    #[test]
    fn append_omits_user_when_absent() {
        let mut config = SshConfig::from_text(String::new());
        config.append_host_block(&HostEntry {
            user: None,
            ..entry("laptop-key")
        });
        assert!(!config.as_str().contains("User "));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        let mut config = SshConfig::from_text(String::new());
        config.ensure_default_block();
        config.append_host_block(&entry("build-server"));
        config.save(&path).unwrap();

        let reloaded = SshConfig::load(&path).unwrap();
        assert_eq!(reloaded.as_str(), config.as_str());
        assert!(reloaded.contains_host("build-server"));
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = SshConfig::load(&dir.path().join("config")).unwrap();
        assert_eq!(config.as_str(), "");
    }
}
