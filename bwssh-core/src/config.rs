//! Tool configuration loaded from `config.toml`.
//!
//! All sections and keys are optional; a missing file yields the defaults.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub vault: VaultConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Metadata-store provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Bitwarden CLI binary to invoke.
    #[serde(default = "default_vault_program")]
    pub program: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            program: default_vault_program(),
        }
    }
}

/// Agent provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// `ssh-add`-compatible binary to invoke.
    #[serde(default = "default_agent_program")]
    pub program: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            program: default_agent_program(),
        }
    }
}

/// Where the generated tree lives and where the config is linked.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory holding the generated `config` and `keys/` tree.
    /// Defaults to `$XDG_DATA_HOME/bwssh` (or `~/.local/share/bwssh`).
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Conventional path the generated config is hard-linked to.
    /// Defaults to `~/.ssh/config`.
    #[serde(default)]
    pub link: Option<PathBuf>,
}

fn default_vault_program() -> String {
    "bw".to_string()
}

fn default_agent_program() -> String {
    "ssh-add".to_string()
}

impl Config {
    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist.  A file that exists but fails to parse is an
    /// error; silently ignoring a broken config hides typos.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// `$XDG_CONFIG_HOME/bwssh/config.toml`, falling back through
    /// `$HOME/.config`.
    pub fn default_path() -> PathBuf {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("bwssh").join("config.toml")
    }
}

impl OutputConfig {
    pub fn resolved_dir(&self) -> PathBuf {
        match &self.dir {
            Some(dir) => dir.clone(),
            None => data_home().join("bwssh"),
        }
    }

    pub fn resolved_link(&self) -> PathBuf {
        match &self.link {
            Some(link) => link.clone(),
            None => home_dir().join(".ssh").join("config"),
        }
    }
}

fn data_home() -> PathBuf {
    std::env::var_os("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| home_dir().join(".local").join("share"))
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.vault.program, "bw");
        assert_eq!(config.agent.program, "ssh-add");
        assert!(config.output.dir.is_none());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[output]\ndir = \"/tmp/bwssh-out\"\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.output.dir.as_deref(), Some("/tmp/bwssh-out".as_ref()));
        assert_eq!(config.vault.program, "bw");
    }

    #[test]
    fn broken_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[vault\nprogram=").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn explicit_output_paths_win() {
        let output = OutputConfig {
            dir: Some(PathBuf::from("/srv/bwssh")),
            link: Some(PathBuf::from("/srv/ssh-config")),
        };
        assert_eq!(output.resolved_dir(), PathBuf::from("/srv/bwssh"));
        assert_eq!(output.resolved_link(), PathBuf::from("/srv/ssh-config"));
    }
}
