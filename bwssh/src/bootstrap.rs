//! Output tree bootstrap.
//!
//! Ensures the output directory, keys directory, config file, and the
//! conventional hard link exist before any reconciliation runs.  A
//! pre-existing config is copied to a timestamped `.bak` first and then
//! edited in place, so earlier hand-written content survives across runs
//! and the link keeps pointing at the same inode.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use tracing::{debug, info};

use bwssh_core::config::Config;
use bwssh_core::ssh_config::SshConfig;

/// Resolved filesystem layout for one run.
#[derive(Debug, Clone)]
pub struct Paths {
    pub output_dir: PathBuf,
    pub keys_dir: PathBuf,
    pub config_file: PathBuf,
    pub link_path: PathBuf,
}

impl Paths {
    /// Resolve the layout from configuration.  All paths come out absolute:
    /// `IdentityFile` lines must not depend on the invocation directory.
    pub fn resolve(config: &Config) -> Result<Self> {
        let output_dir = absolutize(config.output.resolved_dir())?;
        let link_path = absolutize(config.output.resolved_link())?;
        Ok(Self {
            keys_dir: output_dir.join("keys"),
            config_file: output_dir.join("config"),
            output_dir,
            link_path,
        })
    }
}

/// Prepare the output tree and return the loaded config model.
pub fn bootstrap(paths: &Paths) -> Result<SshConfig> {
    std::fs::create_dir_all(&paths.keys_dir)
        .with_context(|| format!("failed to create {}", paths.keys_dir.display()))?;

    if paths.config_file.exists() {
        let backup = backup_path(&paths.config_file, Local::now());
        std::fs::copy(&paths.config_file, &backup)
            .with_context(|| format!("failed to back up config to {}", backup.display()))?;
        debug!(backup = %backup.display(), "backed up existing config");
    }

    let mut config = SshConfig::load(&paths.config_file)?;
    if config.ensure_default_block() {
        info!("added default Host * block");
    }
    config.save(&paths.config_file)?;

    link_config(&paths.config_file, &paths.link_path)?;
    Ok(config)
}

fn absolutize(path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(std::env::current_dir()
            .context("failed to determine current directory")?
            .join(path))
    }
}

fn backup_path(config_file: &Path, now: DateTime<Local>) -> PathBuf {
    let stem = config_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "config".to_string());
    config_file.with_file_name(format!("{stem}_{}.bak", now.format("%Y%m%d_%H%M%S")))
}

/// Hard-link the generated config at the conventional path, replacing any
/// pre-existing entry there.
fn link_config(config_file: &Path, link_path: &Path) -> Result<()> {
    if link_path == config_file {
        return Ok(());
    }
    if let Some(parent) = link_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    match std::fs::remove_file(link_path) {
        Ok(()) => debug!(path = %link_path.display(), "replaced existing link target"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e).with_context(|| format!("failed to remove {}", link_path.display()));
        }
    }
    std::fs::hard_link(config_file, link_path).with_context(|| {
        format!(
            "failed to link {} at {}",
            config_file.display(),
            link_path.display()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn paths_in(dir: &Path) -> Paths {
        Paths {
            output_dir: dir.join("out"),
            keys_dir: dir.join("out").join("keys"),
            config_file: dir.join("out").join("config"),
            link_path: dir.join("ssh").join("config"),
        }
    }

    #[test]
    fn creates_tree_defaults_and_link() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());

        bootstrap(&paths).unwrap();

        assert!(paths.keys_dir.is_dir());
        let written = std::fs::read_to_string(&paths.config_file).unwrap();
        assert!(written.starts_with("Host *\n"));
        assert!(written.contains("  AddKeysToAgent yes\n"));
        assert_eq!(std::fs::read_to_string(&paths.link_path).unwrap(), written);
    }

    #[test]
    fn link_tracks_later_in_place_writes() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());
        bootstrap(&paths).unwrap();

        // Rewriting the config under the same inode must show through the link.
        let mut config = SshConfig::load(&paths.config_file).unwrap();
        config.append_host_block(&bwssh_core::ssh_config::HostEntry {
            alias: "gw".to_string(),
            hostname: "gw.example".to_string(),
            identity_file: paths.keys_dir.join("gw.pub"),
            user: None,
        });
        config.save(&paths.config_file).unwrap();

        let through_link = std::fs::read_to_string(&paths.link_path).unwrap();
        assert!(through_link.contains("Host gw\n"));
    }

    #[test]
    fn populated_config_is_backed_up_and_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());
        std::fs::create_dir_all(&paths.output_dir).unwrap();
        let existing = "# hand-written\nHost legacy\n  HostName legacy.example\n";
        std::fs::write(&paths.config_file, existing).unwrap();

        bootstrap(&paths).unwrap();

        let written = std::fs::read_to_string(&paths.config_file).unwrap();
        assert!(written.starts_with("Host *\n"));
        assert!(written.ends_with(existing));

        let backups: Vec<_> = std::fs::read_dir(&paths.output_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".bak"))
            .collect();
        assert_eq!(backups.len(), 1);
        assert_eq!(
            std::fs::read_to_string(backups[0].path()).unwrap(),
            existing
        );
    }

    #[test]
    fn existing_default_block_is_not_duplicated() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());
        bootstrap(&paths).unwrap();
        let first = std::fs::read_to_string(&paths.config_file).unwrap();

        bootstrap(&paths).unwrap();
        let second = std::fs::read_to_string(&paths.config_file).unwrap();

        assert_eq!(first, second);
        assert_eq!(second.matches("Host *").count(), 1);
    }

    #[test]
    fn link_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());
        std::fs::create_dir_all(paths.link_path.parent().unwrap()).unwrap();
        std::fs::write(&paths.link_path, "stale unrelated file\n").unwrap();

        bootstrap(&paths).unwrap();

        let through_link = std::fs::read_to_string(&paths.link_path).unwrap();
        assert!(through_link.starts_with("Host *\n"));
    }

    #[test]
    fn backup_name_carries_timestamp() {
        let at = Local.with_ymd_and_hms(2026, 8, 7, 9, 31, 44).unwrap();
        let backup = backup_path(Path::new("/out/config"), at);
        assert_eq!(backup, PathBuf::from("/out/config_20260807_093144.bak"));
    }
}
