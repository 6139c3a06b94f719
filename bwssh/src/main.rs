mod bootstrap;
mod sync;

use std::path::PathBuf;

use anyhow::Result;
use zeroize::Zeroizing;

use bwssh_agent::SshAddAgent;
use bwssh_bitwarden::BwCli;
use bwssh_core::MetadataStore;
use bwssh_core::config::Config;

use crate::bootstrap::Paths;

#[tokio::main]
async fn main() -> Result<()> {
    // Reset SIGPIPE to default so piping output to `head` etc. exits cleanly
    // instead of panicking with "broken pipe".
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cmd = args.first().map(String::as_str).unwrap_or("sync");

    match cmd {
        "sync" => cmd_sync().await,
        "status" => cmd_status().await,
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        // Bare flag invocations like `bwssh --config x` mean the default command.
        other if other.starts_with("--config") || other == "-c" => cmd_sync().await,
        other => {
            eprintln!("unknown command: {other}");
            print_help();
            std::process::exit(1);
        }
    }
}

fn print_help() {
    println!(
        "\
bwssh - sync agent-held SSH identities and vault metadata into ssh_config

USAGE:
    bwssh [command] [options]

COMMANDS:
    sync                      Reconcile agent identities into the config file  [default]
    status                    Show vault lock state and output paths
    help                      Show this help

OPTIONS:
    --config <path>           Config file to read (default: ~/.config/bwssh/config.toml)

WHAT sync DOES:
    1. Ensures <output>/config and <output>/keys/ exist, backs up a
       pre-existing config to config_<timestamp>.bak, adds a 'Host *'
       defaults block when missing, and hard-links the config at ~/.ssh/config.
    2. Unlocks the Bitwarden vault if it is locked (you will be prompted for
       the master password), then syncs and lists its items.
    3. Lists identities from the running SSH agent (ssh-add -L).
    4. For each identity: exports <output>/keys/<alias>.pub (always) and
       appends a 'Host <alias>' block unless one already exists.

    Aliases are the lowercased key comment with / : \\ * ? \" < > | replaced
    by '_'.  The hostname comes from the vault item named after the comment
    (field 'HostName'; 'User' is optional); without a match the comment
    itself is used as the hostname.

NOTES:
    Re-running is safe: existing blocks are never rewritten or reordered, and
    hand-written content in the config file is preserved.  Exported key files
    are refreshed on every run.

EXAMPLES:
    bwssh                                 # same as 'bwssh sync'
    bwssh sync --config ./bwssh.toml
    bwssh status"
    );
}

/// Resolve the config file path from `--config <path>` flag or XDG default.
fn config_path() -> PathBuf {
    let args: Vec<String> = std::env::args().collect();
    for (i, arg) in args.iter().enumerate() {
        if let Some(p) = arg.strip_prefix("--config=") {
            return PathBuf::from(p);
        }
        if (arg == "--config" || arg == "-c") && i + 1 < args.len() {
            return PathBuf::from(&args[i + 1]);
        }
    }
    Config::default_path()
}

fn prompt_master_password() -> Result<Zeroizing<String>> {
    let password = rpassword::prompt_password("Bitwarden master password: ")?;
    Ok(Zeroizing::new(password))
}

async fn cmd_sync() -> Result<()> {
    let config = Config::load(&config_path())?;
    let paths = Paths::resolve(&config)?;
    let store = BwCli::new(config.vault.program.clone());
    let agent = SshAddAgent::new(config.agent.program.clone());

    let report = sync::run_sync(&store, &agent, &paths, prompt_master_password).await?;

    println!(
        "Synced {} identities: {} new, {} already present.",
        report.processed(),
        report.added,
        report.present
    );
    println!("Config: {}", paths.config_file.display());
    Ok(())
}

async fn cmd_status() -> Result<()> {
    let config = Config::load(&config_path())?;
    let paths = Paths::resolve(&config)?;
    let store = BwCli::new(config.vault.program.clone());

    match store.status().await {
        Ok(status) => println!(
            "{}: {}",
            store.name(),
            if status.locked { "locked" } else { "unlocked" }
        ),
        Err(e) => println!("{}: unavailable ({e})", store.name()),
    }
    println!("output dir: {}", paths.output_dir.display());
    println!("config:     {}", paths.config_file.display());
    println!("linked at:  {}", paths.link_path.display());
    Ok(())
}
