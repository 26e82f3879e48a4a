pub mod favorites_cmd;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const HOME_DIR_NAME: &str = ".comps";
const CONFIG_FILENAME: &str = "config.toml";
const PREFERENCES_FILENAME: &str = "preferences.json";

/// Remember and recall grid filter queries.
#[derive(Debug, Parser)]
#[command(name = "comps", version)]
pub struct Cli {
    /// Directory holding config.toml and preferences.json.
    #[arg(long = "home", env = "COMPS_HOME", global = true)]
    pub home: Option<PathBuf>,

    /// Override the delay before retrying an unusable favorites load.
    #[arg(long = "retry-delay-ms", global = true)]
    pub retry_delay_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the canonical hash and default name of a locator.
    Canon(favorites_cmd::CanonCommand),
    /// Record a navigation to a locator.
    Visit(favorites_cmd::LocatorCommand),
    /// Remember a locator as a favorite.
    Pin(favorites_cmd::LocatorCommand),
    /// Demote a favorite back to session history.
    Forget(favorites_cmd::HashCommand),
    /// Move a favorite to the top of the list.
    Promote(favorites_cmd::HashCommand),
    /// Name a favorite, pinning it first when needed.
    Rename(favorites_cmd::RenameCommand),
    /// Show favorites and session history.
    List(favorites_cmd::ListCommand),
    /// Read locators from stdin as a navigation stream, then list.
    Replay(favorites_cmd::ListCommand),
}

#[derive(Debug, Clone)]
pub struct CompsHome {
    root: PathBuf,
}

impl CompsHome {
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self> {
        let root = match explicit {
            Some(root) => root,
            None => dirs::home_dir()
                .context("resolve home directory; pass --home or set COMPS_HOME")?
                .join(HOME_DIR_NAME),
        };
        Ok(Self { root })
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILENAME)
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.root.join(PREFERENCES_FILENAME)
    }
}

/// Logs go to stderr; `RUST_LOG` overrides the default `warn` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub async fn run(cli: Cli) -> Result<()> {
    let home = CompsHome::resolve(cli.home)?;
    favorites_cmd::run(&home, cli.retry_delay_ms, cli.command).await
}
