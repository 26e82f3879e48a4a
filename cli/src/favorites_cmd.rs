use crate::Command;
use crate::CompsHome;
use anyhow::Context;
use anyhow::Result;
use anyhow::anyhow;
use clap::Parser;
use comps_filtering::Entry;
use comps_filtering::FilePreferenceStore;
use comps_filtering::FilterHistory;
use comps_filtering::FilteringConfig;
use comps_filtering::RecordingNotifier;
use comps_filtering::Severity;
use comps_filtering::auto_name;
use comps_filtering::canonical_hash;
use comps_filtering::deparam;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::LinesStream;

#[derive(Debug, Parser)]
pub struct CanonCommand {
    /// Route plus query string, e.g. `Simulations?filters=Owner=bob`.
    pub locator: String,
}

#[derive(Debug, Parser)]
pub struct LocatorCommand {
    pub locator: String,
}

#[derive(Debug, Parser)]
pub struct HashCommand {
    /// Canonical hash or any equivalent locator.
    pub hash: String,
}

#[derive(Debug, Parser)]
pub struct RenameCommand {
    /// Canonical hash or any equivalent locator.
    pub hash: String,
    pub name: String,
}

#[derive(Debug, Parser)]
pub struct ListCommand {
    /// Print entries as JSON.
    #[arg(long = "json")]
    pub json: bool,
}

struct Session {
    history: FilterHistory,
    notifier: Arc<RecordingNotifier>,
}

impl Session {
    async fn open(home: &CompsHome, retry_delay_ms: Option<u64>) -> Result<Self> {
        let mut config = FilteringConfig::load(&home.config_path())
            .with_context(|| format!("load {}", home.config_path().display()))?;
        if let Some(delay) = retry_delay_ms {
            config.retry_delay_ms = delay;
        }
        let notifier = Arc::new(RecordingNotifier::new());
        let store = Arc::new(FilePreferenceStore::new(home.preferences_path()));
        let history = FilterHistory::new(store, notifier.clone(), config);
        history.refresh().await;
        Ok(Self { history, notifier })
    }

    fn flush_notifications(&self) {
        for (severity, message) in self.notifier.take() {
            match severity {
                Severity::Info | Severity::Success => eprintln!("{message}"),
                Severity::Warning => eprintln!("warning: {message}"),
                Severity::Error => eprintln!("error: {message}"),
            }
        }
    }
}

pub async fn run(home: &CompsHome, retry_delay_ms: Option<u64>, command: Command) -> Result<()> {
    // Canonicalizing needs neither config nor stored favorites.
    if let Command::Canon(cmd) = command {
        return run_canon(cmd);
    }
    let session = Session::open(home, retry_delay_ms).await?;
    let result = match command {
        Command::Canon(cmd) => run_canon(cmd),
        Command::Visit(cmd) => run_visit(&session, cmd),
        Command::Pin(cmd) => run_pin(&session, cmd),
        Command::Forget(cmd) => run_forget(&session, cmd),
        Command::Promote(cmd) => run_promote(&session, cmd),
        Command::Rename(cmd) => run_rename(&session, cmd),
        Command::List(cmd) => print_entries(&session.history.latest(), cmd.json),
        Command::Replay(cmd) => run_replay(&session, cmd).await,
    };
    session.flush_notifications();
    result
}

fn run_canon(cmd: CanonCommand) -> Result<()> {
    let hash = canonical_hash(&cmd.locator)
        .ok_or_else(|| anyhow!("locator `{}` carries no filters", cmd.locator))?;
    println!("{hash}");
    println!("{}", auto_name(&deparam(&hash)));
    Ok(())
}

fn run_visit(session: &Session, cmd: LocatorCommand) -> Result<()> {
    let history = &session.history;
    let favorite = history.add_item(&cmd.locator, false, true);
    match history.current_hash() {
        Some(hash) if favorite => println!("favorite {hash}"),
        Some(hash) => println!("history {hash}"),
        None => println!("ignored: no filters"),
    }
    Ok(())
}

fn run_pin(session: &Session, cmd: LocatorCommand) -> Result<()> {
    if !session.history.add_item(&cmd.locator, true, false) {
        return Err(anyhow!("nothing to pin: `{}` carries no filters", cmd.locator));
    }
    let entry = find_entry(session, &cmd.locator)?;
    println!("pinned {}", entry.name);
    Ok(())
}

fn run_forget(session: &Session, cmd: HashCommand) -> Result<()> {
    let entry = find_entry(session, &cmd.hash)?;
    if !session.history.remove_item(&cmd.hash) {
        return Err(anyhow!("no remembered filter matches `{}`", cmd.hash));
    }
    println!("forgot {}", entry.name);
    Ok(())
}

fn run_promote(session: &Session, cmd: HashCommand) -> Result<()> {
    if !session.history.promote_item(&cmd.hash) {
        return Err(anyhow!("no remembered filter matches `{}`", cmd.hash));
    }
    println!("promoted {}", find_entry(session, &cmd.hash)?.name);
    Ok(())
}

fn run_rename(session: &Session, cmd: RenameCommand) -> Result<()> {
    let entry = session
        .history
        .rename_item(&cmd.hash, &cmd.name)
        .ok_or_else(|| anyhow!("cannot rename `{}`", cmd.hash))?;
    println!("{}", entry.canonical_hash);
    Ok(())
}

async fn run_replay(session: &Session, cmd: ListCommand) -> Result<()> {
    let lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
    let locators = lines
        .filter_map(Result::ok)
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty());
    let seen = session.history.follow_navigation(locators).await;
    tracing::debug!("replayed {seen} locators");
    print_entries(&session.history.latest(), cmd.json)
}

fn find_entry(session: &Session, hash: &str) -> Result<Entry> {
    session
        .history
        .find(hash)
        .ok_or_else(|| anyhow!("no remembered filter matches `{hash}`"))
}

fn print_entries(entries: &[Entry], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("No remembered filters yet.");
        return Ok(());
    }
    for entry in entries {
        println!("{}", render_entry(entry));
    }
    Ok(())
}

fn render_entry(entry: &Entry) -> String {
    format!(
        "{:<8}  {}  {}",
        entry.status.label(),
        entry.name,
        entry.canonical_hash
    )
}
