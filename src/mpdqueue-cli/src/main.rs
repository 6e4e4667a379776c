mod events;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use events::{read_import_events, unit_from_arguments};
use mpdqueue_batch::{
    DirectoryStatus, FileStatus, FlushError, FlushReport, PendingBatch, QueueOrchestrator,
};
use mpdqueue_client::{
    Connection, ConnectionOptions, IndexSyncWaiter, SyncOptions, SystemClock, TcpConnector,
};
use mpdqueue_core::secrets::CredentialStore;
use mpdqueue_core::{init_logging, AppDirs, Config, MpdConfig, ServerEndpoint};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "mpdqueue",
    version,
    about = "Queue freshly imported music on a Music Player Daemon"
)]
struct Cli {
    /// Server host (takes precedence over config and MPD_HOST)
    #[arg(long, global = true)]
    host: Option<String>,
    /// Server port (takes precedence over config and MPD_PORT)
    #[arg(long, global = true)]
    port: Option<u16>,
    /// Print flush reports as JSON
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Queue files as one fresh import, in the order given
    Enqueue {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Queue the files of JSON-lines import events (stdin when FILE is absent or "-")
    Import { file: Option<PathBuf> },
    /// Print the server status
    Status,
    /// Update a directory and wait until the server has indexed it
    Update { directory: String },
    /// Manage the server password kept in the OS keyring
    #[command(subcommand)]
    Password(PasswordCommand),
}

#[derive(Debug, Subcommand)]
enum PasswordCommand {
    /// Store a password (read from stdin when not given)
    Set { password: Option<String> },
    /// Remove the stored password
    Clear,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let dirs = AppDirs::discover()?;
    let mut config = Config::load_or_default(&dirs)?;
    apply_overrides(&mut config.mpd, &cli);
    let _logging = init_logging(&config.logging, &dirs)?;

    let endpoint = config.mpd.endpoint(|key| std::env::var(key).ok())?;
    let store = CredentialStore::new();

    match cli.command {
        Command::Password(PasswordCommand::Set { password }) => {
            let password = match password {
                Some(password) => password,
                None => read_secret_line(io::stdin().lock())?,
            };
            store.store_password(endpoint.host(), endpoint.port(), &password)?;
            println!("Stored password for {endpoint}");
        }
        Command::Password(PasswordCommand::Clear) => {
            store.delete_password(endpoint.host(), endpoint.port())?;
            println!("Removed stored password for {endpoint}");
        }
        Command::Status => {
            let endpoint = store.complete_endpoint(endpoint);
            let mut connection =
                Connection::connect(&endpoint, &ConnectionOptions::from(&config.mpd))?;
            let status = connection.status()?;
            connection.close();
            for line in status.lines() {
                println!("{line}");
            }
        }
        Command::Update { directory } => {
            let endpoint = store.complete_endpoint(endpoint);
            let mut connection =
                Connection::connect(&endpoint, &ConnectionOptions::from(&config.mpd))?;
            let waiter = IndexSyncWaiter::new(SystemClock, SyncOptions::from(&config.mpd));
            let report = waiter.sync(&mut connection, &directory)?;
            connection.close();
            println!(
                "Updated {:?} ({} status polls, {:.1}s)",
                report.directory,
                report.polls,
                report.waited.as_secs_f64()
            );
        }
        Command::Enqueue { paths } => {
            let mut batch = new_batch(&config.mpd);
            batch.collect(unit_from_arguments(&paths));
            flush_at_exit(batch, store.complete_endpoint(endpoint), &config.mpd, cli.json)?;
        }
        Command::Import { file } => {
            let units = match file {
                Some(path) if path.to_str() != Some("-") => {
                    let file = File::open(&path)
                        .with_context(|| format!("failed to open {}", path.display()))?;
                    read_import_events(BufReader::new(file))?
                }
                _ => read_import_events(io::stdin().lock())?,
            };
            let mut batch = new_batch(&config.mpd);
            for unit in units {
                batch.collect(unit);
            }
            flush_at_exit(batch, store.complete_endpoint(endpoint), &config.mpd, cli.json)?;
        }
    }

    Ok(())
}

fn apply_overrides(mpd: &mut MpdConfig, cli: &Cli) {
    if let Some(host) = &cli.host {
        mpd.host = Some(host.clone());
    }
    if let Some(port) = cli.port {
        mpd.port = Some(port);
    }
}

fn new_batch(mpd: &MpdConfig) -> PendingBatch {
    match &mpd.music_directory {
        Some(root) => PendingBatch::with_library_root(root),
        None => PendingBatch::new(),
    }
}

fn read_secret_line<R: BufRead>(mut reader: R) -> Result<String> {
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    let password = line.trim_end_matches(|c: char| c == '\r' || c == '\n').to_string();
    anyhow::ensure!(!password.is_empty(), "password must not be empty");
    Ok(password)
}

/// Hand the accumulated batch to the server once all import events are in.
fn flush_at_exit(
    batch: PendingBatch,
    endpoint: ServerEndpoint,
    mpd: &MpdConfig,
    json: bool,
) -> Result<()> {
    tracing::info!(server = %endpoint, files = batch.len(), "flushing import batch");
    let connector = TcpConnector::new(endpoint, ConnectionOptions::from(mpd));
    let orchestrator = QueueOrchestrator::new(connector, SyncOptions::from(mpd));

    match orchestrator.flush(batch) {
        Ok(report) => {
            print_report(&report, json)?;
            Ok(())
        }
        Err(FlushError::Interrupted { source, report }) => {
            print_report(&report, json)?;
            Err(FlushError::Interrupted { source, report }.into())
        }
        Err(err) => Err(err.into()),
    }
}

fn print_report(report: &FlushReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", render_report(report));
    }
    Ok(())
}

fn render_report(report: &FlushReport) -> String {
    if report.directories.is_empty() && report.files.is_empty() {
        return "No files to add to queue\n".to_string();
    }

    let mut out = String::new();
    for dir in &report.directories {
        let line = match &dir.status {
            DirectoryStatus::Synced { polls } => {
                format!("updated   {} ({polls} polls)", display_dir(&dir.directory))
            }
            DirectoryStatus::Rejected { response } => format!(
                "refused   {}: {}",
                display_dir(&dir.directory),
                response.join(" | ")
            ),
            DirectoryStatus::TimedOut { polls } => {
                format!("timed out {} after {polls} polls", display_dir(&dir.directory))
            }
        };
        out.push_str(&line);
        out.push('\n');
    }
    for file in &report.files {
        match &file.status {
            FileStatus::Added => out.push_str(&format!("queued    {}\n", file.path)),
            FileStatus::Rejected { response } => {
                out.push_str(&format!("failed    {}: {}\n", file.path, response))
            }
        }
    }
    out.push_str(&format!(
        "{} queued, {} failed\n",
        report.added().count(),
        report.failed().count()
    ));
    out
}

fn display_dir(directory: &str) -> &str {
    if directory.is_empty() {
        "<library root>"
    } else {
        directory
    }
}
