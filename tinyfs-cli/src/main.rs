use clap::Parser;
use eyre::{Context, Result};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::PathBuf;
use tinyfs::{config::DEFAULT_STORE, io::FileStoreBuilder, Config, FileSystem, MoveCheck};
use tracing::{info, trace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Runs a command script against a simulated filesystem kept in a text snapshot.
#[derive(Parser)]
struct Cli {
    /// Script with one command per line (CR, DL, CP, MV, CD, DD, LL).
    #[arg(index = 1)]
    script: PathBuf,
    /// Snapshot file holding the filesystem between runs.
    #[arg(long, default_value = DEFAULT_STORE)]
    store: PathBuf,
    /// Replace the snapshot through a temporary file instead of rewriting it in place.
    #[arg(long)]
    atomic_writes: bool,
    /// Check MV collisions against the requested name rather than the source's name.
    #[arg(long)]
    check_destination_name: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();
    trace!("Starting up tinyfs cli");

    let script = File::open(&cli.script)
        .wrap_err_with(|| format!("Failed to open script {:?}", cli.script))?;

    let store = FileStoreBuilder::new(&cli.store)
        .atomic_writes(cli.atomic_writes)
        .build();
    let move_check = if cli.check_destination_name {
        MoveCheck::DestinationName
    } else {
        MoveCheck::SourceName
    };
    let mut fs = FileSystem::open_with(store, Config::new().with_move_check(move_check))
        .wrap_err_with(|| format!("Failed to open filesystem {:?}", cli.store))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let report = fs
        .run_script(BufReader::new(script), &mut out)
        .wrap_err("Failed to run script")?;
    out.flush()?;
    info!(
        executed = report.executed,
        failed = report.failed,
        "script finished"
    );
    Ok(())
}
