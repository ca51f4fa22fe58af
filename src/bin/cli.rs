//! BlockKV CLI
//!
//! Command-line interface over a local BlockKV working directory.

use std::io::Write;
use std::path::PathBuf;

use blockkv::{Config, Store};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// BlockKV CLI
#[derive(Parser, Debug)]
#[command(name = "blockkv-cli")]
#[command(about = "CLI for the BlockKV embedded key-value store")]
#[command(version)]
struct Args {
    /// Working directory (must exist)
    #[arg(short, long, default_value = "./blockkv_data")]
    dir: PathBuf,

    /// Backing file size in bytes
    #[arg(short, long, default_value = "1048576")]
    block_size: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Put {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Remove a key
    Remove {
        /// The key to remove
        key: String,
    },

    /// Check whether a key exists
    Contains {
        /// The key to check
        key: String,
    },

    /// List all keys
    List,

    /// Show space usage
    Stats,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,blockkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> blockkv::Result<()> {
    let config = Config::builder()
        .data_dir(&args.dir)
        .block_file_size(args.block_size)
        .build();

    let mut store = Store::open(config)?;
    let mut stdout = std::io::stdout().lock();
    let result = execute(&mut store, args.command, &mut stdout);
    let closed = store.close();
    result?;
    closed
}

/// Run one command; `get` writes the value's raw bytes with nothing appended
fn execute<W: Write>(store: &mut Store, command: Commands, out: &mut W) -> blockkv::Result<()> {
    match command {
        Commands::Get { key } => {
            let value = store.load(key.as_bytes())?;
            out.write_all(&value)?;
        }
        Commands::Put { key, value } => {
            store.upsert(key.as_bytes(), value.as_bytes())?;
            writeln!(out, "OK")?;
        }
        Commands::Remove { key } => {
            let removed = store.remove(key.as_bytes())?;
            writeln!(out, "{}", if removed { "removed" } else { "not found" })?;
        }
        Commands::Contains { key } => {
            writeln!(out, "{}", store.contains(key.as_bytes())?)?;
        }
        Commands::List => {
            let mut keys: Vec<_> = store.keys()?.cloned().collect();
            keys.sort();
            for key in keys {
                out.write_all(&key)?;
                out.write_all(b"\n")?;
            }
        }
        Commands::Stats => {
            let stats = store.stats()?;
            writeln!(out, "keys:          {}", stats.keys)?;
            writeln!(out, "backing files: {}", stats.backing_files)?;
            writeln!(out, "free blocks:   {}", stats.free_blocks)?;
            writeln!(out, "free bytes:    {}", stats.free_bytes)?;
        }
    }
    out.flush()?;
    Ok(())
}
