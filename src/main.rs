//! Serves one of the backends over TCP or a Unix-domain socket.
//!
//! ```bash
//! valuerpc counter '*:4000'
//! valuerpc counter unix:/tmp/counter.sock
//! valuerpc oracle 127.0.0.1 --table responses.json
//! RUST_LOG=debug valuerpc inventory '[::1]:4001' --fixture inventory.json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{path::PathBuf, sync::Arc};
use tracing_subscriber::EnvFilter;
use valuerpc::{
    backends::{
        counter::{self, Counter, DEFAULT_SEED},
        inventory,
        oracle::{Oracle, OracleTable, DEFAULT_RECORD_LIMIT},
    },
    config::ServeAddr,
    inventory::StaticInventory,
    Server,
};

#[derive(Parser)]
#[command(name = "valuerpc")]
#[command(version)]
#[command(about = "Serve a value-call backend")]
struct Cli {
    /// Log at debug level.
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    /// Disable logging.
    #[arg(short = 'q', long = "quiet", global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    backend: Backend,
}

#[derive(Subcommand)]
enum Backend {
    /// Answer `eval` from a response table and record `update` calls.
    Oracle {
        /// ADDRESS[:PORT] or unix:PATH; `*` binds all interfaces, no port picks one.
        address: ServeAddr,
        /// JSON response table.
        #[arg(long)]
        table: Option<PathBuf>,
        /// How many `update` calls to keep in memory.
        #[arg(long, default_value_t = DEFAULT_RECORD_LIMIT)]
        record_limit: usize,
    },
    /// The `set`, `inc` and `rev` functions.
    Counter {
        address: ServeAddr,
        #[arg(long, default_value_t = DEFAULT_SEED, allow_negative_numbers = true)]
        seed: i64,
    },
    /// The `info` container/image query.
    Inventory {
        address: ServeAddr,
        /// JSON inventory fixture.
        #[arg(long)]
        fixture: PathBuf,
    },
}

fn init_tracing(quiet: bool, verbose: bool) {
    let filter = if quiet {
        EnvFilter::new("off")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).compact().init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);

    let served = match cli.backend {
        Backend::Oracle {
            address,
            table,
            record_limit,
        } => {
            let table = match table {
                Some(path) => OracleTable::load(&path)?,
                None => OracleTable::default(),
            };
            Server::new(Oracle::new(table).with_record_limit(record_limit))
                .listen(address)
                .await
        }
        Backend::Counter { address, seed } => {
            Server::new(counter::dispatcher(Counter::new(seed)))
                .listen(address)
                .await
        }
        Backend::Inventory { address, fixture } => {
            let inventory = StaticInventory::load(&fixture)?;
            Server::new(inventory::dispatcher(Arc::new(inventory)))
                .listen(address)
                .await
        }
    };
    served.context("server stopped")
}
