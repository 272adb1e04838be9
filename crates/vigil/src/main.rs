//! vigil: account keepalive fleet
//!
//! Subcommands:
//! - `run`: supervise every eligible account indefinitely
//! - `paused`: list accounts retired by terminal credential failures

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vigil::fleet::{self, FleetConfig};
use vigil_store::StateStore;

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Account keepalive fleet", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the fleet (one supervisor per eligible account)
    Run {
        /// Account list (CSV with Name, Browser_ID, Token, Proxy, UID)
        #[arg(long, env = "VIGIL_ACCOUNTS", default_value = "accounts.csv")]
        accounts: PathBuf,

        /// Directory holding the durable state documents
        #[arg(long, env = "VIGIL_STATE_DIR", default_value = ".")]
        state_dir: PathBuf,

        /// Service endpoint
        #[arg(long, env = "VIGIL_BASE_URL", default_value = "https://api.aigaea.net")]
        base_url: String,

        /// Ignore per-account proxies and connect directly
        #[arg(long)]
        no_proxy: bool,

        /// Enable the daily training job
        #[arg(long)]
        with_training: bool,

        /// Heartbeat interval in seconds
        #[arg(long, default_value = "600")]
        ping_interval: u64,

        /// Earnings poll interval in seconds
        #[arg(long, default_value = "900")]
        earnings_interval: u64,

        /// Startup jitter ceiling in seconds (default derives from job mix)
        #[arg(long)]
        startup_jitter: Option<u64>,
    },

    /// List paused accounts
    Paused {
        /// Directory holding the durable state documents
        #[arg(long, env = "VIGIL_STATE_DIR", default_value = ".")]
        state_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "vigil=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            accounts,
            state_dir,
            base_url,
            no_proxy,
            with_training,
            ping_interval,
            earnings_interval,
            startup_jitter,
        } => {
            fleet::run(FleetConfig {
                accounts_path: accounts,
                state_dir,
                base_url,
                use_proxy: !no_proxy,
                with_training,
                ping_interval: Duration::from_secs(ping_interval),
                earnings_interval: Duration::from_secs(earnings_interval),
                startup_jitter_secs: startup_jitter,
            })
            .await
        }

        Commands::Paused { state_dir } => {
            let store = StateStore::new(&state_dir);
            let mut paused: Vec<_> = store.load_paused().await.into_values().collect();
            paused.sort_by(|a, b| a.paused_at.cmp(&b.paused_at));

            if paused.is_empty() {
                println!("no paused accounts");
                return Ok(());
            }

            for record in paused {
                println!(
                    "{}  {}  paused {}  ({})",
                    record.uid, record.name, record.paused_at, record.reason
                );
            }
            Ok(())
        }
    }
}
