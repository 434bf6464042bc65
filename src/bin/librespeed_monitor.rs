use std::path::PathBuf;

use clap::{Parser, Subcommand};
use librespeed_monitor::campaign;
use librespeed_monitor::config::{self, Config};
use librespeed_monitor::emitter::{Emitter, HumanReadableEmitter, JsonEmitter};
use librespeed_monitor::store::{ResultSink, SqliteStore};

#[derive(Clone, Debug, clap::ValueEnum)]
enum Format {
    Human,
    Json,
}

#[derive(Parser, Debug)]
struct Cli {
    /// Settings file (TOML)
    #[arg(long, default_value = "librespeed.toml")]
    config: PathBuf,
    /// Output format to use: 'human' or 'json' for batch processing
    #[arg(long, default_value = "human")]
    format: Format,
    /// Emit summary and errors only
    #[arg(long)]
    quiet: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Test every configured server and save the results (default)
    Run,
    /// Show stored results, newest first
    History {
        /// Maximum number of results
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Only results for this server name
        #[arg(long)]
        server: Option<String>,
    },
    /// Show averages for one server URL
    Stats {
        #[arg(long)]
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;
    config::init_logging(&config.logging)?;

    let mut emitter: Box<dyn Emitter> = match cli.format {
        Format::Human => Box::new(HumanReadableEmitter::new(std::io::stdout())),
        Format::Json => Box::new(JsonEmitter::new(std::io::stdout())),
    };

    let command = cli.command.unwrap_or(Command::Run);
    if matches!(command, Command::Run) && config.servers.is_empty() {
        eprintln!("error: no servers configured in {}", cli.config.display());
        std::process::exit(1);
    }

    let mut store = SqliteStore::open(&config.storage.path)?;

    let outcome = match command {
        Command::Run => campaign::run(&config, &mut store, emitter.as_mut(), cli.quiet)
            .await
            .map(|_| ()),
        Command::History { limit, server } => store
            .history(limit, server.as_deref())
            .and_then(|records| emitter.on_history(&records)),
        Command::Stats { url } => store
            .stats(&url)
            .and_then(|stats| emitter.on_stats(&stats)),
    };

    store.close()?;
    outcome?;

    Ok(())
}
