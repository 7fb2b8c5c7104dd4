use anyhow::Result;
use clap::{Parser, Subcommand};
use rdk_schemas::Timeframe;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "rdk")]
#[command(about = "ReadyDesk strategy validation CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (preset overrides -> site -> experiment...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// List the strategies this binary can validate
    Strategies,

    /// Run the full validation pipeline for one strategy
    Validate {
        /// Directory of `<SYMBOL>_<timeframe>.csv` files
        #[arg(long)]
        data_dir: String,

        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<String>,

        /// Strategy id (see `rdk strategies`)
        #[arg(long)]
        strategy: String,

        /// Comma-separated symbols, e.g. BTCUSDT,ETHUSDT
        #[arg(long, required = true, value_delimiter = ',')]
        symbols: Vec<String>,

        /// Comma-separated timeframes, e.g. 1h,4h
        #[arg(long, required = true, value_delimiter = ',')]
        timeframes: Vec<Timeframe>,

        #[arg(long, default_value_t = 365)]
        lookback_days: u32,

        /// Bootstrap simulation count
        #[arg(long, default_value_t = 1000)]
        simulations: usize,

        /// Append the full response to a result store directory
        #[arg(long)]
        store_dir: Option<String>,

        /// Write readiness_assessment.json into this directory
        #[arg(long)]
        out: Option<String>,

        /// Print the full response as JSON instead of the summary
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Stored validation results
    Results {
        #[command(subcommand)]
        cmd: ResultsCmd,
    },
}

#[derive(Subcommand)]
enum ResultsCmd {
    /// List stored runs, oldest first
    List {
        #[arg(long)]
        store_dir: String,

        #[arg(long)]
        strategy: Option<String>,
    },

    /// Print the latest stored response for a strategy
    Latest {
        #[arg(long)]
        store_dir: String,

        #[arg(long)]
        strategy: String,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Logs go to stderr; stdout carries the key=value results.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // dev-time convenience; missing file is fine
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = rdk_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Strategies => {
            for id in rdk_backtest::reference::registry()?.list() {
                println!("{id}");
            }
        }

        Commands::Validate {
            data_dir,
            config_paths,
            strategy,
            symbols,
            timeframes,
            lookback_days,
            simulations,
            store_dir,
            out,
            json,
        } => {
            commands::validate::run(commands::validate::ValidateArgs {
                data_dir,
                config_paths,
                strategy,
                symbols,
                timeframes,
                lookback_days,
                simulations,
                store_dir,
                out,
                json,
            })
            .await?;
        }

        Commands::Results { cmd } => match cmd {
            ResultsCmd::List {
                store_dir,
                strategy,
            } => commands::results::list(&store_dir, strategy.as_deref())?,
            ResultsCmd::Latest {
                store_dir,
                strategy,
            } => commands::results::latest(&store_dir, &strategy)?,
        },
    }

    Ok(())
}
