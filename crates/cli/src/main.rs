mod config_commands;
mod db_commands;
mod run;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "joingate", about = "Joingate: force-subscribe gate and broadcast bot")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file to load instead of searching the standard locations.
    #[arg(long, global = true, env = "JOINGATE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot (default when no subcommand is provided).
    Run,
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
    /// Registry maintenance (migrate, stats, ban, unban).
    Db {
        #[command(subcommand)]
        action: db_commands::DbAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Load the config from `--config` if given, otherwise from the standard
/// locations. Env overrides apply either way.
fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<joingate_config::JoingateConfig> {
    match path {
        Some(path) => {
            let mut config = joingate_config::load_config(path)?;
            joingate_config::apply_env_overrides(&mut config);
            Ok(config)
        },
        None => Ok(joingate_config::discover_and_load()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "joingate starting");

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        None | Some(Commands::Run) => run::run_bot(config).await,
        Some(Commands::Config { action }) => config_commands::handle_config(action, &config),
        Some(Commands::Db { action }) => db_commands::handle_db(action, &config).await,
    }
}
