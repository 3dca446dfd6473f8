mod config_commands;
mod doctor_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    scrapegate_config::ScrapegateConfig,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "scrapegate", about = "Scrapegate: render and extract web pages over HTTP")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (default: scrapegate.{toml,yaml,yml,json} in the working
    /// directory, then the user config directory).
    #[arg(long, global = true, env = "SCRAPEGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,
    /// Port to listen on (overrides config and `PORT`).
    #[arg(long, global = true)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default when no subcommand is provided).
    Serve,
    /// Validate the configuration file and report errors/warnings.
    Check {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
    /// Audit config, API key and browser installation.
    Doctor {
        /// Also launch the browser once to confirm it starts.
        #[arg(long)]
        launch: bool,
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

/// CLI args override config file and environment values.
fn apply_cli_overrides(config: &mut ScrapegateConfig, cli: &Cli) {
    if let Some(ref bind) = cli.bind {
        config.server.bind = bind.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    match cli.command {
        None | Some(Commands::Serve) => {
            info!(version = env!("CARGO_PKG_VERSION"), "scrapegate starting");
            let mut config = scrapegate_config::load_from(cli.config.as_deref())?;
            apply_cli_overrides(&mut config, &cli);
            scrapegate_gateway::start_server(&config).await
        },
        Some(Commands::Check { verbose }) => {
            config_commands::handle_check(cli.config.as_deref(), verbose)
        },
        Some(Commands::Doctor { launch }) => {
            doctor_commands::handle_doctor(cli.config.as_deref(), launch).await
        },
    }
}
