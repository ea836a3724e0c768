mod cli;
mod daemon;
mod error;
mod status;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, LogFormat};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose, cli.global.log_format);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, format: LogFormat) {
    let filter = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let path = pfmqtt_config::resolve_config_path(cli.global.config.as_deref());
    tracing::debug!(path = %path.display(), "loading configuration");

    let cfg = pfmqtt_config::load_config(&path)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let config = pfmqtt_config::to_bridge_config(&cfg)
                .map_err(|e| CliError::from_config(e, &path))?;
            daemon::run(config).await
        }
        Command::Status => status::run(&cfg, &path).await,
    }
}
