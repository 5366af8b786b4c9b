//! ilprobe CLI entry point.

use clap::Parser;
use ilprobe::cli::{self, Cli, Commands, EXIT_ERROR};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "ILPROBE_LOG";

fn init_logging(verbose: bool) {
    let default = if verbose { "ilprobe=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match &cli.command {
        Commands::Ask(args) => cli::run_ask(&cli, args).await,
        Commands::Analyze(args) => cli::run_analyze(&cli, args).await,
        Commands::Preview(args) => cli::run_preview(args),
        Commands::Config(args) => cli::run_config(&cli, args),
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            EXIT_ERROR
        }
    };

    std::process::exit(exit_code);
}
