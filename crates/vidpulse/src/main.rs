mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, CompletionsArgs};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose, cli.global.quiet);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

/// Log to stderr so stdout stays machine-readable. `RUST_LOG` wins over
/// `-v`; `-q` drops everything below errors.
fn init_tracing(verbosity: u8, quiet: bool) {
    let level = match (quiet, verbosity) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_completions(args: &CompletionsArgs) {
    let mut cmd = Cli::command();
    clap_complete::generate(args.shell, &mut cmd, "vidpulse", &mut std::io::stdout());
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let global = &cli.global;
    match cli.command {
        // Local commands: no backend resolution.
        Command::Score(ref args) => commands::offline::handle_score(args, global),
        Command::Recommend(ref args) => commands::offline::handle_recommend(args, global),
        Command::Config(args) => commands::config_cmd::handle(args, global),
        Command::Completions(ref args) => {
            print_completions(args);
            Ok(())
        }

        cmd => {
            let client_config = config::build_client_config(global)?;
            tracing::debug!(command = ?cmd, api_url = %client_config.api_url, "dispatching command");
            commands::dispatch(cmd, &client_config, global).await
        }
    }
}
