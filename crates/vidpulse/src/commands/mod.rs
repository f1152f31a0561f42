//! Command dispatch: bridges CLI args -> core operations -> output formatting.

pub mod analytics;
pub mod config_cmd;
pub mod dashboard;
pub mod offline;
pub mod probe;
pub mod util;
pub mod video;
pub mod watch;

use vidpulse_core::ClientConfig;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a backend-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    config: &ClientConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Probe(args) => probe::handle(config, args, global).await,
        Command::Watch(args) => watch::handle(config, args, global).await,
        Command::Video(args) => video::handle(config, args, global).await,
        Command::Analytics(args) => analytics::handle(config, args, global).await,
        Command::Dashboard(args) => dashboard::handle(config, args, global).await,
        // Offline, config and completions never reach dispatch.
        Command::Score(_) | Command::Recommend(_) | Command::Config(_) | Command::Completions(_) => {
            unreachable!("handled before backend resolution")
        }
    }
}
