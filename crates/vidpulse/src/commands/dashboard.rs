//! `vidpulse dashboard`: tail the backend's dashboard feed.

use secrecy::ExposeSecret;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use vidpulse_api::{DashboardEvent, DashboardFeed, FeedState};
use vidpulse_core::ClientConfig;

use crate::cli::{DashboardArgs, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

fn render_event(format: OutputFormat, event: &DashboardEvent) -> String {
    match format {
        OutputFormat::Table => format!(
            "{}  {:<20} {}",
            event.timestamp.as_deref().unwrap_or("-"),
            event.kind,
            output::render_json_compact(&event.data)
        ),
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json_compact(event),
        OutputFormat::Yaml => format!("---\n{}", output::render_yaml(event).trim_end()),
        OutputFormat::Plain => event.kind.clone(),
    }
}

pub async fn handle(
    config: &ClientConfig,
    args: DashboardArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let url = match args.url {
        Some(ref raw) => raw.parse::<url::Url>().map_err(|_| CliError::Validation {
            field: "url".into(),
            reason: format!("invalid URL: {raw}"),
        })?,
        None => config.dashboard_url()?,
    };

    let cancel = CancellationToken::new();
    let feed = DashboardFeed::connect(
        url,
        config.monitoring.reconnect_config(),
        config.token.as_ref().map(|t| t.expose_secret().to_owned()),
        cancel.clone(),
    );
    let mut events = feed.subscribe();
    let mut state = feed.state();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let result = loop {
        tokio::select! {
            _ = &mut ctrl_c => break Ok(()),

            ev = events.recv() => match ev {
                Ok(event) => {
                    if args.types.is_empty() || args.types.contains(&event.kind) {
                        output::print_output(&render_event(global.output, &event), global.quiet);
                    }
                }
                Err(RecvError::Lagged(n)) => warn!(skipped = n, "dashboard stream lagged"),
                Err(RecvError::Closed) => break Ok(()),
            },

            changed = state.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let current = state.borrow_and_update().clone();
                debug!(state = ?current, "dashboard feed state");
                match current {
                    FeedState::Failed => {
                        break Err(CliError::FeedFailed {
                            attempts: config.monitoring.max_reconnect_attempts,
                        });
                    }
                    FeedState::Reconnecting { attempt, retry_in } if !global.quiet => {
                        eprintln!(
                            "Dashboard feed lost, reconnecting in {} (attempt {attempt})",
                            humantime::format_duration(retry_in)
                        );
                    }
                    _ => {}
                }
            }
        }
    };

    feed.shutdown();
    result
}
