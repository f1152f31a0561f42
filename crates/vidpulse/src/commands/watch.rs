//! `vidpulse watch`: open a viewing session and stream its metrics and
//! quality decisions until Ctrl-C, expiry, or `--duration` elapses.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use vidpulse_core::{
    ClientConfig, NetworkMonitor, PlaybackSession, PlaybackState, QualityDecision,
};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(
    config: &ClientConfig,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let duration = args.duration.as_deref().map(util::parse_duration).transpose()?;
    let start_quality = args.quality.as_deref().map(util::parse_quality).transpose()?;

    let mut monitoring = config.monitoring.clone();
    if args.no_switch {
        monitoring.auto_quality_switching = false;
    }

    let api = Arc::new(config.api_client()?);
    let cancel = CancellationToken::new();
    let monitor = NetworkMonitor::spawn_with_prober(monitoring, Arc::clone(&api), cancel.clone());

    let session = match PlaybackSession::start(api, &args.video_id, monitor.clone(), config).await
    {
        Ok(session) => session,
        Err(e) => {
            monitor.shutdown().await;
            return Err(e.into());
        }
    };
    info!(session_id = session.session_id(), "watching session");
    if !session.socket_open() && !global.quiet {
        eprintln!("Session socket unavailable; reporting status over REST");
    }

    if let Some(quality) = start_quality {
        let current = session.state().current_quality;
        if let Err(e) = session.change_quality(current, quality, "manual").await {
            warn!(error = %e, "quality change not delivered");
        }
    }

    let result = stream_until_done(&session, &monitor, duration, global).await;

    session.end().await;
    monitor.shutdown().await;
    cancel.cancel();
    result?;

    print_summary(&session.state(), global);
    Ok(())
}

async fn stream_until_done(
    session: &PlaybackSession,
    monitor: &NetworkMonitor,
    duration: Option<std::time::Duration>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(global.color);
    let mut metrics = monitor.metrics();
    let mut decisions = monitor.decisions();
    let mut state = session.subscribe_state();

    let deadline = async {
        match duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            () = &mut deadline => break,

            m = metrics.changed() => match m {
                Some(m) => output::print_output(
                    &output::render_metrics_line(global.output, &m, color),
                    global.quiet,
                ),
                None => break,
            },

            d = decisions.recv() => match d {
                Ok(decision) => announce_decision(&decision, global),
                Err(RecvError::Lagged(n)) => warn!(skipped = n, "decision stream lagged"),
                Err(RecvError::Closed) => break,
            },

            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                if state.borrow_and_update().expired {
                    return Err(CliError::SessionExpired {
                        session_id: session.session_id().to_owned(),
                    });
                }
            }
        }
    }
    Ok(())
}

/// The session applies the switch; this only tells the viewer.
fn announce_decision(decision: &QualityDecision, global: &GlobalOpts) {
    if !global.quiet && global.output == OutputFormat::Table {
        eprintln!(
            "switch {} -> {} ({})",
            decision.from, decision.to, decision.reason
        );
    }
}

fn print_summary(state: &PlaybackState, global: &GlobalOpts) {
    if global.output != OutputFormat::Table {
        return;
    }
    let out = output::render_detail(&[
        (
            "Final quality",
            state
                .current_quality
                .map_or_else(|| "-".into(), |q| q.to_string()),
        ),
        ("Quality changes", state.quality_changes.to_string()),
        (
            "Last score",
            state
                .quality_score
                .map_or_else(|| "-".into(), |s| format!("{s}/10")),
        ),
        (
            "Socket closed",
            state.socket_closed.clone().unwrap_or_else(|| "-".into()),
        ),
    ]);
    if !global.quiet {
        eprintln!("\n{out}");
    }
}
