//! `vidpulse probe`: one-shot latency and bandwidth measurement.

use serde::Serialize;
use tracing::{debug, warn};

use vidpulse_core::estimator;
use vidpulse_core::probe::{BANDWIDTH_SENTINEL_MBPS, LATENCY_SENTINEL_MS, probe_bandwidth};
use vidpulse_core::{ClientConfig, NetworkCondition, Reading, network_condition, score};

use crate::cli::{GlobalOpts, ProbeArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Debug, Serialize)]
struct ProbeReport {
    api_url: String,
    pings_sent: u32,
    pings_failed: u32,
    latency_ms: f64,
    bandwidth_mbps: Option<f64>,
    bandwidth_measured: bool,
    packet_loss: f64,
    quality_score: u8,
    condition: NetworkCondition,
}

pub async fn handle(
    config: &ClientConfig,
    args: ProbeArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if args.count == 0 {
        return Err(CliError::Validation {
            field: "count".into(),
            reason: "at least one ping is required".into(),
        });
    }

    let api = config.api_client()?;
    let spinner = util::spinner("Pinging backend...", global);

    // A failed ping counts as lost and as the latency sentinel.
    let mut samples = Vec::new();
    let mut pings_failed = 0_u32;
    let mut last_err = None;
    for attempt in 1..=args.count {
        match api.ping().await {
            Ok(rtt) => {
                debug!(attempt, ?rtt, "ping");
                samples.push(rtt.as_secs_f64() * 1000.0);
            }
            Err(e) => {
                warn!(attempt, error = %e, "ping failed, assuming {LATENCY_SENTINEL_MS} ms");
                samples.push(LATENCY_SENTINEL_MS);
                pings_failed += 1;
                last_err = Some(e);
            }
        }
    }

    if pings_failed == args.count {
        spinner.finish_and_clear();
        if let Some(err) = last_err {
            return Err(err.into());
        }
    }

    let latency_ms = estimator::mean(samples.into_iter()).unwrap_or(LATENCY_SENTINEL_MS);
    let packet_loss = f64::from(pings_failed) / f64::from(args.count);

    let (bandwidth_mbps, bandwidth_measured) = if args.no_bandwidth {
        (None, false)
    } else {
        spinner.set_message("Measuring bandwidth...");
        let probe = probe_bandwidth(&api).await;
        (Some(probe.mbps), probe.measured())
    };
    spinner.finish_and_clear();

    let quality_score = score(&Reading {
        bandwidth_mbps: bandwidth_mbps.unwrap_or(BANDWIDTH_SENTINEL_MBPS),
        latency_ms,
        packet_loss,
        buffer_health: config.monitoring.buffer_target,
    });

    let report = ProbeReport {
        api_url: config.api_url.to_string(),
        pings_sent: args.count,
        pings_failed,
        latency_ms,
        bandwidth_mbps,
        bandwidth_measured,
        packet_loss,
        quality_score,
        condition: network_condition(quality_score),
    };

    let color = output::should_color(global.color);
    let out = output::render_single(
        global.output,
        &report,
        |r| {
            let bandwidth = match (r.bandwidth_mbps, r.bandwidth_measured) {
                (None, _) => "skipped".to_owned(),
                (Some(mbps), true) => format!("{mbps:.2} Mbps"),
                (Some(mbps), false) => format!("{mbps:.2} Mbps (test failed, fallback)"),
            };
            output::render_detail(&[
                ("Backend", r.api_url.clone()),
                ("Latency", format!("{:.1} ms", r.latency_ms)),
                ("Pings", format!("{} sent, {} failed", r.pings_sent, r.pings_failed)),
                ("Bandwidth", bandwidth),
                ("Score", format!("{}/10", r.quality_score)),
                ("Condition", output::paint_condition(r.condition, color)),
            ])
        },
        |r| r.quality_score.to_string(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
