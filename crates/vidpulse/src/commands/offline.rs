//! Offline commands: run the scorer and recommender without a backend.

use serde::Serialize;
use strum::IntoEnumIterator;

use vidpulse_core::{NetworkCondition, Reading, VideoQuality, network_condition, recommend, score};

use crate::cli::{GlobalOpts, RecommendArgs, ScoreArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Debug, Serialize)]
struct ScoreReport {
    bandwidth_mbps: f64,
    latency_ms: f64,
    packet_loss: f64,
    buffer_health: f64,
    quality_score: u8,
    condition: NetworkCondition,
    recommended_quality: VideoQuality,
}

#[derive(Debug, Serialize)]
struct Recommendation {
    quality_score: u8,
    condition: NetworkCondition,
    available: Vec<VideoQuality>,
    recommended_quality: VideoQuality,
}

/// Offer every rendition when none were given.
fn available_or_all(labels: &[String]) -> Result<Vec<VideoQuality>, CliError> {
    if labels.is_empty() {
        Ok(VideoQuality::iter().collect())
    } else {
        util::parse_qualities(labels)
    }
}

fn check_non_negative(field: &str, value: f64) -> Result<(), CliError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(CliError::Validation {
            field: field.into(),
            reason: format!("must be a non-negative number, got {value}"),
        })
    }
}

pub fn handle_score(args: &ScoreArgs, global: &GlobalOpts) -> Result<(), CliError> {
    check_non_negative("bandwidth", args.bandwidth)?;
    check_non_negative("latency", args.latency)?;
    check_non_negative("buffer", args.buffer)?;
    if !(0.0..=1.0).contains(&args.packet_loss) {
        return Err(CliError::Validation {
            field: "packet-loss".into(),
            reason: format!("must be within 0..=1, got {}", args.packet_loss),
        });
    }

    let available = available_or_all(&args.available)?;
    let quality_score = score(&Reading {
        bandwidth_mbps: args.bandwidth,
        latency_ms: args.latency,
        packet_loss: args.packet_loss,
        buffer_health: args.buffer,
    });
    let report = ScoreReport {
        bandwidth_mbps: args.bandwidth,
        latency_ms: args.latency,
        packet_loss: args.packet_loss,
        buffer_health: args.buffer,
        quality_score,
        condition: network_condition(quality_score),
        recommended_quality: recommend(quality_score, &available),
    };

    let color = output::should_color(global.color);
    let out = output::render_single(
        global.output,
        &report,
        |r| {
            output::render_detail(&[
                ("Score", format!("{}/10", r.quality_score)),
                ("Condition", output::paint_condition(r.condition, color)),
                ("Recommended", r.recommended_quality.to_string()),
                ("Bandwidth", format!("{:.2} Mbps", r.bandwidth_mbps)),
                ("Latency", format!("{:.1} ms", r.latency_ms)),
                ("Packet loss", format!("{:.2}%", r.packet_loss * 100.0)),
                ("Buffer", format!("{:.1} s", r.buffer_health)),
            ])
        },
        |r| r.quality_score.to_string(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

pub fn handle_recommend(args: &RecommendArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let available = available_or_all(&args.available)?;
    let rec = Recommendation {
        quality_score: args.score,
        condition: network_condition(args.score),
        recommended_quality: recommend(args.score, &available),
        available,
    };

    let color = output::should_color(global.color);
    let out = output::render_single(
        global.output,
        &rec,
        |r| {
            let offered: Vec<String> = r.available.iter().map(ToString::to_string).collect();
            output::render_detail(&[
                ("Score", format!("{}/10", r.quality_score)),
                ("Condition", output::paint_condition(r.condition, color)),
                ("Available", offered.join(", ")),
                ("Recommended", r.recommended_quality.to_string()),
            ])
        },
        |r| r.recommended_quality.to_string(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
