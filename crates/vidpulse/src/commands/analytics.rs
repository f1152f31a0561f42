//! `vidpulse analytics`: aggregated viewing analytics for one video.

use serde::Serialize;
use tabled::Tabled;

use vidpulse_api::VideoAnalytics;
use vidpulse_core::{ClientConfig, CoreError, VideoQuality};

use crate::cli::{GlobalOpts, OutputFormat, VideoArgs};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct QualityShare {
    label: String,
    views: u64,
    share: f64,
}

#[derive(Tabled)]
struct ShareRow {
    #[tabled(rename = "Quality")]
    label: String,
    #[tabled(rename = "Views")]
    views: u64,
    #[tabled(rename = "Share")]
    share: String,
}

/// Per-quality view shares, highest resolution first; unknown labels last.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
fn shares(analytics: &VideoAnalytics) -> Vec<QualityShare> {
    let total: u64 = analytics.quality_distribution.values().sum();
    let mut shares: Vec<QualityShare> = analytics
        .quality_distribution
        .iter()
        .map(|(label, &views)| QualityShare {
            label: label.clone(),
            views,
            share: if total == 0 {
                0.0
            } else {
                views as f64 / total as f64
            },
        })
        .collect();
    shares.sort_by(|a, b| {
        let rank = |s: &QualityShare| s.label.parse::<VideoQuality>().ok();
        rank(b).cmp(&rank(a)).then_with(|| a.label.cmp(&b.label))
    });
    shares
}

fn detail(analytics: &VideoAnalytics) -> String {
    let mut out = output::render_detail(&[
        ("Video", analytics.video_id.clone()),
        ("Views", analytics.total_views.to_string()),
        ("Unique viewers", analytics.unique_viewers.to_string()),
        (
            "Avg watch time",
            format!("{:.0} s", analytics.average_watch_time),
        ),
        (
            "Completion",
            format!("{:.1}%", analytics.completion_rate * 100.0),
        ),
    ]);
    let shares = shares(analytics);
    if !shares.is_empty() {
        out.push_str("\n\n");
        out.push_str(&output::render_list(
            OutputFormat::Table,
            &shares,
            |s| ShareRow {
                label: s.label.clone(),
                views: s.views,
                share: format!("{:.1}%", s.share * 100.0),
            },
            |s| s.label.clone(),
        ));
    }
    out
}

pub async fn handle(
    config: &ClientConfig,
    args: VideoArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let api = config.api_client()?;
    let analytics = api
        .get_analytics(&args.video_id)
        .await
        .map_err(|e| CoreError::for_video(e, &args.video_id))?;

    let out = output::render_single(global.output, &analytics, detail, |a| {
        a.total_views.to_string()
    });
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn shares_sort_by_resolution() {
        let analytics: VideoAnalytics = serde_json::from_value(serde_json::json!({
            "video_id": "v1",
            "quality_distribution": { "360p": 10, "1080p": 30, "audio": 0, "720p": 60 }
        }))
        .unwrap();

        let shares = shares(&analytics);
        let labels: Vec<&str> = shares.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["1080p", "720p", "360p", "audio"]);
        assert!((shares[1].share - 0.6).abs() < f64::EPSILON);
    }
}
