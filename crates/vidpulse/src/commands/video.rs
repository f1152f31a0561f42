//! `vidpulse video`: metadata and renditions for one video.

use tabled::Tabled;

use vidpulse_api::{VideoInfo, VideoQualityInfo};
use vidpulse_core::{ClientConfig, CoreError, VideoQuality};

use crate::cli::{GlobalOpts, OutputFormat, VideoArgs};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct RenditionRow {
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Resolution")]
    resolution: String,
    #[tabled(rename = "Bitrate")]
    bitrate: String,
    #[tabled(rename = "FPS")]
    fps: u32,
    #[tabled(rename = "Codec")]
    codec: String,
    #[tabled(rename = "Adaptive")]
    adaptive: &'static str,
}

impl From<&VideoQualityInfo> for RenditionRow {
    fn from(q: &VideoQualityInfo) -> Self {
        Self {
            label: q.label.clone(),
            resolution: format!("{}x{}", q.width, q.height),
            bitrate: format!("{} kbps", q.bitrate),
            fps: q.fps,
            codec: if q.codec.is_empty() {
                "-".into()
            } else {
                q.codec.clone()
            },
            adaptive: if q.label.parse::<VideoQuality>().is_ok() {
                "yes"
            } else {
                "no"
            },
        }
    }
}

fn detail(video: &VideoInfo) -> String {
    let mut out = output::render_detail(&[
        ("ID", video.id.clone()),
        ("Title", video.title.clone()),
        ("Duration", format_duration(video.duration)),
        (
            "Description",
            video.description.clone().unwrap_or_else(|| "-".into()),
        ),
    ]);
    if !video.qualities.is_empty() {
        out.push_str("\n\n");
        out.push_str(&output::render_list(
            OutputFormat::Table,
            &video.qualities,
            |q| RenditionRow::from(q),
            |q| q.label.clone(),
        ));
    }
    out
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::as_conversions)]
fn format_duration(secs: f64) -> String {
    if !secs.is_finite() || secs <= 0.0 {
        return "-".into();
    }
    let total = secs.round() as u64;
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

pub async fn handle(
    config: &ClientConfig,
    args: VideoArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let api = config.api_client()?;
    let video = api
        .get_video(&args.video_id)
        .await
        .map_err(|e| CoreError::for_video(e, &args.video_id))?;

    let out = output::render_single(global.output, &video, detail, |v| {
        v.qualities
            .iter()
            .map(|q| q.label.clone())
            .collect::<Vec<_>>()
            .join("\n")
    });
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_render_as_clock() {
        assert_eq!(format_duration(3725.4), "1:02:05");
        assert_eq!(format_duration(0.0), "-");
    }
}
