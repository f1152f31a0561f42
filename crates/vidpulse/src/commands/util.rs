//! Shared helpers for command handlers.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use vidpulse_core::VideoQuality;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Parse rendition labels like `"720p"`, sorted ascending and deduplicated.
pub fn parse_qualities(labels: &[String]) -> Result<Vec<VideoQuality>, CliError> {
    let mut qualities = labels
        .iter()
        .map(|label| parse_quality(label))
        .collect::<Result<Vec<_>, _>>()?;
    qualities.sort_unstable();
    qualities.dedup();
    Ok(qualities)
}

pub fn parse_quality(label: &str) -> Result<VideoQuality, CliError> {
    label.trim().parse().map_err(|_| CliError::Validation {
        field: "quality".into(),
        reason: format!("unknown rendition '{label}', expected one of 240p, 360p, 480p, 720p, 1080p"),
    })
}

/// Parse a human duration such as `"90s"` or `"5m"`.
pub fn parse_duration(raw: &str) -> Result<Duration, CliError> {
    humantime::parse_duration(raw).map_err(|e| CliError::Validation {
        field: "duration".into(),
        reason: e.to_string(),
    })
}

/// Spinner on stderr while a request is in flight. Hidden when quiet or
/// when stderr is not a terminal.
pub fn spinner(message: &str, global: &GlobalOpts) -> ProgressBar {
    if global.quiet || !std::io::IsTerminal::is_terminal(&std::io::stderr()) {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_owned());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn qualities_are_sorted_and_deduplicated() {
        let labels = vec!["720p".into(), " 240p".into(), "720p".into()];
        assert_eq!(
            parse_qualities(&labels).unwrap(),
            vec![VideoQuality::P240, VideoQuality::P720]
        );
    }

    #[test]
    fn unknown_label_is_a_validation_error() {
        assert!(matches!(
            parse_quality("4k"),
            Err(CliError::Validation { .. })
        ));
    }

    #[test]
    fn human_durations_parse() {
        assert_eq!(parse_duration("90s").unwrap(), Duration::from_secs(90));
        assert!(parse_duration("soon").is_err());
    }
}
