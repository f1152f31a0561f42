//! Profile resolution: config file + CLI flag overrides.
//!
//! Loading and credential lookup live in `vidpulse-config`; this module
//! only layers the global flags on top and produces a `ClientConfig`.

use std::time::Duration;

use secrecy::SecretString;
use tracing::debug;

use vidpulse_config::Profile;
use vidpulse_core::{ClientConfig, NetworkMonitoringConfig, TlsVerification};

pub use vidpulse_config::{Config, config_path, load_config, load_config_or_default, save_config};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .unwrap_or_else(|| config.default_profile_name().to_owned())
}

/// Build a `ClientConfig` from the config file, profile, and CLI overrides.
///
/// Precedence: flag/env > profile > global defaults.
pub fn build_client_config(global: &GlobalOpts) -> Result<ClientConfig, CliError> {
    let cfg = load_config()?;
    let profile_name = active_profile_name(global, &cfg);

    if let Some(profile) = cfg.profiles.get(&profile_name) {
        debug!(profile = %profile_name, "using configured profile");
        let default_timeout = Duration::from_secs(cfg.defaults.timeout);
        return resolve_profile(profile, &profile_name, default_timeout, global);
    }

    // An explicitly named profile must exist.
    if global.profile.is_some() {
        let mut available: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
        available.sort_unstable();
        return Err(CliError::ProfileNotFound {
            name: profile_name,
            available: if available.is_empty() {
                "(none)".into()
            } else {
                available.join(", ")
            },
        });
    }

    // No profile -- build from flags / env vars alone.
    let url_str = global.api_url.as_deref().ok_or_else(|| CliError::NoConfig {
        path: config_path().display().to_string(),
    })?;

    Ok(ClientConfig {
        api_url: parse_api_url(url_str)?,
        token: global.token.clone().map(SecretString::from),
        tls: if global.insecure {
            TlsVerification::DangerAcceptInvalid
        } else {
            TlsVerification::SystemDefaults
        },
        timeout: Duration::from_secs(global.timeout.unwrap_or(cfg.defaults.timeout)),
        monitoring: NetworkMonitoringConfig::default(),
    })
}

/// Translate a profile + global flags into a `ClientConfig`.
pub fn resolve_profile(
    profile: &Profile,
    profile_name: &str,
    default_timeout: Duration,
    global: &GlobalOpts,
) -> Result<ClientConfig, CliError> {
    let mut client = vidpulse_config::profile_to_client_config(profile, profile_name)?;

    if let Some(ref url) = global.api_url {
        client.api_url = parse_api_url(url)?;
    }
    if let Some(ref token) = global.token {
        client.token = Some(SecretString::from(token.clone()));
    }
    if global.insecure {
        client.tls = TlsVerification::DangerAcceptInvalid;
    }
    client.timeout = match (global.timeout, profile.timeout) {
        (Some(secs), _) | (None, Some(secs)) => Duration::from_secs(secs),
        (None, None) => default_timeout,
    };

    Ok(client)
}

fn parse_api_url(raw: &str) -> Result<url::Url, CliError> {
    raw.parse().map_err(|_| CliError::Validation {
        field: "api-url".into(),
        reason: format!("invalid URL: {raw}"),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::Parser;

    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["vidpulse"];
        argv.extend_from_slice(args);
        argv.extend_from_slice(&["recommend", "--score", "5"]);
        Cli::try_parse_from(argv).unwrap().global
    }

    #[test]
    fn flags_override_profile() {
        let mut profile = Profile::new("https://learn.example.com");
        profile.timeout = Some(12);
        let opts = global(&["--api-url", "http://localhost:9000", "--insecure", "--token", "t0k"]);

        let client = resolve_profile(&profile, "default", Duration::from_secs(30), &opts).unwrap();
        assert_eq!(client.api_url.as_str(), "http://localhost:9000/");
        assert_eq!(client.tls, TlsVerification::DangerAcceptInvalid);
        assert!(client.token.is_some());
        assert_eq!(client.timeout, Duration::from_secs(12));
    }

    #[test]
    fn timeout_falls_back_to_defaults() {
        let profile = Profile::new("https://learn.example.com");
        let opts = global(&[]);
        let client = resolve_profile(&profile, "default", Duration::from_secs(45), &opts).unwrap();
        assert_eq!(client.timeout, Duration::from_secs(45));

        let opts = global(&["--timeout", "5"]);
        let client = resolve_profile(&profile, "default", Duration::from_secs(45), &opts).unwrap();
        assert_eq!(client.timeout, Duration::from_secs(5));
    }

    #[test]
    fn profile_flag_wins_over_default_profile() {
        let cfg = Config::default();
        assert_eq!(active_profile_name(&global(&[]), &cfg), "default");
        assert_eq!(active_profile_name(&global(&["-p", "lab"]), &cfg), "lab");
    }
}
