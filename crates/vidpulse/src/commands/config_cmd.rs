//! Config subcommand handlers.

use std::io::IsTerminal;

use dialoguer::{Input, Password, Select};
use secrecy::SecretString;

use vidpulse_config::{Profile, store_token};

use crate::cli::{ConfigArgs, ConfigCommand, ConfigInitArgs, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

const DEFAULT_API_URL: &str = "http://localhost:8000";
const REDACTED: &str = "********";

// ── Helpers ─────────────────────────────────────────────────────────

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn missing(field: &str) -> CliError {
    CliError::Validation {
        field: field.into(),
        reason: "required when running non-interactively".into(),
    }
}

/// Copy of the config safe to print: plaintext tokens are masked.
fn redacted(mut cfg: Config) -> Config {
    for profile in cfg.profiles.values_mut() {
        if profile.token.is_some() {
            profile.token = Some(REDACTED.into());
        }
    }
    cfg
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init(init_args) => init(&init_args, global),

        ConfigCommand::Show => {
            let cfg = redacted(config::load_config()?);
            let out = output::render_single(
                global.output,
                &cfg,
                |c| toml::to_string_pretty(c).unwrap_or_else(|e| format!("<unprintable: {e}>")),
                |c| {
                    let mut names: Vec<&str> = c.profiles.keys().map(String::as_str).collect();
                    names.sort_unstable();
                    names.join("\n")
                },
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::SetToken { name } => {
            let cfg = config::load_config_or_default();
            let name = name.unwrap_or_else(|| config::active_profile_name(global, &cfg));
            let token = match global.token {
                Some(ref token) => token.clone(),
                None if std::io::stdin().is_terminal() => Password::new()
                    .with_prompt(format!("Token for profile '{name}'"))
                    .interact()
                    .map_err(prompt_err)?,
                None => return Err(missing("token")),
            };
            store_token(&name, &SecretString::from(token))?;
            if !global.quiet {
                eprintln!("✓ Token for profile '{name}' stored in system keyring");
            }
            Ok(())
        }
    }
}

// ── Init ────────────────────────────────────────────────────────────

fn init(args: &ConfigInitArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let interactive = !args.non_interactive && std::io::stdin().is_terminal();
    let mut cfg = config::load_config_or_default();

    if interactive {
        eprintln!("vidpulse configuration");
        eprintln!("   Config path: {}\n", config::config_path().display());
    }

    // 1. Profile name
    let name = match args.name.clone().or_else(|| global.profile.clone()) {
        Some(name) => name,
        None if interactive => Input::new()
            .with_prompt("Profile name")
            .default("default".into())
            .interact_text()
            .map_err(prompt_err)?,
        None => "default".into(),
    };

    // 2. Backend URL
    let api_url = match global.api_url.clone() {
        Some(url) => url,
        None if interactive => Input::new()
            .with_prompt("Backend URL")
            .default(DEFAULT_API_URL.into())
            .interact_text()
            .map_err(prompt_err)?,
        None => return Err(missing("api-url")),
    };
    if url::Url::parse(&api_url).is_err() {
        return Err(CliError::Validation {
            field: "api-url".into(),
            reason: format!("invalid URL: {api_url}"),
        });
    }

    // 3. Token (optional; anonymous backends need none)
    let token = match global.token.clone() {
        Some(token) => Some(token),
        None if interactive => {
            let entered = Password::new()
                .with_prompt("Bearer token (leave empty for none)")
                .allow_empty_password(true)
                .interact()
                .map_err(prompt_err)?;
            (!entered.is_empty()).then_some(entered)
        }
        None => None,
    };

    // Keep monitoring tuning from an existing profile of the same name.
    let mut profile = cfg
        .profiles
        .remove(&name)
        .map(|old| Profile {
            api_url: api_url.clone(),
            ..old
        })
        .unwrap_or_else(|| Profile::new(api_url.clone()));
    if global.insecure {
        profile.insecure = Some(true);
    }
    if let Some(secs) = global.timeout {
        profile.timeout = Some(secs);
    }

    if let Some(token) = token {
        let use_keyring = if interactive {
            Select::new()
                .with_prompt("Where to store the token?")
                .items(&["System keyring (recommended)", "Config file (plaintext)"])
                .default(0)
                .interact()
                .map_err(prompt_err)?
                == 0
        } else {
            true
        };
        if use_keyring {
            store_token(&name, &SecretString::from(token))?;
            profile.token = None;
            if !global.quiet {
                eprintln!("   ✓ Token stored in system keyring");
            }
        } else {
            profile.token = Some(token);
        }
    }

    cfg.profiles.insert(name.clone(), profile);
    let has_default = cfg
        .default_profile
        .as_ref()
        .is_some_and(|d| cfg.profiles.contains_key(d));
    if args.set_default || !has_default {
        cfg.default_profile = Some(name.clone());
    }

    let path = config::save_config(&cfg)?;
    if !global.quiet {
        eprintln!("✓ Configuration written to {}", path.display());
        eprintln!("  Profile: {name}");
        eprintln!("  Test it: vidpulse probe --profile {name}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_masks_plaintext_tokens() {
        let mut cfg = Config::default();
        let mut profile = Profile::new("https://learn.example.com");
        profile.token = Some("s3cret".into());
        cfg.profiles.insert("default".into(), profile);
        cfg.profiles
            .insert("anon".into(), Profile::new("http://localhost:8000"));

        let cfg = redacted(cfg);
        assert_eq!(cfg.profiles["default"].token.as_deref(), Some(REDACTED));
        assert_eq!(cfg.profiles["anon"].token, None);
    }
}
