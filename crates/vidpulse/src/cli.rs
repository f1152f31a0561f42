//! Clap derive structures for the `vidpulse` CLI.
//!
//! Defines the command tree, global flags, and shared value enums. This
//! file is also compiled into `build.rs` for man page generation, so it
//! must only depend on clap.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// vidpulse -- network-quality monitor for adaptive video playback
#[derive(Debug, Parser)]
#[command(
    name = "vidpulse",
    version,
    about = "Measure and score network quality for adaptive video playback",
    long_about = "Probe a video backend, watch a live viewing session's network metrics\n\
        and quality decisions, or evaluate the scorer and recommender offline.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Backend profile to use
    #[arg(long, short = 'p', env = "VIDPULSE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Backend base URL (overrides profile)
    #[arg(long, short = 'u', env = "VIDPULSE_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Bearer token (overrides profile, env and keyring)
    #[arg(long, env = "VIDPULSE_TOKEN", global = true, hide_env = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "VIDPULSE_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "VIDPULSE_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "VIDPULSE_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Measure latency and bandwidth against the backend
    Probe(ProbeArgs),

    /// Open a viewing session and stream its network metrics
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Show a video's metadata and renditions
    Video(VideoArgs),

    /// Show aggregated viewing analytics for a video
    Analytics(VideoArgs),

    /// Stream the backend's dashboard feed
    Dashboard(DashboardArgs),

    /// Score a set of network metrics (offline)
    Score(ScoreArgs),

    /// Recommend a resolution for a quality score (offline)
    Recommend(RecommendArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Backend commands ─────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// Number of latency pings to average
    #[arg(long, short = 'n', default_value = "3")]
    pub count: u32,

    /// Skip the bandwidth download
    #[arg(long)]
    pub no_bandwidth: bool,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Video to open a session for
    pub video_id: String,

    /// Stop after this long (e.g. "30s", "5m"); runs until Ctrl-C otherwise
    #[arg(long, short = 'd')]
    pub duration: Option<String>,

    /// Starting resolution (e.g. "720p"); defaults to the backend's pick
    #[arg(long)]
    pub quality: Option<String>,

    /// Report decisions without applying them
    #[arg(long)]
    pub no_switch: bool,
}

#[derive(Debug, Args)]
pub struct VideoArgs {
    /// Video identifier
    pub video_id: String,
}

#[derive(Debug, Args)]
pub struct DashboardArgs {
    /// Feed URL (defaults to `/ws/dashboard` on the backend host)
    #[arg(long)]
    pub url: Option<String>,

    /// Only show events of this type (repeatable)
    #[arg(long = "type", short = 't')]
    pub types: Vec<String>,
}

// ── Offline commands ─────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ScoreArgs {
    /// Estimated bandwidth in Mbps
    #[arg(long, short = 'b')]
    pub bandwidth: f64,

    /// Mean latency in milliseconds
    #[arg(long, short = 'l')]
    pub latency: f64,

    /// Packet loss fraction (0..=1)
    #[arg(long, default_value = "0")]
    pub packet_loss: f64,

    /// Seconds buffered ahead of the playhead
    #[arg(long, default_value = "30")]
    pub buffer: f64,

    /// Available renditions, comma separated (e.g. "240p,360p,720p")
    #[arg(long, value_delimiter = ',')]
    pub available: Vec<String>,
}

#[derive(Debug, Args)]
pub struct RecommendArgs {
    /// Quality score (1-10)
    #[arg(long, short = 's', value_parser = clap::value_parser!(u8).range(1..=10))]
    pub score: u8,

    /// Available renditions, comma separated (e.g. "240p,360p,720p")
    #[arg(long, value_delimiter = ',')]
    pub available: Vec<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create or update a profile (prompts for anything not given)
    Init(ConfigInitArgs),

    /// Show the resolved configuration
    Show,

    /// Print the config file path
    Path,

    /// Store a profile's token in the system keyring
    SetToken {
        /// Profile name (defaults to the active profile)
        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct ConfigInitArgs {
    /// Profile name
    #[arg(long)]
    pub name: Option<String>,

    /// Make this the default profile
    #[arg(long)]
    pub set_default: bool,

    /// Never prompt; fail if a required value is missing
    #[arg(long)]
    pub non_interactive: bool,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
