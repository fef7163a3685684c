//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{path::PathBuf, str::FromStr, time::Duration};

use chrono_tz::Tz;
use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;


const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "cartolina";
const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";
const DEFAULT_ENGINE_CLI_PATH: &str = "card-shot";
const DEFAULT_VIEWPORT_WIDTH: u32 = 600;
const DEFAULT_VIEWPORT_HEIGHT: u32 = 400;
const DEFAULT_DEVICE_SCALE_FACTOR: f64 = 2.0;
const DEFAULT_CARD_SELECTOR: &str = ".card";
const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 30;
const DEFAULT_TIME_ZONE: &str = "Africa/Casablanca";
const DEFAULT_REACTION_MARKER: &str = "🔃";

/// Command-line arguments for the cartolina binary.
#[derive(Debug, Parser)]
#[command(name = "cartolina", version, about = "Card composer and publisher")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "CARTOLINA_CONFIG_FILE",
        value_name = "PATH"
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Compose a card from the given text and publish it to the feed.
    Compose(ComposeArgs),
    /// Render a card to a local file without publishing.
    Render(RenderArgs),
}

#[derive(Debug, Args, Clone)]
pub struct ComposeArgs {
    #[command(flatten)]
    pub overrides: RunOverrides,

    #[command(flatten)]
    pub submission: SubmissionArgs,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub overrides: RunOverrides,

    #[command(flatten)]
    pub submission: SubmissionArgs,

    /// Path of the PNG file to write.
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub out: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct SubmissionArgs {
    /// Card body text.
    #[arg(long, value_name = "TEXT")]
    pub text: String,

    /// Requester handle; the display name is everything before the first
    /// underscore.
    #[arg(long, value_name = "HANDLE")]
    pub handle: String,

    /// Avatar image URL embedded in the card.
    #[arg(long = "avatar-url", value_name = "URL")]
    pub avatar_url: Url,

    /// Seed for the engagement counters (omit for OS entropy).
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RunOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the capture CLI executable path.
    #[arg(long = "render-engine-cli-path", value_name = "PATH")]
    pub engine_cli_path: Option<PathBuf>,

    /// Override the card template document path.
    #[arg(long = "render-template-path", value_name = "PATH")]
    pub template_path: Option<PathBuf>,

    /// Override the render viewport width in pixels.
    #[arg(long = "render-viewport-width", value_name = "PIXELS")]
    pub viewport_width: Option<u32>,

    /// Override the render viewport height in pixels.
    #[arg(long = "render-viewport-height", value_name = "PIXELS")]
    pub viewport_height: Option<u32>,

    /// Override the device scale factor.
    #[arg(long = "render-device-scale-factor", value_name = "FACTOR")]
    pub device_scale_factor: Option<f64>,

    /// Override the render timeout.
    #[arg(long = "render-timeout-seconds", value_name = "SECONDS")]
    pub render_timeout_seconds: Option<u64>,

    /// Override the card time zone (IANA name).
    #[arg(long = "card-time-zone", value_name = "ZONE")]
    pub time_zone: Option<String>,

    /// Toggle the verified badge.
    #[arg(
        long = "card-verified-badge",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub verified_badge: Option<bool>,

    /// Override the canonical reaction marker.
    #[arg(long = "card-reaction-marker", value_name = "EMOJI")]
    pub reaction_marker: Option<String>,
}

/// Fully-resolved deployment settings after precedence resolution and
/// validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    /// Present only when the delivery credentials are configured; the
    /// local render command runs without them.
    pub discord: Option<DiscordSettings>,
    pub render: RenderSettings,
    pub card: CardSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DiscordSettings {
    pub api_base: Url,
    pub bot_token: String,
    pub webhook_id: String,
    pub webhook_token: String,
    pub feed_channel_id: String,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub engine_cli_path: PathBuf,
    pub template_path: Option<PathBuf>,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub device_scale_factor: f64,
    pub selector: String,
    pub omit_background: bool,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CardSettings {
    pub time_zone: Tz,
    pub verified_badge: bool,
    pub reaction_marker: String,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("CARTOLINA").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match &cli.command {
        Command::Compose(args) => raw.apply_overrides(&args.overrides),
        Command::Render(args) => raw.apply_overrides(&args.overrides),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    discord: RawDiscordSettings,
    render: RawRenderSettings,
    card: RawCardSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDiscordSettings {
    api_base: Option<String>,
    bot_token: Option<String>,
    webhook_id: Option<String>,
    webhook_token: Option<String>,
    feed_channel_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    engine_cli_path: Option<PathBuf>,
    template_path: Option<PathBuf>,
    viewport_width: Option<u32>,
    viewport_height: Option<u32>,
    device_scale_factor: Option<f64>,
    selector: Option<String>,
    omit_background: Option<bool>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCardSettings {
    time_zone: Option<String>,
    verified_badge: Option<bool>,
    reaction_marker: Option<String>,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &RunOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(path) = overrides.engine_cli_path.as_ref() {
            self.render.engine_cli_path = Some(path.clone());
        }
        if let Some(path) = overrides.template_path.as_ref() {
            self.render.template_path = Some(path.clone());
        }
        if let Some(width) = overrides.viewport_width {
            self.render.viewport_width = Some(width);
        }
        if let Some(height) = overrides.viewport_height {
            self.render.viewport_height = Some(height);
        }
        if let Some(factor) = overrides.device_scale_factor {
            self.render.device_scale_factor = Some(factor);
        }
        if let Some(seconds) = overrides.render_timeout_seconds {
            self.render.timeout_seconds = Some(seconds);
        }
        if let Some(zone) = overrides.time_zone.as_ref() {
            self.card.time_zone = Some(zone.clone());
        }
        if let Some(verified) = overrides.verified_badge {
            self.card.verified_badge = Some(verified);
        }
        if let Some(marker) = overrides.reaction_marker.as_ref() {
            self.card.reaction_marker = Some(marker.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            discord,
            render,
            card,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            discord: build_discord_settings(discord)?,
            render: build_render_settings(render)?,
            card: build_card_settings(card)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_discord_settings(
    discord: RawDiscordSettings,
) -> Result<Option<DiscordSettings>, LoadError> {
    let trimmed = |value: Option<String>| {
        value.and_then(|text| {
            let text = text.trim().to_string();
            (!text.is_empty()).then_some(text)
        })
    };

    let bot_token = trimmed(discord.bot_token);
    let webhook_id = trimmed(discord.webhook_id);
    let webhook_token = trimmed(discord.webhook_token);
    let feed_channel_id = trimmed(discord.feed_channel_id);

    let (Some(bot_token), Some(webhook_id), Some(webhook_token), Some(feed_channel_id)) =
        (bot_token, webhook_id, webhook_token, feed_channel_id)
    else {
        // Delivery is unconfigured; only local rendering is possible.
        return Ok(None);
    };

    let api_base_text = discord
        .api_base
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
    let api_base = Url::parse(&api_base_text)
        .map_err(|err| LoadError::invalid("discord.api_base", err.to_string()))?;

    Ok(Some(DiscordSettings {
        api_base,
        bot_token,
        webhook_id,
        webhook_token,
        feed_channel_id,
    }))
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let viewport_width = render.viewport_width.unwrap_or(DEFAULT_VIEWPORT_WIDTH);
    if viewport_width == 0 {
        return Err(LoadError::invalid(
            "render.viewport_width",
            "must be greater than zero",
        ));
    }

    let viewport_height = render.viewport_height.unwrap_or(DEFAULT_VIEWPORT_HEIGHT);
    if viewport_height == 0 {
        return Err(LoadError::invalid(
            "render.viewport_height",
            "must be greater than zero",
        ));
    }

    let device_scale_factor = render
        .device_scale_factor
        .unwrap_or(DEFAULT_DEVICE_SCALE_FACTOR);
    if !(device_scale_factor.is_finite() && device_scale_factor > 0.0) {
        return Err(LoadError::invalid(
            "render.device_scale_factor",
            "must be a positive number",
        ));
    }

    let selector = render
        .selector
        .unwrap_or_else(|| DEFAULT_CARD_SELECTOR.to_string());
    if selector.trim().is_empty() {
        return Err(LoadError::invalid("render.selector", "must not be empty"));
    }

    let timeout_secs = render
        .timeout_seconds
        .unwrap_or(DEFAULT_RENDER_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "render.timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(RenderSettings {
        engine_cli_path: render
            .engine_cli_path
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ENGINE_CLI_PATH)),
        template_path: render.template_path,
        viewport_width,
        viewport_height,
        device_scale_factor,
        selector,
        omit_background: render.omit_background.unwrap_or(false),
        timeout: Duration::from_secs(timeout_secs),
    })
}

fn build_card_settings(card: RawCardSettings) -> Result<CardSettings, LoadError> {
    let zone_name = card
        .time_zone
        .unwrap_or_else(|| DEFAULT_TIME_ZONE.to_string());
    let time_zone = zone_name
        .parse::<Tz>()
        .map_err(|err| LoadError::invalid("card.time_zone", err.to_string()))?;

    let reaction_marker = card
        .reaction_marker
        .unwrap_or_else(|| DEFAULT_REACTION_MARKER.to_string());
    if reaction_marker.trim().is_empty() {
        return Err(LoadError::invalid(
            "card.reaction_marker",
            "must not be empty",
        ));
    }

    Ok(CardSettings {
        time_zone,
        verified_badge: card.verified_badge.unwrap_or(false),
        reaction_marker,
    })
}
