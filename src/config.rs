use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api;

const DEFAULT_ENV_PREFIX: &str = "REELS";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub viewer: ViewerConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,
    #[serde(default = "default_share_origin")]
    pub share_origin: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            gateway_url: default_gateway_url(),
            share_origin: default_share_origin(),
            user_agent: default_user_agent(),
            timeout: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    api::DEFAULT_BASE_URL.to_string()
}

fn default_gateway_url() -> String {
    api::DEFAULT_GATEWAY_URL.to_string()
}

fn default_share_origin() -> String {
    "http://localhost:3000".to_string()
}

fn default_user_agent() -> String {
    format!("reels/{}", crate::VERSION)
}

fn default_timeout() -> Duration {
    api::DEFAULT_TIMEOUT
}

/// Identity handed over by the frame-identity provider. A zero fid means signed out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ViewerConfig {
    #[serde(default)]
    pub fid: i64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub pfp_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedConfig {
    #[serde(default = "default_swipe_threshold")]
    pub swipe_threshold: f32,
    #[serde(default = "default_cell_height")]
    pub cell_height: f32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            swipe_threshold: default_swipe_threshold(),
            cell_height: default_cell_height(),
        }
    }
}

fn default_swipe_threshold() -> f32 {
    crate::navigation::DEFAULT_SWIPE_THRESHOLD
}

fn default_cell_height() -> f32 {
    16.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerConfig {
    #[serde(default = "default_player_enabled")]
    pub enabled: bool,
    #[serde(default = "default_mpv_path")]
    pub mpv_path: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            enabled: default_player_enabled(),
            mpv_path: default_mpv_path(),
        }
    }
}

fn default_player_enabled() -> bool {
    true
}

fn default_mpv_path() -> String {
    "mpv".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LogConfig {
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub filter: String,
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    cfg = merge_env(cfg, prefix);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn merge_config(mut base: Config, other: Config) -> Config {
    if !other.api.base_url.is_empty() {
        base.api.base_url = other.api.base_url;
    }
    if !other.api.gateway_url.is_empty() {
        base.api.gateway_url = other.api.gateway_url;
    }
    if !other.api.share_origin.is_empty() {
        base.api.share_origin = other.api.share_origin;
    }
    if !other.api.user_agent.is_empty() {
        base.api.user_agent = other.api.user_agent;
    }
    if !other.api.timeout.is_zero() {
        base.api.timeout = other.api.timeout;
    }

    if other.viewer.fid != 0 {
        base.viewer.fid = other.viewer.fid;
    }
    if !other.viewer.username.is_empty() {
        base.viewer.username = other.viewer.username;
    }
    if !other.viewer.display_name.is_empty() {
        base.viewer.display_name = other.viewer.display_name;
    }
    if !other.viewer.pfp_url.is_empty() {
        base.viewer.pfp_url = other.viewer.pfp_url;
    }

    if other.feed.swipe_threshold > 0.0 {
        base.feed.swipe_threshold = other.feed.swipe_threshold;
    }
    if other.feed.cell_height > 0.0 {
        base.feed.cell_height = other.feed.cell_height;
    }

    base.player.enabled = other.player.enabled;
    if !other.player.mpv_path.is_empty() {
        base.player.mpv_path = other.player.mpv_path;
    }

    if other.log.file.is_some() {
        base.log.file = other.log.file;
    }
    if !other.log.filter.is_empty() {
        base.log.filter = other.log.filter;
    }

    base
}

fn merge_env(mut cfg: Config, prefix: &str) -> Config {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    for (key, value) in map {
        apply_env_value(&mut cfg, &key, value);
    }

    cfg
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "api.base_url" => cfg.api.base_url = value,
        "api.gateway_url" => cfg.api.gateway_url = value,
        "api.share_origin" => cfg.api.share_origin = value,
        "api.user_agent" => cfg.api.user_agent = value,
        "api.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.api.timeout = duration;
            }
        }
        "viewer.fid" => {
            if let Ok(parsed) = value.trim().parse::<i64>() {
                cfg.viewer.fid = parsed;
            }
        }
        "viewer.username" => cfg.viewer.username = value,
        "viewer.display_name" => cfg.viewer.display_name = value,
        "viewer.pfp_url" => cfg.viewer.pfp_url = value,
        "feed.swipe_threshold" => {
            if let Ok(parsed) = value.trim().parse::<f32>() {
                if parsed > 0.0 {
                    cfg.feed.swipe_threshold = parsed;
                }
            }
        }
        "feed.cell_height" => {
            if let Ok(parsed) = value.trim().parse::<f32>() {
                if parsed > 0.0 {
                    cfg.feed.cell_height = parsed;
                }
            }
        }
        "player.enabled" => {
            cfg.player.enabled = matches!(value.as_str(), "1" | "true" | "TRUE" | "True");
        }
        "player.mpv_path" => cfg.player.mpv_path = value,
        "log.file" => cfg.log.file = Some(PathBuf::from(value)),
        "log.filter" => cfg.log.filter = value,
        _ => {}
    }
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("reels").join("config.yaml"))
}
