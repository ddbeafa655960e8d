use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::JoingateConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "joingate.toml",
    "joingate.yaml",
    "joingate.yml",
    "joingate.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<JoingateConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./joingate.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/joingate/joingate.{toml,yaml,yml,json}` (user-global)
///
/// Returns `JoingateConfig::default()` if no config file is found. Env
/// overrides are applied in every case.
pub fn discover_and_load() -> JoingateConfig {
    let mut config = match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            match load_config(&path) {
                Ok(cfg) => cfg,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                    JoingateConfig::default()
                },
            }
        },
        None => {
            debug!("no config file found, using defaults");
            JoingateConfig::default()
        },
    };
    apply_env_overrides(&mut config);
    config
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let config_dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| config_dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/joingate/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "joingate").map(|d| d.config_dir().to_path_buf())
}

/// Apply the deployment environment variables on top of a loaded config.
///
/// `BOT_TOKEN`, `OWNER_ID`, `LOGGER_ID`, `FSUB` (space-separated channel
/// list) and `DATABASE_URL` override their file counterparts when set and
/// non-empty.
pub fn apply_env_overrides(config: &mut JoingateConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_env_overrides_with(config: &mut JoingateConfig, lookup: impl Fn(&str) -> Option<String>) {
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(token) = get("BOT_TOKEN") {
        if !config.telegram.is_object() {
            config.telegram = serde_json::Value::Object(serde_json::Map::new());
        }
        if let Some(map) = config.telegram.as_object_mut() {
            map.insert("token".into(), serde_json::Value::String(token));
        }
    }
    if let Some(raw) = get("OWNER_ID") {
        match raw.trim().parse() {
            Ok(id) => config.owner_id = id,
            Err(e) => warn!(value = %raw, error = %e, "ignoring invalid OWNER_ID"),
        }
    }
    if let Some(raw) = get("LOGGER_ID") {
        match raw.trim().parse() {
            Ok(id) => config.log_chat_id = Some(id),
            Err(e) => warn!(value = %raw, error = %e, "ignoring invalid LOGGER_ID"),
        }
    }
    if let Some(raw) = get("FSUB") {
        config.required_channels = raw.split_whitespace().map(str::to_string).collect();
    }
    if let Some(url) = get("DATABASE_URL") {
        config.database_url = url;
    }
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<JoingateConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
