//! Configuration loading, validation, and env substitution.
//!
//! Config files: `joingate.toml`, `joingate.yaml`, or `joingate.json`
//! Searched in `./` then `~/.config/joingate/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values and the
//! `BOT_TOKEN`/`OWNER_ID`/`LOGGER_ID`/`FSUB`/`DATABASE_URL` overrides.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{apply_env_overrides, config_dir, discover_and_load, load_config},
    schema::{BroadcastConfig, GateConfig, GlobalScopeMode, IndeterminateMode, JoingateConfig},
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
