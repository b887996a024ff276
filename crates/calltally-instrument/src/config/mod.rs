//! Instrumentation config loader (strict parsing) with environment override.

pub mod schema;

use std::fs;

use calltally_core::error::{CallTallyError, Result};

pub use schema::{CallTallyConfig, FilterSection, InterceptorSection};

/// Environment switch for the inbound request filter.
pub const ENV_FILTER_ENABLE: &str = "METRICS_REQUESTFILTER_ENABLE";

pub fn load_from_file(path: &str) -> Result<CallTallyConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| CallTallyError::Internal(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<CallTallyConfig> {
    let cfg: CallTallyConfig = serde_yaml::from_str(s)
        .map_err(|e| CallTallyError::BadConfig(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Apply overrides from the process environment.
pub fn apply_env(cfg: &mut CallTallyConfig) -> Result<()> {
    apply_env_with(cfg, |key| std::env::var(key).ok())
}

/// Apply overrides read through `lookup`.
pub fn apply_env_with<F>(cfg: &mut CallTallyConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(ENV_FILTER_ENABLE) {
        cfg.filter.enabled = parse_flag(&raw).ok_or_else(|| {
            CallTallyError::BadConfig(format!("{ENV_FILTER_ENABLE} must be true or false, got {raw:?}"))
        })?;
        tracing::debug!(enabled = cfg.filter.enabled, "request filter toggled from environment");
    }
    Ok(())
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}
