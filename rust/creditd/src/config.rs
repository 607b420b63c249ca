use std::path::PathBuf;

use crate::logging::LogFormat;

pub const ENV_WORKSPACE: &str = "CREDITD_WORKSPACE";
pub const ENV_LOG: &str = "CREDITD_LOG";
pub const ENV_LOG_FORMAT: &str = "CREDITD_LOG_FORMAT";

/// Process-level settings read once at startup. Per-workspace settings live
/// in the workspace database instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Opened before the first request when set.
    pub workspace: Option<PathBuf>,
    pub log_filter: String,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: None,
            log_filter: "info".to_string(),
            log_format: LogFormat::Compact,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Config::default();
        if let Some(p) = lookup(ENV_WORKSPACE).filter(|v| !v.trim().is_empty()) {
            cfg.workspace = Some(PathBuf::from(p));
        }
        if let Some(f) = lookup(ENV_LOG).filter(|v| !v.trim().is_empty()) {
            cfg.log_filter = f;
        }
        if let Some(raw) = lookup(ENV_LOG_FORMAT) {
            cfg.log_format = LogFormat::parse(&raw).ok_or_else(|| {
                anyhow::anyhow!("{} must be one of: pretty, compact, json", ENV_LOG_FORMAT)
            })?;
        }
        Ok(cfg)
    }
}
