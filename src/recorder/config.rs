//! Session configuration
//!
//! Loaded from a JSON file when one exists, then overridden from the
//! environment. Every field has a default so a partial file is valid.

use crate::capture::{Facing, VideoHints};
use crate::utils::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Cumulative recording budget for one session
pub const DEFAULT_BUDGET_MS: u64 = 60_000;

const ENV_BUDGET_MS: &str = "MIE_SHORTS_BUDGET_MS";
const ENV_TICK_MS: &str = "MIE_SHORTS_TICK_MS";
const ENV_ACQUIRE_TIMEOUT_MS: &str = "MIE_SHORTS_ACQUIRE_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    /// Maximum cumulative recorded duration
    pub budget_ms: u64,

    /// How often the live elapsed time is recomputed while recording
    pub tick_interval_ms: u64,

    /// Upper bound on waiting for a camera stream
    pub acquire_timeout_ms: u64,

    /// Camera used for the first acquisition
    pub default_facing: Facing,

    pub audio_enabled: bool,

    pub video: VideoHints,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            budget_ms: DEFAULT_BUDGET_MS,
            tick_interval_ms: 100,
            acquire_timeout_ms: 5_000,
            default_facing: Facing::Back,
            audio_enabled: true,
            video: VideoHints::default(),
        }
    }
}

impl SessionConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn from_json(json: &str) -> AppResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file is missing
    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            tracing::info!("No session config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_json(&contents)?;
        tracing::info!("Loaded session config from {:?}", path);
        Ok(config)
    }

    /// Apply `MIE_SHORTS_*` overrides from the process environment
    pub fn with_env_overrides(self) -> AppResult<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        if let Some(value) = parse_ms(&lookup, ENV_BUDGET_MS)? {
            self.budget_ms = value;
        }
        if let Some(value) = parse_ms(&lookup, ENV_TICK_MS)? {
            self.tick_interval_ms = value;
        }
        if let Some(value) = parse_ms(&lookup, ENV_ACQUIRE_TIMEOUT_MS)? {
            self.acquire_timeout_ms = value;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.budget_ms == 0 {
            return Err(AppError::Config("budgetMs must be greater than zero".into()));
        }
        if self.tick_interval_ms == 0 {
            return Err(AppError::Config("tickIntervalMs must be greater than zero".into()));
        }
        if self.acquire_timeout_ms == 0 {
            return Err(AppError::Config("acquireTimeoutMs must be greater than zero".into()));
        }
        Ok(())
    }
}

fn parse_ms(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> AppResult<Option<u64>> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| AppError::Config(format!("{key}={raw:?} is not a millisecond count: {e}"))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = SessionConfig::from_json(r#"{"budgetMs": 30000, "defaultFacing": "front"}"#)
            .unwrap();
        assert_eq!(config.budget_ms, 30_000);
        assert_eq!(config.default_facing, Facing::Front);
        assert_eq!(config.tick_interval_ms, 100);
        assert_eq!(config.video.ideal_width, Some(1920));
    }

    #[test]
    fn test_zero_budget_rejected() {
        let err = SessionConfig::from_json(r#"{"budgetMs": 0}"#).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = SessionConfig::load(&dir.path().join("session.json")).unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, r#"{"acquireTimeoutMs": 2500, "audioEnabled": false}"#).unwrap();

        let config = SessionConfig::load(&path).unwrap();
        assert_eq!(config.acquire_timeout(), Duration::from_millis(2500));
        assert!(!config.audio_enabled);
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> =
            [(ENV_BUDGET_MS, "15000"), (ENV_TICK_MS, " 50 ")].into_iter().collect();
        let config = SessionConfig::default()
            .with_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.budget_ms, 15_000);
        assert_eq!(config.tick_interval(), Duration::from_millis(50));
        assert_eq!(config.acquire_timeout_ms, 5_000);
    }

    #[test]
    fn test_bad_override_is_config_error() {
        let err = SessionConfig::default()
            .with_overrides(|key| (key == ENV_TICK_MS).then(|| "fast".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_TICK_MS));
    }
}
