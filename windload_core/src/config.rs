//! # Configuration
//!
//! Settings for a wind load run, stored as a versioned JSON file. Every
//! field has a default, so a partial file (or `{}`) is a valid config.
//!
//! ```json
//! {
//!   "version": "0.1.0",
//!   "apply": { "max_records_per_batch": 5000, "replace_existing": true, "aggregate": true },
//!   "exposure": { "extra_primary_default": 0.0, "extra_primary_by_section": { "12": 1.5 } },
//!   "live_wind_eccentricity": 6.0,
//!   "debug": { "enabled": false, "dir": "wind_debug", "run_label": "WIND" }
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::apply::ApplyOptions;
use crate::errors::LoadResult;
use crate::exposure::ExposureSettings;
use crate::file_io::{read_json, validate_version, write_json_atomic};

/// Current config schema version
pub const CONFIG_VERSION: &str = "0.1.0";

/// Default eccentricity of live wind loads (height of the live load resultant)
pub const DEFAULT_LIVE_WIND_ECCENTRICITY: f64 = 6.0;

/// Debug artifact settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugSettings {
    pub enabled: bool,
    /// Base directory for run folders
    pub dir: PathBuf,
    pub run_label: String,
}

impl Default for DebugSettings {
    fn default() -> Self {
        DebugSettings {
            enabled: false,
            dir: PathBuf::from("wind_debug"),
            run_label: "WIND".to_string(),
        }
    }
}

/// Settings of a wind load run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindLoadConfig {
    pub version: String,
    pub apply: ApplyOptions,
    pub exposure: ExposureSettings,
    pub live_wind_eccentricity: f64,
    pub debug: DebugSettings,
}

impl Default for WindLoadConfig {
    fn default() -> Self {
        WindLoadConfig {
            version: CONFIG_VERSION.to_string(),
            apply: ApplyOptions::default(),
            exposure: ExposureSettings::default(),
            live_wind_eccentricity: DEFAULT_LIVE_WIND_ECCENTRICITY,
            debug: DebugSettings::default(),
        }
    }
}

impl WindLoadConfig {
    /// Clamp values that would make a run meaningless
    pub fn normalized(mut self) -> Self {
        self.apply.max_records_per_batch = self.apply.max_records_per_batch.max(1);
        if !self.live_wind_eccentricity.is_finite() {
            self.live_wind_eccentricity = DEFAULT_LIVE_WIND_ECCENTRICITY;
        }
        self
    }
}

/// Load and validate a config file
pub fn load_config(path: &Path) -> LoadResult<WindLoadConfig> {
    let config: WindLoadConfig = read_json(path)?;
    validate_version(&config.version, CONFIG_VERSION)?;
    tracing::debug!(path = %path.display(), "config loaded");
    Ok(config.normalized())
}

/// Save a config file atomically
pub fn save_config(config: &WindLoadConfig, path: &Path) -> LoadResult<()> {
    write_json_atomic(config, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::LoadError;
    use crate::model::SectionId;
    use std::env::temp_dir;
    use std::fs;

    fn temp_config(name: &str) -> PathBuf {
        temp_dir().join(format!("windload_config_{}_{}.json", name, std::process::id()))
    }

    #[test]
    fn test_defaults() {
        let config = WindLoadConfig::default();
        assert_eq!(config.apply.max_records_per_batch, 5000);
        assert!(config.apply.replace_existing);
        assert!(config.apply.aggregate);
        assert_eq!(config.live_wind_eccentricity, 6.0);
        assert!(!config.debug.enabled);
        assert_eq!(config.debug.run_label, "WIND");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: WindLoadConfig = serde_json::from_str(
            r#"{
                "apply": {"max_records_per_batch": 0},
                "exposure": {"extra_primary_by_section": {"12": 1.5}}
            }"#,
        )
        .unwrap();
        assert!(config.apply.replace_existing);
        assert_eq!(config.exposure.extra_for(SectionId(12)), 1.5);
        assert_eq!(config.normalized().apply.max_records_per_batch, 1);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let path = temp_config("roundtrip");
        let mut config = WindLoadConfig::default();
        config.live_wind_eccentricity = 4.5;
        config.exposure.extra_primary_default = 0.75;

        save_config(&config, &path).unwrap();
        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded, config);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_load_errors() {
        assert!(matches!(load_config(&temp_config("absent")), Err(LoadError::FileError { .. })));

        let path = temp_config("newer");
        fs::write(&path, r#"{"version": "0.9.0"}"#).unwrap();
        assert!(matches!(load_config(&path), Err(LoadError::VersionMismatch { .. })));
        let _ = fs::remove_file(&path);
    }
}
