pub mod log_config;
pub mod sensor_config;

pub use log_config::LogSettings;
pub use sensor_config::{AdcSettings, BarometerSettings, BusSettings, GpsSettings};

use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use tracing::info;

use crate::errors::{ConfigError, ConfigResult};
use crate::sensors::ads1015::DataRate;

/// Root of `collector.toml`; every section is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bus: BusSettings,
    pub log: LogSettings,
    pub barometer: BarometerSettings,
    pub adc: AdcSettings,
    pub gps: GpsSettings,
}

impl Config {
    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        let parsed: Config = toml::from_str(content)?;
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if DataRate::from_sps(self.adc.data_rate).is_none() {
            return Err(ConfigError::InvalidValue {
                field: "adc.data_rate".to_string(),
                reason: format!("{} SPS is not an ADS1015 rate", self.adc.data_rate),
            });
        }

        let channels = [
            ("adc.sm1_moisture", self.adc.sm1_moisture),
            ("adc.sm1_temperature", self.adc.sm1_temperature),
            ("adc.sm2_moisture", self.adc.sm2_moisture),
            ("adc.sm2_temperature", self.adc.sm2_temperature),
        ];
        for (field, channel) in channels {
            if channel > 3 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: format!("channel A{} does not exist (A0-A3)", channel),
                });
            }
        }

        if self.gps.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "gps.poll_interval_ms".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        let sea_level = self.barometer.sea_level_hpa;
        if sea_level.is_nan() || sea_level <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "barometer.sea_level_hpa".to_string(),
                reason: "must be a positive pressure".to_string(),
            });
        }

        Ok(())
    }
}

/// Loads config from TOML file
pub fn load_config(path: &str) -> ConfigResult<Config> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::LoadError {
        path: path.to_string(),
        source,
    })?;
    Config::from_toml(&content)
}

/// Like [`load_config`], but a missing file yields the built-in defaults
pub fn load_or_default(path: &str) -> ConfigResult<Config> {
    match load_config(path) {
        Err(ConfigError::LoadError { source, .. }) if source.kind() == ErrorKind::NotFound => {
            info!("[config] {} not found, using defaults", path);
            Ok(Config::default())
        }
        other => other,
    }
}
