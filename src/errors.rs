use std::path::PathBuf;

use thiserror::Error;

use crate::bus::i2c::BusError;

/// Errors raised by a single sensor driver
#[derive(Error, Debug)]
pub enum SensorError {
    #[error("I2C communication failed: {0}")]
    I2cError(#[from] BusError),

    #[error("Sensor '{sensor}' initialization failed: {reason}")]
    InitError { sensor: String, reason: String },

    #[error("Sensor '{sensor}' is not initialized")]
    NotInitialized { sensor: String },

    #[error("Sensor '{sensor}' returned invalid data: {reason}")]
    DataError { sensor: String, reason: String },

    #[error("Sensor '{sensor}' conversion timeout after {timeout_ms}ms")]
    Timeout { sensor: String, timeout_ms: u64 },

    #[error("Sensor '{sensor}' wrong chip ID: expected {expected:#04x}, got {actual:#04x}")]
    WrongChipId { sensor: String, expected: u8, actual: u8 },
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from '{path}': {source}")]
    LoadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration format: {0}")]
    FormatError(#[from] toml::de::Error),

    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Log file errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Cannot create log directory '{}': {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot open log file '{}': {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write log file '{}': {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),
}

/// Registry and initialization errors
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Could not connect to the GPS unit at {address:#04x}, check wiring")]
    GpsNotDetected { address: u8 },

    #[error("GPS initialization failed: {0}")]
    GpsInit(#[source] SensorError),
}

/// Fatal errors of one collection run
#[derive(Error, Debug)]
pub enum CollectError {
    #[error("I2C bus '{path}' unavailable: {source}")]
    Bus {
        path: String,
        #[source]
        source: BusError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result type aliases for convenience
pub type SensorResult<T> = Result<T, SensorError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type StorageResult<T> = Result<T, StorageError>;
pub type RegistryResult<T> = Result<T, RegistryError>;
pub type CollectResult<T> = Result<T, CollectError>;
