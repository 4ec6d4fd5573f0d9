use serde::Deserialize;

/// `[bus]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BusSettings {
    pub path: String,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self { path: "/dev/i2c-1".to_string() }
    }
}

/// `[barometer]` section, shared by both BME280 units
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BarometerSettings {
    pub primary_address: u8,
    pub secondary_address: u8,
    /// Local pressure at sea level (hPa), used for the altitude estimate
    pub sea_level_hpa: f64,
}

impl Default for BarometerSettings {
    fn default() -> Self {
        Self {
            primary_address: 0x76,
            secondary_address: 0x77,
            sea_level_hpa: 1019.0,
        }
    }
}

/// `[adc]` section: ADS1015 address, sample rate and probe wiring
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdcSettings {
    pub address: u8,
    /// Samples per second
    pub data_rate: u16,
    pub sm1_moisture: u8,
    pub sm1_temperature: u8,
    pub sm2_moisture: u8,
    pub sm2_temperature: u8,
}

impl Default for AdcSettings {
    fn default() -> Self {
        Self {
            address: 0x48,
            data_rate: 128,
            sm1_moisture: 0,
            sm2_moisture: 1,
            sm1_temperature: 2,
            sm2_temperature: 3,
        }
    }
}

/// `[gps]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GpsSettings {
    pub address: u8,
    /// Keep polling the receiver after the row is written
    pub watch: bool,
    pub poll_interval_ms: u64,
    /// Stop watching after this many polls; unbounded until Ctrl-C when unset
    pub max_polls: Option<u64>,
}

impl Default for GpsSettings {
    fn default() -> Self {
        Self {
            address: 0x10,
            watch: false,
            poll_interval_ms: 2000,
            max_polls: None,
        }
    }
}
