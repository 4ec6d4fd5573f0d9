use async_trait::async_trait;
use tokio::time::{sleep, Duration};

use super::SensorDriver;
use crate::bus::i2c::I2cTransport;
use crate::errors::{SensorError, SensorResult};

// Register pointers
const CONVERSION: u8 = 0x00;
const CONFIG: u8 = 0x01;

// Config register fields
const OS_SINGLE: u16 = 0x8000;
const MUX_SINGLE_ENDED: u16 = 0x4;
const PGA_4_096V: u16 = 0b001 << 9;
const MODE_SINGLE_SHOT: u16 = 1 << 8;
const COMP_QUE_DISABLE: u16 = 0b11;

/// Full-scale range for the ±4.096 V gain setting
const FULL_SCALE_V: f64 = 4.096;
const MAX_POLLS: u32 = 5;

/// ADS1015 conversion rates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataRate {
    Sps128,
    Sps250,
    Sps490,
    Sps920,
    Sps1600,
    Sps2400,
    Sps3300,
}

impl DataRate {
    pub fn from_sps(sps: u16) -> Option<Self> {
        match sps {
            128 => Some(DataRate::Sps128),
            250 => Some(DataRate::Sps250),
            490 => Some(DataRate::Sps490),
            920 => Some(DataRate::Sps920),
            1600 => Some(DataRate::Sps1600),
            2400 => Some(DataRate::Sps2400),
            3300 => Some(DataRate::Sps3300),
            _ => None,
        }
    }

    pub fn sps(self) -> u16 {
        match self {
            DataRate::Sps128 => 128,
            DataRate::Sps250 => 250,
            DataRate::Sps490 => 490,
            DataRate::Sps920 => 920,
            DataRate::Sps1600 => 1600,
            DataRate::Sps2400 => 2400,
            DataRate::Sps3300 => 3300,
        }
    }

    fn bits(self) -> u16 {
        (self as u16) << 5
    }

    /// One conversion period plus a little slack
    fn conversion_time(self) -> Duration {
        Duration::from_micros(1_000_000 / self.sps() as u64 + 500)
    }
}

/// 12-bit ADC with four single-ended inputs
#[derive(Debug, Clone, Copy)]
pub struct Ads1015 {
    address: u8,
    data_rate: DataRate,
}

impl Ads1015 {
    pub fn new(address: u8, data_rate: DataRate) -> Self {
        Self { address, data_rate }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn config_word(&self, channel: u8) -> u16 {
        OS_SINGLE
            | ((MUX_SINGLE_ENDED + channel as u16) << 12)
            | PGA_4_096V
            | MODE_SINGLE_SHOT
            | self.data_rate.bits()
            | COMP_QUE_DISABLE
    }

    /// Run one single-shot conversion on AIN`channel` vs GND.
    ///
    /// Returns the 12-bit result left-aligned to 16 bits.
    pub async fn read_single_ended(&self, bus: &mut dyn I2cTransport, channel: u8) -> SensorResult<i16> {
        if channel > 3 {
            return Err(SensorError::DataError {
                sensor: format!("ads1015@{:#04x}", self.address),
                reason: format!("no input A{}", channel),
            });
        }

        bus.write_bytes(self.address, CONFIG, &self.config_word(channel).to_be_bytes())
            .await?;
        sleep(self.data_rate.conversion_time()).await;

        let mut config = [0u8; 2];
        let mut ready = false;
        for _ in 0..MAX_POLLS {
            bus.read_bytes(self.address, CONFIG, &mut config).await?;
            // OS reads back as 1 once the device is idle again
            if u16::from_be_bytes(config) & OS_SINGLE != 0 {
                ready = true;
                break;
            }
            sleep(self.data_rate.conversion_time()).await;
        }
        if !ready {
            return Err(SensorError::Timeout {
                sensor: format!("ads1015@{:#04x}", self.address),
                timeout_ms: self.data_rate.conversion_time().as_millis() as u64 * (MAX_POLLS as u64 + 1),
            });
        }

        let mut raw = [0u8; 2];
        bus.read_bytes(self.address, CONVERSION, &mut raw).await?;
        Ok((i16::from_be_bytes(raw) >> 4) << 4)
    }

    pub fn to_voltage(value: i16) -> f64 {
        value as f64 * FULL_SCALE_V / 32767.0
    }
}

/// A soil probe wired to one ADC input
pub struct AnalogProbe {
    id: String,
    adc: Ads1015,
    channel: u8,
}

impl AnalogProbe {
    pub fn new(id: String, adc: Ads1015, channel: u8) -> Self {
        Self { id, adc, channel }
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }
}

#[async_trait]
impl SensorDriver for AnalogProbe {
    type Output = f64;

    async fn init(&mut self, bus: &mut dyn I2cTransport) -> SensorResult<()> {
        // The ADC is stateless between conversions; only check that it answers
        let mut config = [0u8; 2];
        bus.read_bytes(self.adc.address(), CONFIG, &mut config)
            .await
            .map_err(|e| SensorError::InitError {
                sensor: self.id.clone(),
                reason: format!("ADC at {:#04x} not found: {}", self.adc.address(), e),
            })?;
        Ok(())
    }

    async fn read(&mut self, bus: &mut dyn I2cTransport) -> SensorResult<f64> {
        let value = self.adc.read_single_ended(bus, self.channel).await?;
        Ok(Ads1015::to_voltage(value))
    }

    fn id(&self) -> &str {
        &self.id
    }
}
