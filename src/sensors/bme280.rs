use async_trait::async_trait;
use tokio::time::{sleep, Duration};
use tracing::debug;

use super::SensorDriver;
use crate::bus::i2c::I2cTransport;
use crate::errors::{SensorError, SensorResult};

// Register addresses for the BME280
const CHIP_ID: u8 = 0xD0;
const RESET: u8 = 0xE0;
const CALIB_TP: u8 = 0x88;
const CALIB_H: u8 = 0xE1;
const CTRL_HUM: u8 = 0xF2;
const STATUS: u8 = 0xF3;
const CTRL_MEAS: u8 = 0xF4;
const DATA: u8 = 0xF7;

const EXPECTED_CHIP_ID: u8 = 0x60;
const SOFT_RESET: u8 = 0xB6;
const STATUS_MEASURING: u8 = 0x08;
const STATUS_IM_UPDATE: u8 = 0x01;

const OVERSAMPLE_X1: u8 = 0b001;
const OVERSAMPLE_X16: u8 = 0b101;
const MODE_FORCED: u8 = 0b01;

/// Worst case for T x1, P x16, H x1 is ~43 ms
const MEASUREMENT_WAIT_MS: u64 = 45;
const POLL_INTERVAL_MS: u64 = 5;
const MAX_POLLS: u32 = 10;

/// Marker the chip reports when a channel was skipped
const SKIPPED_20BIT: i32 = 0x80000;

/// One compensated measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarometerReading {
    /// °C
    pub temperature: f64,
    /// % relative humidity
    pub humidity: f64,
    /// hPa
    pub pressure: f64,
    /// m, estimated from `sea_level_hpa`
    pub altitude: f64,
}

/// Factory trimming values from NVM
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Calibration {
    pub t1: u16,
    pub t2: i16,
    pub t3: i16,
    pub p1: u16,
    pub p2: i16,
    pub p3: i16,
    pub p4: i16,
    pub p5: i16,
    pub p6: i16,
    pub p7: i16,
    pub p8: i16,
    pub p9: i16,
    pub h1: u8,
    pub h2: i16,
    pub h3: u8,
    pub h4: i16,
    pub h5: i16,
    pub h6: i8,
}

impl Calibration {
    /// Decode the 26-byte block at 0x88 and the 7-byte block at 0xE1
    pub fn from_registers(tp: &[u8; 26], h: &[u8; 7]) -> Self {
        let u16_at = |i: usize| u16::from_le_bytes([tp[i], tp[i + 1]]);
        let i16_at = |i: usize| i16::from_le_bytes([tp[i], tp[i + 1]]);

        Self {
            t1: u16_at(0),
            t2: i16_at(2),
            t3: i16_at(4),
            p1: u16_at(6),
            p2: i16_at(8),
            p3: i16_at(10),
            p4: i16_at(12),
            p5: i16_at(14),
            p6: i16_at(16),
            p7: i16_at(18),
            p8: i16_at(20),
            p9: i16_at(22),
            // 0xA0 (index 24) is unused
            h1: tp[25],
            h2: i16::from_le_bytes([h[0], h[1]]),
            h3: h[2],
            // H4 and H5 share the nibbles of 0xE5
            h4: ((h[3] as i8 as i16) << 4) | (h[4] & 0x0F) as i16,
            h5: ((h[5] as i8 as i16) << 4) | (h[4] >> 4) as i16,
            h6: h[6] as i8,
        }
    }

    /// Returns (°C, t_fine)
    pub fn compensate_temperature(&self, adc_t: i32) -> (f64, f64) {
        let adc_t = adc_t as f64;
        let t1 = self.t1 as f64;
        let var1 = (adc_t / 16384.0 - t1 / 1024.0) * self.t2 as f64;
        let var2 = (adc_t / 131072.0 - t1 / 8192.0).powi(2) * self.t3 as f64;
        let t_fine = var1 + var2;
        (t_fine / 5120.0, t_fine)
    }

    /// Pressure in hPa; `None` when the calibration would divide by zero
    pub fn compensate_pressure(&self, adc_p: i32, t_fine: f64) -> Option<f64> {
        let mut var1 = t_fine / 2.0 - 64000.0;
        let mut var2 = var1 * var1 * self.p6 as f64 / 32768.0;
        var2 += var1 * self.p5 as f64 * 2.0;
        var2 = var2 / 4.0 + self.p4 as f64 * 65536.0;
        let var3 = self.p3 as f64 * var1 * var1 / 524288.0;
        var1 = (var3 + self.p2 as f64 * var1) / 524288.0;
        var1 = (1.0 + var1 / 32768.0) * self.p1 as f64;
        if var1 == 0.0 {
            return None;
        }

        let mut pressure = 1048576.0 - adc_p as f64;
        pressure = ((pressure - var2 / 4096.0) * 6250.0) / var1;
        let var1 = self.p9 as f64 * pressure * pressure / 2147483648.0;
        let var2 = pressure * self.p8 as f64 / 32768.0;
        pressure += (var1 + var2 + self.p7 as f64) / 16.0;

        Some(pressure / 100.0)
    }

    /// Relative humidity in %, clamped to 0..=100
    pub fn compensate_humidity(&self, adc_h: i32, t_fine: f64) -> f64 {
        let var1 = t_fine - 76800.0;
        let var2 = self.h4 as f64 * 64.0 + (self.h5 as f64 / 16384.0) * var1;
        let var3 = adc_h as f64 - var2;
        let var4 = self.h2 as f64 / 65536.0;
        let var5 = 1.0 + (self.h3 as f64 / 67108864.0) * var1;
        let mut var6 = 1.0 + (self.h6 as f64 / 67108864.0) * var1 * var5;
        var6 = var3 * var4 * (var5 * var6);
        let humidity = var6 * (1.0 - self.h1 as f64 * var6 / 524288.0);
        humidity.clamp(0.0, 100.0)
    }
}

/// International barometric formula, as used by the Bosch application notes
pub fn altitude_from_pressure(pressure_hpa: f64, sea_level_hpa: f64) -> f64 {
    44330.0 * (1.0 - (pressure_hpa / sea_level_hpa).powf(0.1903))
}

/// Uncompensated ADC words from the 0xF7..0xFE burst
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RawSample {
    pressure: i32,
    temperature: i32,
    humidity: i32,
}

impl RawSample {
    fn from_bytes(buf: &[u8; 8]) -> Self {
        let word20 = |i: usize| {
            ((buf[i] as i32) << 12) | ((buf[i + 1] as i32) << 4) | ((buf[i + 2] as i32) >> 4)
        };
        Self {
            pressure: word20(0),
            temperature: word20(3),
            humidity: ((buf[6] as i32) << 8) | buf[7] as i32,
        }
    }
}

pub struct Bme280 {
    id: String,
    address: u8,
    sea_level_hpa: f64,
    calibration: Option<Calibration>,
}

impl Bme280 {
    pub fn new(id: String, address: u8, sea_level_hpa: f64) -> Self {
        Self {
            id,
            address,
            sea_level_hpa,
            calibration: None,
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn is_initialized(&self) -> bool {
        self.calibration.is_some()
    }

    async fn wait_for_measurement(&self, bus: &mut dyn I2cTransport) -> SensorResult<()> {
        sleep(Duration::from_millis(MEASUREMENT_WAIT_MS)).await;

        let mut status = [0u8; 1];
        for _ in 0..MAX_POLLS {
            bus.read_bytes(self.address, STATUS, &mut status).await?;
            if status[0] & STATUS_MEASURING == 0 {
                return Ok(());
            }
            sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }

        Err(SensorError::Timeout {
            sensor: self.id.clone(),
            timeout_ms: MEASUREMENT_WAIT_MS + POLL_INTERVAL_MS * MAX_POLLS as u64,
        })
    }
}

#[async_trait]
impl SensorDriver for Bme280 {
    type Output = BarometerReading;

    async fn init(&mut self, bus: &mut dyn I2cTransport) -> SensorResult<()> {
        // Verify device identity
        let mut chip_id = [0u8; 1];
        bus.read_bytes(self.address, CHIP_ID, &mut chip_id).await?;
        if chip_id[0] != EXPECTED_CHIP_ID {
            return Err(SensorError::WrongChipId {
                sensor: self.id.clone(),
                expected: EXPECTED_CHIP_ID,
                actual: chip_id[0],
            });
        }

        bus.write_byte(self.address, RESET, SOFT_RESET).await?;
        sleep(Duration::from_millis(5)).await;

        // Wait for the NVM copy to finish
        let mut status = [0u8; 1];
        let mut copied = false;
        for _ in 0..MAX_POLLS {
            bus.read_bytes(self.address, STATUS, &mut status).await?;
            if status[0] & STATUS_IM_UPDATE == 0 {
                copied = true;
                break;
            }
            sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
        if !copied {
            return Err(SensorError::InitError {
                sensor: self.id.clone(),
                reason: "calibration data never became readable".to_string(),
            });
        }

        let mut tp = [0u8; 26];
        bus.read_bytes(self.address, CALIB_TP, &mut tp).await?;
        let mut h = [0u8; 7];
        bus.read_bytes(self.address, CALIB_H, &mut h).await?;

        let calibration = Calibration::from_registers(&tp, &h);
        if calibration.t1 == 0 || calibration.p1 == 0 {
            return Err(SensorError::InitError {
                sensor: self.id.clone(),
                reason: "calibration block is blank".to_string(),
            });
        }

        debug!("[{}] calibration: {:?}", self.id, calibration);
        self.calibration = Some(calibration);
        Ok(())
    }

    async fn read(&mut self, bus: &mut dyn I2cTransport) -> SensorResult<BarometerReading> {
        let calibration = self.calibration.ok_or_else(|| SensorError::NotInitialized {
            sensor: self.id.clone(),
        })?;

        // ctrl_hum only takes effect after the following ctrl_meas write
        bus.write_byte(self.address, CTRL_HUM, OVERSAMPLE_X1).await?;
        bus.write_byte(
            self.address,
            CTRL_MEAS,
            (OVERSAMPLE_X1 << 5) | (OVERSAMPLE_X16 << 2) | MODE_FORCED,
        )
        .await?;
        self.wait_for_measurement(bus).await?;

        let mut buf = [0u8; 8];
        bus.read_bytes(self.address, DATA, &mut buf).await?;
        let raw = RawSample::from_bytes(&buf);
        if raw.temperature == SKIPPED_20BIT {
            return Err(SensorError::DataError {
                sensor: self.id.clone(),
                reason: "temperature sample skipped".to_string(),
            });
        }

        let (temperature, t_fine) = calibration.compensate_temperature(raw.temperature);
        let pressure = calibration
            .compensate_pressure(raw.pressure, t_fine)
            .ok_or_else(|| SensorError::DataError {
                sensor: self.id.clone(),
                reason: "pressure compensation divided by zero".to_string(),
            })?;
        let humidity = calibration.compensate_humidity(raw.humidity, t_fine);
        let altitude = altitude_from_pressure(pressure, self.sea_level_hpa);

        Ok(BarometerReading {
            temperature,
            humidity,
            pressure,
            altitude,
        })
    }

    fn id(&self) -> &str {
        &self.id
    }
}
