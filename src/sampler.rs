use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::bus::i2c::I2cTransport;
use crate::record::{LogRecord, Sample, READING_COUNT};
use crate::registry::SensorSuite;
use crate::sensors::SensorDriver;

/// Read one sensor, mapping any failure to `None` after logging it
pub async fn read_or_sentinel<S: SensorDriver>(sensor: &mut S, bus: &mut dyn I2cTransport) -> Option<S::Output> {
    match sensor.read(bus).await {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("[{}] could not collect data: {}", sensor.id(), e);
            None
        }
    }
}

/// Take one reading from every sensor in the suite
pub async fn collect(suite: &mut SensorSuite) -> Sample {
    let bus = suite.bus.as_mut();
    let probes = &mut suite.probes;

    let sample = Sample {
        primary: read_or_sentinel(&mut suite.primary, bus).await,
        secondary: read_or_sentinel(&mut suite.secondary, bus).await,
        sm1_moisture: read_or_sentinel(&mut probes.sm1_moisture, bus).await,
        sm1_temperature: read_or_sentinel(&mut probes.sm1_temperature, bus).await,
        sm2_moisture: read_or_sentinel(&mut probes.sm2_moisture, bus).await,
        sm2_temperature: read_or_sentinel(&mut probes.sm2_temperature, bus).await,
    };

    let missing: Vec<&str> = sample
        .readings()
        .iter()
        .filter(|reading| reading.value.is_none())
        .map(|reading| reading.name)
        .collect();
    if !missing.is_empty() {
        info!(
            "[sampler] {} of {} readings unavailable: {}",
            missing.len(),
            READING_COUNT,
            missing.join(",")
        );
    }
    sample
}

/// Collect a sample and stamp it into a log row
pub async fn sample_once(
    suite: &mut SensorSuite,
    hostname: &str,
    location: &str,
    timestamp: NaiveDateTime,
) -> LogRecord {
    let sample = collect(suite).await;
    LogRecord::new(hostname.to_string(), location.to_string(), timestamp, sample)
}
