use tracing::{info, warn};

use crate::bus::i2c::I2cTransport;
use crate::config::Config;
use crate::errors::{RegistryError, RegistryResult, SensorError};
use crate::sensors::ads1015::{Ads1015, AnalogProbe, DataRate};
use crate::sensors::bme280::Bme280;
use crate::sensors::titan_gps::TitanGps;
use crate::sensors::SensorDriver;

/// The four soil probe inputs
pub struct SoilProbes {
    pub sm1_moisture: AnalogProbe,
    pub sm1_temperature: AnalogProbe,
    pub sm2_moisture: AnalogProbe,
    pub sm2_temperature: AnalogProbe,
}

impl SoilProbes {
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut AnalogProbe> {
        [
            &mut self.sm1_moisture,
            &mut self.sm1_temperature,
            &mut self.sm2_moisture,
            &mut self.sm2_temperature,
        ]
        .into_iter()
    }
}

/// Every device handle for one run, plus the bus they share.
///
/// Dropping the suite releases the bus.
pub struct SensorSuite {
    pub bus: Box<dyn I2cTransport>,
    pub primary: Bme280,
    pub secondary: Bme280,
    pub probes: SoilProbes,
    pub gps: TitanGps,
}

/// Build the handle bundle. A missing GPS is fatal; any other device that
/// fails to initialize stays in the suite and reads back as unavailable.
pub async fn init_all(mut bus: Box<dyn I2cTransport>, config: &Config) -> RegistryResult<SensorSuite> {
    info!("[registry] initializing sensors on {}", bus.path());

    let mut gps = TitanGps::new("gps".to_string(), config.gps.address);
    match gps.init(bus.as_mut()).await {
        Ok(()) => {}
        Err(SensorError::InitError { .. }) => {
            return Err(RegistryError::GpsNotDetected {
                address: config.gps.address,
            })
        }
        Err(e) => return Err(RegistryError::GpsInit(e)),
    }
    info!("[registry] GPS found at {:#04x}", gps.address());

    let mut primary = Bme280::new(
        format!("BME280@{:#04x}", config.barometer.primary_address),
        config.barometer.primary_address,
        config.barometer.sea_level_hpa,
    );
    let mut secondary = Bme280::new(
        format!("BME280@{:#04x}", config.barometer.secondary_address),
        config.barometer.secondary_address,
        config.barometer.sea_level_hpa,
    );
    for barometer in [&mut primary, &mut secondary] {
        match barometer.init(bus.as_mut()).await {
            Ok(()) => info!("[registry] {} ready", barometer.id()),
            Err(e) => warn!("[registry] {} i2c address could not be found: {}", barometer.id(), e),
        }
    }
    let ready = [&primary, &secondary].iter().filter(|b| b.is_initialized()).count();
    info!("[registry] {} of 2 barometers ready", ready);

    // Validated with the rest of the config; fall back rather than fail here
    let data_rate = DataRate::from_sps(config.adc.data_rate).unwrap_or(DataRate::Sps128);
    let adc = Ads1015::new(config.adc.address, data_rate);
    let wire = |name: &str, channel: u8| AnalogProbe::new(format!("{} at A{}", name, channel), adc, channel);
    let mut probes = SoilProbes {
        sm1_moisture: wire("SM1_M", config.adc.sm1_moisture),
        sm1_temperature: wire("SM1_T", config.adc.sm1_temperature),
        sm2_moisture: wire("SM2_M", config.adc.sm2_moisture),
        sm2_temperature: wire("SM2_T", config.adc.sm2_temperature),
    };
    for probe in probes.iter_mut() {
        if let Err(e) = probe.init(bus.as_mut()).await {
            warn!("[registry] {} could not be found: {}", probe.id(), e);
        }
    }

    Ok(SensorSuite {
        bus,
        primary,
        secondary,
        probes,
        gps,
    })
}
