use async_trait::async_trait;

use crate::bus::i2c::I2cTransport;
use crate::errors::SensorResult;

pub mod ads1015;
pub mod bme280;
pub mod titan_gps;

pub use ads1015::{Ads1015, AnalogProbe};
pub use bme280::{BarometerReading, Bme280};
pub use titan_gps::TitanGps;

#[async_trait]
pub trait SensorDriver: Send + Sync {
    type Output: Send;

    async fn init(&mut self, bus: &mut dyn I2cTransport) -> SensorResult<()>;
    async fn read(&mut self, bus: &mut dyn I2cTransport) -> SensorResult<Self::Output>;
    fn id(&self) -> &str;
}
