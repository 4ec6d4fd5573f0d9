pub mod i2c;

pub use i2c::{BusError, I2CBus, I2cTransport};
