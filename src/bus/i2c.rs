use async_trait::async_trait;
use thiserror::Error;

#[cfg(target_os = "linux")]
use i2cdev::core::I2CDevice;
#[cfg(target_os = "linux")]
use i2cdev::linux::{LinuxI2CDevice, LinuxI2CError};

/// I2C bus error type
#[derive(Error, Debug)]
pub enum BusError {
    #[cfg(target_os = "linux")]
    #[error("I2C device error: {0}")]
    Linux(#[from] LinuxI2CError),

    #[error("no device acknowledged at address {address:#04x}")]
    NoAck { address: u8 },

    #[error("short read from {address:#04x}: expected {expected} bytes, got {actual}")]
    ShortRead { address: u8, expected: usize, actual: usize },

    #[error("I2C not supported on this platform: {0}")]
    Unsupported(String),
}

/// Register-level access to devices on one I2C bus.
///
/// Sensor drivers only talk to hardware through this trait, so the same driver
/// code runs against `/dev/i2c-*` and against the in-memory bus used in tests.
#[async_trait]
pub trait I2cTransport: Send {
    /// Read `buf.len()` bytes starting at register `reg`.
    async fn read_bytes(&mut self, address: u8, reg: u8, buf: &mut [u8]) -> Result<(), BusError>;

    async fn write_byte(&mut self, address: u8, reg: u8, byte: u8) -> Result<(), BusError>;

    /// Write a block of bytes starting at register `reg`.
    async fn write_bytes(&mut self, address: u8, reg: u8, data: &[u8]) -> Result<(), BusError>;

    /// Plain read without a register pointer (stream-style devices).
    async fn read_raw(&mut self, address: u8, buf: &mut [u8]) -> Result<(), BusError>;

    /// Check that a device acknowledges at `address`.
    async fn probe(&mut self, address: u8) -> Result<(), BusError>;

    fn path(&self) -> &str;
}

/// I2C bus implementation
#[cfg(target_os = "linux")]
pub struct I2CBus {
    device: LinuxI2CDevice,
    path: String,
}

#[cfg(not(target_os = "linux"))]
pub struct I2CBus {
    path: String,
}

#[cfg(target_os = "linux")]
impl I2CBus {
    pub fn new(path: &str) -> Result<Self, BusError> {
        let device = LinuxI2CDevice::new(path, 0)?;
        Ok(Self { device, path: path.to_string() })
    }
}

#[cfg(target_os = "linux")]
#[async_trait]
impl I2cTransport for I2CBus {
    async fn read_bytes(&mut self, address: u8, reg: u8, buf: &mut [u8]) -> Result<(), BusError> {
        self.device.set_slave_address(address as u16)?;

        if buf.len() == 1 {
            // Use SMBus read byte data for single byte reads
            buf[0] = self.device.smbus_read_byte_data(reg)?;
        } else {
            // Use SMBus block read for multi-byte reads
            let data = self.device.smbus_read_i2c_block_data(reg, buf.len() as u8)?;
            if data.len() != buf.len() {
                return Err(BusError::ShortRead {
                    address,
                    expected: buf.len(),
                    actual: data.len(),
                });
            }
            buf.copy_from_slice(&data);
        }

        Ok(())
    }

    async fn write_byte(&mut self, address: u8, reg: u8, byte: u8) -> Result<(), BusError> {
        self.device.set_slave_address(address as u16)?;
        self.device.smbus_write_byte_data(reg, byte)?;
        Ok(())
    }

    async fn write_bytes(&mut self, address: u8, reg: u8, data: &[u8]) -> Result<(), BusError> {
        self.device.set_slave_address(address as u16)?;
        self.device.smbus_write_i2c_block_data(reg, data)?;
        Ok(())
    }

    async fn read_raw(&mut self, address: u8, buf: &mut [u8]) -> Result<(), BusError> {
        self.device.set_slave_address(address as u16)?;
        self.device.read(buf)?;
        Ok(())
    }

    async fn probe(&mut self, address: u8) -> Result<(), BusError> {
        self.device.set_slave_address(address as u16)?;
        self.device
            .smbus_write_quick(false)
            .map_err(|_| BusError::NoAck { address })
    }

    fn path(&self) -> &str {
        &self.path
    }
}

#[cfg(not(target_os = "linux"))]
impl I2CBus {
    pub fn new(path: &str) -> Result<Self, BusError> {
        Err(BusError::Unsupported(format!(
            "cannot open {}: I2C is only supported on Linux",
            path
        )))
    }
}

#[cfg(not(target_os = "linux"))]
#[async_trait]
impl I2cTransport for I2CBus {
    async fn read_bytes(&mut self, _address: u8, _reg: u8, _buf: &mut [u8]) -> Result<(), BusError> {
        Err(BusError::Unsupported("I2C is only supported on Linux".to_string()))
    }

    async fn write_byte(&mut self, _address: u8, _reg: u8, _byte: u8) -> Result<(), BusError> {
        Err(BusError::Unsupported("I2C is only supported on Linux".to_string()))
    }

    async fn write_bytes(&mut self, _address: u8, _reg: u8, _data: &[u8]) -> Result<(), BusError> {
        Err(BusError::Unsupported("I2C is only supported on Linux".to_string()))
    }

    async fn read_raw(&mut self, _address: u8, _buf: &mut [u8]) -> Result<(), BusError> {
        Err(BusError::Unsupported("I2C is only supported on Linux".to_string()))
    }

    async fn probe(&mut self, _address: u8) -> Result<(), BusError> {
        Err(BusError::Unsupported("I2C is only supported on Linux".to_string()))
    }

    fn path(&self) -> &str {
        &self.path
    }
}
