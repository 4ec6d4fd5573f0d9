//! In-memory I2C bus and simulated devices for unit tests.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::bus::i2c::{BusError, I2cTransport};
use crate::sensors::bme280::Calibration;

pub(crate) trait FakeDevice: Send {
    fn read(&mut self, reg: u8, buf: &mut [u8]);
    fn write(&mut self, reg: u8, data: &[u8]);
    fn read_raw(&mut self, buf: &mut [u8]) {
        buf.fill(0xFF);
    }
}

#[derive(Default)]
pub(crate) struct FakeBus {
    devices: HashMap<u8, Box<dyn FakeDevice>>,
    probes: Arc<AtomicUsize>,
}

impl FakeBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(mut self, address: u8, device: impl FakeDevice + 'static) -> Self {
        self.devices.insert(address, Box::new(device));
        self
    }

    /// Number of presence probes issued, readable after the bus is moved
    pub fn probe_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.probes)
    }

    fn device(&mut self, address: u8) -> Result<&mut Box<dyn FakeDevice>, BusError> {
        self.devices.get_mut(&address).ok_or(BusError::NoAck { address })
    }
}

#[async_trait]
impl I2cTransport for FakeBus {
    async fn read_bytes(&mut self, address: u8, reg: u8, buf: &mut [u8]) -> Result<(), BusError> {
        self.device(address)?.read(reg, buf);
        Ok(())
    }

    async fn write_byte(&mut self, address: u8, reg: u8, byte: u8) -> Result<(), BusError> {
        self.device(address)?.write(reg, &[byte]);
        Ok(())
    }

    async fn write_bytes(&mut self, address: u8, reg: u8, data: &[u8]) -> Result<(), BusError> {
        self.device(address)?.write(reg, data);
        Ok(())
    }

    async fn read_raw(&mut self, address: u8, buf: &mut [u8]) -> Result<(), BusError> {
        self.device(address)?.read_raw(buf);
        Ok(())
    }

    async fn probe(&mut self, address: u8) -> Result<(), BusError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.device(address).map(|_| ())
    }

    fn path(&self) -> &str {
        "fake"
    }
}

/// BME280 register file with a fixed raw measurement
pub(crate) struct FakeBme280 {
    regs: [u8; 256],
}

impl FakeBme280 {
    /// T/P trimming from the Bosch BMP280 datasheet example, typical H trimming
    pub fn datasheet_calibration() -> Calibration {
        Calibration {
            t1: 27504,
            t2: 26435,
            t3: -1000,
            p1: 36477,
            p2: -10685,
            p3: 3024,
            p4: 2855,
            p5: 140,
            p6: -7,
            p7: 15500,
            p8: -14600,
            p9: 6000,
            h1: 75,
            h2: 362,
            h3: 0,
            h4: 313,
            h5: 50,
            h6: 30,
        }
    }

    pub fn datasheet() -> Self {
        let mut device = Self { regs: [0; 256] };
        device.regs[0xD0] = 0x60;

        let c = Self::datasheet_calibration();
        let words: [u16; 12] = [
            c.t1,
            c.t2 as u16,
            c.t3 as u16,
            c.p1,
            c.p2 as u16,
            c.p3 as u16,
            c.p4 as u16,
            c.p5 as u16,
            c.p6 as u16,
            c.p7 as u16,
            c.p8 as u16,
            c.p9 as u16,
        ];
        for (i, word) in words.iter().enumerate() {
            let [lo, hi] = word.to_le_bytes();
            device.regs[0x88 + i * 2] = lo;
            device.regs[0x89 + i * 2] = hi;
        }
        device.regs[0xA1] = c.h1;
        let [lo, hi] = c.h2.to_le_bytes();
        device.regs[0xE1] = lo;
        device.regs[0xE2] = hi;
        device.regs[0xE3] = c.h3;
        device.regs[0xE4] = (c.h4 >> 4) as u8;
        device.regs[0xE5] = ((c.h4 & 0x0F) as u8) | (((c.h5 & 0x0F) as u8) << 4);
        device.regs[0xE6] = (c.h5 >> 4) as u8;
        device.regs[0xE7] = c.h6 as u8;

        device.with_raw(415148, 519888, 30000)
    }

    pub fn with_chip_id(mut self, id: u8) -> Self {
        self.regs[0xD0] = id;
        self
    }

    pub fn with_raw(mut self, pressure: u32, temperature: u32, humidity: u16) -> Self {
        let word20 = |value: u32| [(value >> 12) as u8, (value >> 4) as u8, ((value & 0x0F) << 4) as u8];
        self.regs[0xF7..0xFA].copy_from_slice(&word20(pressure));
        self.regs[0xFA..0xFD].copy_from_slice(&word20(temperature));
        self.regs[0xFD..0xFF].copy_from_slice(&humidity.to_be_bytes());
        self
    }
}

impl FakeDevice for FakeBme280 {
    fn read(&mut self, reg: u8, buf: &mut [u8]) {
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = self.regs[(reg as usize + i) & 0xFF];
        }
    }

    fn write(&mut self, reg: u8, data: &[u8]) {
        // Reset, status and data registers are not writable
        if reg == 0xE0 || (reg >= 0xF3 && reg != 0xF4) {
            return;
        }
        for (i, byte) in data.iter().enumerate() {
            self.regs[(reg as usize + i) & 0xFF] = *byte;
        }
    }
}

/// ADS1015 that converts instantly; inputs are 12-bit codes
pub(crate) struct FakeAds1015 {
    inputs: [i16; 4],
    config: u16,
}

impl FakeAds1015 {
    pub fn new(inputs: [i16; 4]) -> Self {
        Self { inputs, config: 0x8583 }
    }
}

impl FakeDevice for FakeAds1015 {
    fn read(&mut self, reg: u8, buf: &mut [u8]) {
        let word = match reg {
            0x00 => {
                let mux = ((self.config >> 12) & 0x7) as usize;
                let code = if mux >= 4 { self.inputs[mux - 4] } else { 0 };
                (code << 4) as u16
            }
            // Idle again as soon as the conversion was requested
            0x01 => self.config | 0x8000,
            _ => 0,
        };
        let bytes = word.to_be_bytes();
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = bytes.get(i).copied().unwrap_or(0);
        }
    }

    fn write(&mut self, reg: u8, data: &[u8]) {
        if reg == 0x01 && data.len() == 2 {
            self.config = u16::from_be_bytes([data[0], data[1]]);
        }
    }
}

/// Shared handle for pushing NMEA text into a [`FakeTitanGps`] after it was
/// moved onto the bus
#[derive(Clone, Default)]
pub(crate) struct NmeaFeed(Arc<Mutex<VecDeque<u8>>>);

impl NmeaFeed {
    pub fn push(&self, text: &str) {
        self.0.lock().unwrap().extend(text.bytes());
    }
}

/// Titan X1 receiver: streams queued bytes, then `\n` filler
#[derive(Default)]
pub(crate) struct FakeTitanGps {
    feed: NmeaFeed,
}

impl FakeTitanGps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nmea(self, text: &str) -> Self {
        self.feed.push(text);
        self
    }

    pub fn feed(&self) -> NmeaFeed {
        self.feed.clone()
    }
}

impl FakeDevice for FakeTitanGps {
    fn read(&mut self, _reg: u8, buf: &mut [u8]) {
        self.read_raw(buf);
    }

    fn write(&mut self, _reg: u8, _data: &[u8]) {}

    fn read_raw(&mut self, buf: &mut [u8]) {
        let mut queue = self.feed.0.lock().unwrap();
        for byte in buf.iter_mut() {
            *byte = queue.pop_front().unwrap_or(b'\n');
        }
    }
}

/// Fresh, empty directory for one test
pub(crate) fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("sensor_collect-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}
