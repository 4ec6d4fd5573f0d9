use async_trait::async_trait;
use tracing::{debug, trace};

use super::SensorDriver;
use crate::bus::i2c::I2cTransport;
use crate::errors::{SensorError, SensorResult};
use crate::nmea::{parse_sentence, GpsFix, Sentence};

/// The XA1110 hands out at most 255 bytes per poll
const BYTES_PER_POLL: usize = 255;
/// Largest chunk the Pi's I2C controller reads reliably in one transfer
const CHUNK: usize = 32;
/// Sent by the receiver when its buffer is empty; real sentences end in `\r\n`
/// so line feeds are dropped and `\r` terminates a sentence
const FILLER: u8 = b'\n';
const TERMINATOR: u8 = b'\r';
/// Longest legal NMEA sentence is 82 characters
const MAX_PENDING: usize = 512;

/// SparkFun Titan X1 (MediaTek XA1110) GPS streaming NMEA over I2C
pub struct TitanGps {
    id: String,
    address: u8,
    pending: Vec<u8>,
    last_fix: Option<GpsFix>,
}

impl TitanGps {
    pub fn new(id: String, address: u8) -> Self {
        Self {
            id,
            address,
            pending: Vec::new(),
            last_fix: None,
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub async fn is_connected(&self, bus: &mut dyn I2cTransport) -> bool {
        bus.probe(self.address).await.is_ok()
    }

    /// Most recent fix seen by any poll
    pub fn last_fix(&self) -> Option<&GpsFix> {
        self.last_fix.as_ref()
    }

    async fn fetch(&mut self, bus: &mut dyn I2cTransport) -> SensorResult<usize> {
        let mut received = 0;
        let mut remaining = BYTES_PER_POLL;
        let mut chunk = [0u8; CHUNK];

        while remaining > 0 {
            let len = remaining.min(CHUNK);
            bus.read_raw(self.address, &mut chunk[..len]).await?;
            remaining -= len;

            let data = &chunk[..len];
            if data.iter().all(|&b| b == FILLER) {
                // Receiver drained
                break;
            }
            let before = self.pending.len();
            self.pending.extend(data.iter().copied().filter(|&b| b != FILLER));
            received += self.pending.len() - before;
        }

        Ok(received)
    }

    /// Split complete lines off the pending buffer and decode them
    fn drain_sentences(&mut self) -> Option<GpsFix> {
        let mut newest = None;

        while let Some(end) = self.pending.iter().position(|&b| b == TERMINATOR) {
            let line: Vec<u8> = self.pending.drain(..=end).collect();
            let line = String::from_utf8_lossy(&line);
            // Resync on the last start marker if a fragment was lost
            let line = match line.rfind('$') {
                Some(start) => line[start..].trim(),
                None => line.trim(),
            };
            if line.is_empty() {
                continue;
            }

            match parse_sentence(line) {
                Ok(Sentence::Gga(fix)) => {
                    trace!("[{}] GGA: {}", self.id, fix);
                    newest = Some(fix);
                }
                Ok(Sentence::Other(tag)) => trace!("[{}] skipping {}", self.id, tag),
                Err(e) => debug!("[{}] dropping sentence {:?}: {}", self.id, line, e),
            }
        }

        if self.pending.len() > MAX_PENDING {
            debug!("[{}] discarding {} bytes without a line end", self.id, self.pending.len());
            self.pending.clear();
        }

        newest
    }
}

#[async_trait]
impl SensorDriver for TitanGps {
    /// `None` when no new GGA sentence arrived since the last poll
    type Output = Option<GpsFix>;

    async fn init(&mut self, bus: &mut dyn I2cTransport) -> SensorResult<()> {
        if !self.is_connected(bus).await {
            return Err(SensorError::InitError {
                sensor: self.id.clone(),
                reason: format!("no receiver at {:#04x}", self.address),
            });
        }
        self.pending.clear();
        self.last_fix = None;
        Ok(())
    }

    async fn read(&mut self, bus: &mut dyn I2cTransport) -> SensorResult<Option<GpsFix>> {
        let received = self.fetch(bus).await?;
        trace!("[{}] received {} bytes", self.id, received);

        let fix = self.drain_sentences();
        if let Some(fix) = &fix {
            self.last_fix = Some(fix.clone());
        }
        Ok(fix)
    }

    fn id(&self) -> &str {
        &self.id
    }
}
