//! Minimal NMEA 0183 decoding for the GGA fix sentence.

use chrono::NaiveTime;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NmeaError {
    #[error("sentence does not start with '$'")]
    MissingStart,

    #[error("checksum mismatch: sentence says {expected:02X}, computed {actual:02X}")]
    BadChecksum { expected: u8, actual: u8 },

    #[error("malformed {sentence} field '{field}': {value:?}")]
    BadField {
        sentence: &'static str,
        field: &'static str,
        value: String,
    },
}

/// Position fix decoded from a GGA sentence
#[derive(Debug, Clone, PartialEq)]
pub struct GpsFix {
    /// UTC time of the fix
    pub time: Option<NaiveTime>,
    /// Decimal degrees, south negative
    pub latitude: Option<f64>,
    /// Decimal degrees, west negative
    pub longitude: Option<f64>,
    /// Metres above mean sea level
    pub altitude: Option<f64>,
    pub satellites: Option<u8>,
    /// 0 = no fix, 1 = GPS, 2 = DGPS, ...
    pub quality: u8,
}

impl GpsFix {
    pub fn has_position(&self) -> bool {
        self.quality > 0 && self.latitude.is_some() && self.longitude.is_some()
    }
}

impl fmt::Display for GpsFix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn or_na<T: fmt::Display>(value: &Option<T>) -> String {
            value.as_ref().map_or_else(|| "n/a".to_string(), |v| v.to_string())
        }
        write!(
            f,
            "Latitude: {}, Longitude: {}, Time: {}",
            or_na(&self.latitude),
            or_na(&self.longitude),
            or_na(&self.time)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sentence {
    Gga(GpsFix),
    /// Any other sentence, by its type tag (e.g. `GPRMC`)
    Other(String),
}

/// Parse one sentence, without the trailing line terminator
pub fn parse_sentence(line: &str) -> Result<Sentence, NmeaError> {
    let body = line.trim().strip_prefix('$').ok_or(NmeaError::MissingStart)?;

    let body = match body.split_once('*') {
        Some((body, checksum)) => {
            let expected = u8::from_str_radix(checksum.trim(), 16).map_err(|_| NmeaError::BadField {
                sentence: "NMEA",
                field: "checksum",
                value: checksum.to_string(),
            })?;
            let actual = checksum_of(body);
            if expected != actual {
                return Err(NmeaError::BadChecksum { expected, actual });
            }
            body
        }
        None => body,
    };

    let mut fields = body.split(',');
    let tag = fields.next().unwrap_or_default();
    // Talker ID (GP, GN, GL, ...) followed by the sentence type
    if tag.len() == 5 && tag.ends_with("GGA") {
        let fields: Vec<&str> = fields.collect();
        return parse_gga(&fields).map(Sentence::Gga);
    }
    Ok(Sentence::Other(tag.to_string()))
}

/// XOR of every byte between `$` and `*`
pub fn checksum_of(body: &str) -> u8 {
    body.bytes().fold(0, |acc, b| acc ^ b)
}

fn parse_gga(fields: &[&str]) -> Result<GpsFix, NmeaError> {
    let field = |i: usize| fields.get(i).copied().unwrap_or_default();

    let time = parse_time(field(0))?;
    let latitude = parse_coordinate(field(1), field(2), 2, "latitude")?;
    let longitude = parse_coordinate(field(3), field(4), 3, "longitude")?;
    let quality = parse_optional::<u8>(field(5), "quality")?.unwrap_or(0);
    let satellites = parse_optional::<u8>(field(6), "satellites")?;
    let altitude = parse_optional::<f64>(field(8), "altitude")?;

    Ok(GpsFix {
        time,
        latitude,
        longitude,
        altitude,
        satellites,
        quality,
    })
}

fn bad(field: &'static str, value: &str) -> NmeaError {
    NmeaError::BadField {
        sentence: "GGA",
        field,
        value: value.to_string(),
    }
}

fn parse_optional<T: std::str::FromStr>(value: &str, field: &'static str) -> Result<Option<T>, NmeaError> {
    if value.is_empty() {
        return Ok(None);
    }
    value.parse().map(Some).map_err(|_| bad(field, value))
}

/// `hhmmss` or `hhmmss.sss`
fn parse_time(value: &str) -> Result<Option<NaiveTime>, NmeaError> {
    if value.is_empty() {
        return Ok(None);
    }
    let format = if value.contains('.') { "%H%M%S%.f" } else { "%H%M%S" };
    NaiveTime::parse_from_str(value, format)
        .map(Some)
        .map_err(|_| bad("time", value))
}

/// `ddmm.mmmm` / `dddmm.mmmm` plus hemisphere into signed decimal degrees
fn parse_coordinate(
    value: &str,
    hemisphere: &str,
    degree_digits: usize,
    field: &'static str,
) -> Result<Option<f64>, NmeaError> {
    if value.is_empty() {
        return Ok(None);
    }
    if value.len() <= degree_digits || !value.is_char_boundary(degree_digits) {
        return Err(bad(field, value));
    }

    let (degrees, minutes) = value.split_at(degree_digits);
    let degrees: f64 = degrees.parse().map_err(|_| bad(field, value))?;
    let minutes: f64 = minutes.parse().map_err(|_| bad(field, value))?;
    if minutes >= 60.0 {
        return Err(bad(field, value));
    }

    let magnitude = degrees + minutes / 60.0;
    match hemisphere {
        "N" | "E" => Ok(Some(magnitude)),
        "S" | "W" => Ok(Some(-magnitude)),
        _ => Err(bad(field, hemisphere)),
    }
}
