use chrono::NaiveDateTime;
use std::fmt;

use crate::sensors::bme280::BarometerReading;

/// Written in place of any value that could not be read
pub const SENTINEL: &str = "n/a";

/// Column names of every daily log file
pub const HEADER: [&str; 16] = [
    "Hostname", "Location", "Date", "Time", "Temp", "Hum", "Press", "Alt", "TempB", "HumB", "PressB",
    "AltB", "SM1_M", "SM1_T", "SM2_M", "SM2_T",
];

/// Sensor columns following the four identity columns
pub const READING_COUNT: usize = HEADER.len() - 4;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// Probe voltages are logged with a fixed number of decimals
const VOLTAGE_DECIMALS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldFormat {
    /// Shortest round-trip decimal, always with a fractional part (`150.0`)
    Shortest,
    Fixed(usize),
}

/// One named column value, or the sentinel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub name: &'static str,
    pub value: Option<f64>,
    pub format: FieldFormat,
}

impl Reading {
    pub fn measured(name: &'static str, value: Option<f64>) -> Self {
        Self { name, value, format: FieldFormat::Shortest }
    }

    pub fn voltage(name: &'static str, value: Option<f64>) -> Self {
        Self { name, value, format: FieldFormat::Fixed(VOLTAGE_DECIMALS) }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.value, self.format) {
            (None, _) => f.write_str(SENTINEL),
            (Some(value), FieldFormat::Shortest) => {
                // Display never switches to exponent notation, but drops `.0`
                let text = value.to_string();
                if value.is_finite() && !text.contains('.') {
                    write!(f, "{}.0", text)
                } else {
                    f.write_str(&text)
                }
            }
            (Some(value), FieldFormat::Fixed(decimals)) => write!(f, "{:.*}", decimals, value),
        }
    }
}

/// Everything gathered from the sensors during one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sample {
    pub primary: Option<BarometerReading>,
    pub secondary: Option<BarometerReading>,
    pub sm1_moisture: Option<f64>,
    pub sm1_temperature: Option<f64>,
    pub sm2_moisture: Option<f64>,
    pub sm2_temperature: Option<f64>,
}

impl Sample {
    /// The sensor columns, in header order
    pub fn readings(&self) -> [Reading; READING_COUNT] {
        let primary = self.primary.as_ref();
        let secondary = self.secondary.as_ref();
        [
            Reading::measured("Temp", primary.map(|r| r.temperature)),
            Reading::measured("Hum", primary.map(|r| r.humidity)),
            Reading::measured("Press", primary.map(|r| r.pressure)),
            Reading::measured("Alt", primary.map(|r| r.altitude)),
            Reading::measured("TempB", secondary.map(|r| r.temperature)),
            Reading::measured("HumB", secondary.map(|r| r.humidity)),
            Reading::measured("PressB", secondary.map(|r| r.pressure)),
            Reading::measured("AltB", secondary.map(|r| r.altitude)),
            Reading::voltage("SM1_M", self.sm1_moisture),
            Reading::voltage("SM1_T", self.sm1_temperature),
            Reading::voltage("SM2_M", self.sm2_moisture),
            Reading::voltage("SM2_T", self.sm2_temperature),
        ]
    }

    pub fn missing(&self) -> usize {
        self.readings().iter().filter(|r| r.value.is_none()).count()
    }
}

/// One row of the daily log
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub hostname: String,
    pub location: String,
    pub timestamp: NaiveDateTime,
    pub sample: Sample,
}

impl LogRecord {
    pub fn new(hostname: String, location: String, timestamp: NaiveDateTime, sample: Sample) -> Self {
        Self {
            hostname,
            location,
            timestamp,
            sample,
        }
    }

    /// Field values in [`HEADER`] order
    pub fn fields(&self) -> Vec<String> {
        let mut fields = Vec::with_capacity(HEADER.len());
        fields.push(self.hostname.clone());
        fields.push(self.location.clone());
        fields.push(self.timestamp.format(DATE_FORMAT).to_string());
        fields.push(self.timestamp.format(TIME_FORMAT).to_string());
        fields.extend(self.sample.readings().iter().map(Reading::to_string));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn fixture_sample() -> Sample {
        Sample {
            primary: Some(BarometerReading {
                temperature: 21.5,
                humidity: 55.2,
                pressure: 1013.1,
                altitude: 150.0,
            }),
            secondary: Some(BarometerReading {
                temperature: 21.7,
                humidity: 54.9,
                pressure: 1013.5,
                altitude: 149.8,
            }),
            sm1_moisture: Some(1.23),
            sm1_temperature: Some(0.98),
            sm2_moisture: Some(1.30),
            sm2_temperature: Some(1.01),
        }
    }

    #[test]
    fn test_header_matches_reading_names() {
        let names: Vec<&str> = Sample::default().readings().iter().map(|r| r.name).collect();
        assert_eq!(names, HEADER[4..]);
    }

    #[test]
    fn test_fixture_row() {
        let record = LogRecord::new("Hostname".to_string(), "Location".to_string(), noon(), fixture_sample());
        assert_eq!(
            record.fields().join(","),
            "Hostname,Location,2024-06-01,12:00:00,21.5,55.2,1013.1,150.0,21.7,54.9,1013.5,149.8,1.23,0.98,1.30,1.01"
        );
    }

    #[test]
    fn test_primary_missing() {
        let sample = Sample {
            primary: None,
            ..fixture_sample()
        };
        let record = LogRecord::new("pi".to_string(), "bed-3".to_string(), noon(), sample);
        let fields = record.fields();

        assert_eq!(fields.len(), HEADER.len());
        assert_eq!(fields[4..8], ["n/a", "n/a", "n/a", "n/a"]);
        assert_eq!(fields[8..12], ["21.7", "54.9", "1013.5", "149.8"]);
        assert_eq!(record.sample.missing(), 4);
    }

    #[test]
    fn test_every_subset_keeps_all_columns() {
        // Each bit knocks out one of the six sources
        for mask in 0u8..64 {
            let full = fixture_sample();
            let sample = Sample {
                primary: full.primary.filter(|_| mask & 1 == 0),
                secondary: full.secondary.filter(|_| mask & 2 == 0),
                sm1_moisture: full.sm1_moisture.filter(|_| mask & 4 == 0),
                sm1_temperature: full.sm1_temperature.filter(|_| mask & 8 == 0),
                sm2_moisture: full.sm2_moisture.filter(|_| mask & 16 == 0),
                sm2_temperature: full.sm2_temperature.filter(|_| mask & 32 == 0),
            };
            let record = LogRecord::new("h".to_string(), "l".to_string(), noon(), sample);
            let fields = record.fields();
            assert_eq!(fields.len(), 16);

            let expected_missing = 4 * (mask & 3).count_ones() as usize + (mask >> 2).count_ones() as usize;
            assert_eq!(fields.iter().filter(|f| *f == SENTINEL).count(), expected_missing);
        }
    }

    #[test]
    fn test_reading_formats() {
        assert_eq!(Reading::measured("Temp", Some(21.53215332)).to_string(), "21.53215332");
        assert_eq!(Reading::measured("Alt", Some(-3.0)).to_string(), "-3.0");
        assert_eq!(Reading::measured("Alt", Some(150.0)).to_string(), "150.0");
        assert_eq!(Reading::measured("Temp", Some(0.00003)).to_string(), "0.00003");
        assert_eq!(Reading::measured("Temp", Some(-0.000012)).to_string(), "-0.000012");
        assert_eq!(Reading::measured("Press", Some(1e16)).to_string(), "10000000000000000.0");
        assert_eq!(Reading::voltage("SM1_M", Some(1.2345)).to_string(), "1.23");
        assert_eq!(Reading::voltage("SM1_M", None).to_string(), "n/a");
    }
}
