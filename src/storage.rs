use chrono::NaiveDate;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::errors::{StorageError, StorageResult};
use crate::record::{LogRecord, HEADER};

/// Daily CSV file for one host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    path: PathBuf,
    create_dirs: bool,
}

/// What one append did to the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    pub header_written: bool,
}

impl LogFile {
    /// `<dir>/<hostname>-<YYYYMMDD>.csv`
    pub fn for_day(dir: &Path, hostname: &str, date: NaiveDate) -> Self {
        let name = format!("{}-{}.csv", hostname, date.format("%Y%m%d"));
        Self {
            path: dir.join(name),
            create_dirs: true,
        }
    }

    /// Fail instead of creating a missing log directory
    pub fn without_dir_creation(mut self) -> Self {
        self.create_dirs = false;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row, writing the header first if the file is new or still empty.
    ///
    /// Creation is exclusive, so concurrent runs cannot both write a header to a
    /// fresh file. An empty leftover from an interrupted run also gets the header.
    pub fn append(&self, record: &LogRecord) -> StorageResult<AppendOutcome> {
        if self.create_dirs {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|source| StorageError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let (file, created) = self.open()?;
        let needs_header = created || Self::is_empty(&file, &self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(file);

        if needs_header {
            if created {
                info!("[storage] created {}", self.path.display());
            } else {
                info!("[storage] {} is empty, writing header", self.path.display());
            }
            writer.write_record(HEADER)?;
        }
        writer.write_record(record.fields())?;

        let file = writer.into_inner().map_err(|e| StorageError::Write {
            path: self.path.clone(),
            source: e.into_error(),
        })?;
        file.sync_data().map_err(|source| StorageError::Write {
            path: self.path.clone(),
            source,
        })?;

        debug!("[storage] appended row to {}", self.path.display());
        Ok(AppendOutcome {
            header_written: needs_header,
        })
    }

    fn is_empty(file: &File, path: &Path) -> StorageResult<bool> {
        file.metadata()
            .map(|meta| meta.len() == 0)
            .map_err(|source| StorageError::Open {
                path: path.to_path_buf(),
                source,
            })
    }

    fn open(&self) -> StorageResult<(File, bool)> {
        match OpenOptions::new().append(true).create_new(true).open(&self.path) {
            Ok(file) => Ok((file, true)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => OpenOptions::new()
                .append(true)
                .open(&self.path)
                .map(|file| (file, false))
                .map_err(|source| StorageError::Open {
                    path: self.path.clone(),
                    source,
                }),
            Err(source) => Err(StorageError::Open {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Sample;
    use crate::sensors::bme280::BarometerReading;
    use crate::testing::scratch_dir;

    fn record_at(date: NaiveDate, sample: Sample) -> LogRecord {
        LogRecord::new(
            "Hostname".to_string(),
            "Location".to_string(),
            date.and_hms_opt(12, 0, 0).unwrap(),
            sample,
        )
    }

    fn june(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_file_name() {
        let file = LogFile::for_day(Path::new("/home/pi/DATA/environmental"), "envpi", june(1));
        assert_eq!(file.path(), Path::new("/home/pi/DATA/environmental/envpi-20240601.csv"));
    }

    #[test]
    fn test_header_written_once_per_file() {
        let dir = scratch_dir("header-once");
        let file = LogFile::for_day(&dir, "Hostname", june(1));

        let first = file.append(&record_at(june(1), Sample::default())).unwrap();
        let second = file.append(&record_at(june(1), Sample::default())).unwrap();
        assert!(first.header_written);
        assert!(!second.header_written);

        let content = lines(file.path());
        assert_eq!(content.len(), 3);
        assert_eq!(content[0], HEADER.join(","));
        assert_eq!(
            content[1],
            "Hostname,Location,2024-06-01,12:00:00,n/a,n/a,n/a,n/a,n/a,n/a,n/a,n/a,n/a,n/a,n/a,n/a"
        );
        assert_eq!(content.iter().filter(|l| l.starts_with("Hostname,Location,Date")).count(), 1);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_empty_leftover_gets_header() {
        let dir = scratch_dir("empty-leftover");
        let file = LogFile::for_day(&dir, "h", june(1));
        fs::create_dir_all(&dir).unwrap();
        fs::write(file.path(), "").unwrap();

        let outcome = file.append(&record_at(june(1), Sample::default())).unwrap();
        assert!(outcome.header_written);

        let content = lines(file.path());
        assert_eq!(content.len(), 2);
        assert_eq!(content[0], HEADER.join(","));
        assert!(content[1].starts_with("Hostname,Location,2024-06-01,"));

        let again = file.append(&record_at(june(1), Sample::default())).unwrap();
        assert!(!again.header_written);
        assert_eq!(lines(file.path()).len(), 3);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_next_day_starts_new_file() {
        let dir = scratch_dir("next-day");
        let today = LogFile::for_day(&dir, "Hostname", june(1));
        let tomorrow = LogFile::for_day(&dir, "Hostname", june(2));

        today.append(&record_at(june(1), Sample::default())).unwrap();
        today.append(&record_at(june(1), Sample::default())).unwrap();
        let outcome = tomorrow.append(&record_at(june(2), Sample::default())).unwrap();

        assert!(outcome.header_written);
        assert_ne!(today.path(), tomorrow.path());
        assert_eq!(lines(today.path()).len(), 3);
        let next = lines(tomorrow.path());
        assert_eq!(next.len(), 2);
        assert_eq!(next[0], HEADER.join(","));
        assert!(next[1].contains(",2024-06-02,"));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_row_is_newline_terminated() {
        let dir = scratch_dir("terminator");
        let file = LogFile::for_day(&dir, "Hostname", june(1));
        let sample = Sample {
            primary: Some(BarometerReading {
                temperature: 21.5,
                humidity: 55.2,
                pressure: 1013.1,
                altitude: 150.0,
            }),
            ..Sample::default()
        };
        file.append(&record_at(june(1), sample)).unwrap();

        let raw = fs::read_to_string(file.path()).unwrap();
        assert!(raw.ends_with(",21.5,55.2,1013.1,150.0,n/a,n/a,n/a,n/a,n/a,n/a,n/a,n/a\n"));
        assert!(!raw.contains('\r'));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_directory_without_creation() {
        let dir = scratch_dir("no-create");
        let file = LogFile::for_day(&dir.join("nested"), "Hostname", june(1)).without_dir_creation();

        let err = file.append(&record_at(june(1), Sample::default())).unwrap_err();
        assert!(matches!(err, StorageError::Open { .. }));
        assert!(!file.path().exists());
    }

    #[test]
    fn test_unusable_directory() {
        let dir = scratch_dir("blocked");
        fs::create_dir_all(&dir).unwrap();
        let blocker = dir.join("not-a-dir");
        fs::write(&blocker, b"").unwrap();

        let file = LogFile::for_day(&blocker, "Hostname", june(1));
        let err = file.append(&record_at(june(1), Sample::default())).unwrap_err();
        assert!(matches!(err, StorageError::CreateDir { .. }));
        fs::remove_dir_all(&dir).unwrap();
    }
}
