//! Append-only CSV record store

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info};

use super::{RecordSink, SinkError};
use crate::reading::{Reading, ReadingRecord};

/// Column header, written only when the file is new or empty
pub const CSV_HEADER: [&str; 4] = ["timestamp", "value", "raw_hex", "status"];

/// CSV file sink
///
/// Existing content is never truncated. Each row is encoded in memory and
/// handed to the OS in a single write.
#[derive(Debug)]
pub struct CsvSink {
    path: PathBuf,
    name: String,
    file: Mutex<File>,
}

impl CsvSink {
    /// Open (or create) `path` for appending
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| SinkError::Io(format!("Failed to open {}: {e}", path.display())))?;

        if file.metadata()?.len() == 0 {
            let mut header = csv::Writer::from_writer(Vec::new());
            header.write_record(CSV_HEADER)?;
            file.write_all(&into_bytes(header)?)?;
            debug!("CSV header written: {}", path.display());
        }

        info!("Record store: {}", path.display());

        Ok(Self {
            name: path.display().to_string(),
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn encode(record: &ReadingRecord) -> Result<Vec<u8>, SinkError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer.serialize(record)?;
        into_bytes(writer)
    }
}

fn into_bytes(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, SinkError> {
    writer
        .into_inner()
        .map_err(|e| SinkError::Encode(e.to_string()))
}

impl RecordSink for CsvSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn append(&self, reading: &Reading) -> Result<(), SinkError> {
        let row = Self::encode(&reading.record())?;
        let mut file = self.file.lock();
        file.write_all(&row)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        let file = self.file.lock();
        file.sync_data()?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use press_protocol::ValidationOutcome;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn reading(outcome: ValidationOutcome, raw: &[u8]) -> Reading {
        let ts = Local.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        Reading::new(ts, raw.to_vec(), outcome)
    }

    #[test]
    fn test_new_file_gets_header_and_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pressure_data.csv");

        let sink = CsvSink::open(&path).unwrap();
        sink.append(&reading(
            ValidationOutcome::Valid(100),
            &[0x01, 0x03, 0x02, 0x00, 0x64, 0xB9, 0xAF],
        ))
        .unwrap();
        sink.append(&reading(ValidationOutcome::Timeout, &[])).unwrap();
        sink.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines,
            vec![
                "timestamp,value,raw_hex,status",
                "2025-03-14 09:26:53.000,100,0103020064B9AF,valid",
                "2025-03-14 09:26:53.000,,,timeout",
            ]
        );
    }

    #[test]
    fn test_concurrent_appends_keep_rows_whole() {
        const THREADS: u16 = 8;
        const ROWS: u16 = 50;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shared.csv");
        let sink = Arc::new(CsvSink::open(&path).unwrap());

        let workers: Vec<_> = (0..THREADS)
            .map(|t| {
                let sink = Arc::clone(&sink);
                std::thread::spawn(move || {
                    for i in 0..ROWS {
                        let value = t * 1000 + i;
                        let [hi, lo] = value.to_be_bytes();
                        let raw = [0x01, 0x03, 0x02, hi, lo, 0x00, 0x00];
                        sink.append(&reading(ValidationOutcome::Valid(value), &raw))
                            .unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        sink.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), usize::from(THREADS * ROWS) + 1);
        assert_eq!(content.matches("timestamp,value,raw_hex,status").count(), 1);
        assert!(content.starts_with("timestamp,value,raw_hex,status\n"));

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&path)
            .unwrap();
        let mut values = Vec::new();
        for record in reader.records() {
            let record = record.unwrap();
            assert_eq!(record.len(), 4);
            assert_eq!(&record[3], "valid");
            values.push(record[1].parse::<u16>().unwrap());
        }
        values.sort_unstable();
        let expected: Vec<u16> = (0..THREADS)
            .flat_map(|t| (0..ROWS).map(move |i| t * 1000 + i))
            .collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn test_reopen_appends_without_second_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.csv");

        {
            let sink = CsvSink::open(&path).unwrap();
            sink.append(&reading(ValidationOutcome::CrcMismatch, &[0x01])).unwrap();
        }
        {
            let sink = CsvSink::open(&path).unwrap();
            sink.append(&reading(ValidationOutcome::HeaderMismatch, &[0x02]))
                .unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("timestamp,value").count(), 1);
        assert_eq!(content.lines().count(), 3);
        assert!(content.contains(",,01,crc_mismatch"));
        assert!(content.contains(",,02,header_mismatch"));
    }

    #[test]
    fn test_existing_content_is_preserved() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("old.csv");
        std::fs::write(&path, "timestamp,value,raw_hex,status\nold,1,AA,valid\n").unwrap();

        let sink = CsvSink::open(&path).unwrap();
        sink.append(&reading(ValidationOutcome::LengthMismatch, &[0x01, 0x03]))
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("timestamp,value,raw_hex,status\nold,1,AA,valid\n"));
        assert!(content.ends_with(",,0103,length_mismatch\n"));
    }

    #[test]
    fn test_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("run").join("p.csv");
        let sink = CsvSink::open(&path).unwrap();
        assert_eq!(sink.path(), path.as_path());
        assert!(path.exists());
    }

    #[test]
    fn test_open_failure_is_io_error() {
        let dir = TempDir::new().unwrap();
        // a directory cannot be opened as the record file
        let err = CsvSink::open(dir.path()).unwrap_err();
        assert!(matches!(err, SinkError::Io(_)));
    }
}
