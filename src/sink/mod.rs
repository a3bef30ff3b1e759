//! Result sinks
//!
//! One record per settled page, appended as it settles. Workers never touch
//! the writer directly: they push records down an unbounded channel and a
//! dedicated writer task owns the sink, so slow disks never stall fetching.

use crate::config::{OutputConfig, OutputFormat};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Errors from writing crawl records
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),
}

/// Final outcome of one page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Fetched and parsed successfully
    Completed,
    /// Failed permanently after classification
    Failed,
    /// Dropped by shutdown before being fetched
    Abandoned,
}

/// One settled page
///
/// Flat on purpose so the same struct serializes cleanly to both JSON
/// Lines and CSV.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlRecord {
    pub url: String,
    pub depth: u32,
    pub outcome: Outcome,
    pub status: Option<u16>,
    pub attempts: u32,
    pub links_found: usize,
    pub title: Option<String>,
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

impl CrawlRecord {
    /// A success record
    pub fn completed(
        url: String,
        depth: u32,
        status: u16,
        attempts: u32,
        links_found: usize,
        title: Option<String>,
    ) -> Self {
        Self {
            url,
            depth,
            outcome: Outcome::Completed,
            status: Some(status),
            attempts,
            links_found,
            title,
            error: None,
            finished_at: Utc::now(),
        }
    }

    /// A permanent-failure record
    pub fn failed(url: String, depth: u32, status: Option<u16>, attempts: u32, error: String) -> Self {
        Self {
            url,
            depth,
            outcome: Outcome::Failed,
            status,
            attempts,
            links_found: 0,
            title: None,
            error: Some(error),
            finished_at: Utc::now(),
        }
    }

    /// A record for a page dropped by shutdown
    pub fn abandoned(url: String, depth: u32) -> Self {
        Self {
            url,
            depth,
            outcome: Outcome::Abandoned,
            status: None,
            attempts: 0,
            links_found: 0,
            title: None,
            error: None,
            finished_at: Utc::now(),
        }
    }
}

/// Destination for crawl records
pub trait RecordSink: Send {
    /// Appends one record
    fn record(&mut self, record: &CrawlRecord) -> Result<(), SinkError>;

    /// Flushes buffered output
    fn flush(&mut self) -> Result<(), SinkError>;
}

/// JSON Lines sink: one serialized record per line
pub struct JsonLinesSink {
    writer: BufWriter<File>,
}

impl JsonLinesSink {
    pub fn create(path: &Path) -> Result<Self, SinkError> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl RecordSink for JsonLinesSink {
    fn record(&mut self, record: &CrawlRecord) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// CSV sink with a header row
pub struct CsvSink {
    writer: csv::Writer<File>,
}

impl CsvSink {
    pub fn create(path: &Path) -> Result<Self, SinkError> {
        let writer = csv::Writer::from_path(path)?;
        Ok(Self { writer })
    }
}

impl RecordSink for CsvSink {
    fn record(&mut self, record: &CrawlRecord) -> Result<(), SinkError> {
        self.writer.serialize(record)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Discards every record
pub struct NullSink;

impl RecordSink for NullSink {
    fn record(&mut self, _record: &CrawlRecord) -> Result<(), SinkError> {
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Opens the sink named by the output configuration
pub fn open_sink(config: &OutputConfig) -> Result<Box<dyn RecordSink>, SinkError> {
    match config.format {
        OutputFormat::Jsonl => Ok(Box::new(JsonLinesSink::create(Path::new(&config.path))?)),
        OutputFormat::Csv => Ok(Box::new(CsvSink::create(Path::new(&config.path))?)),
        OutputFormat::None => Ok(Box::new(NullSink)),
    }
}

/// Spawns the writer task that owns a sink
///
/// Returns the sender side and the task handle. The task drains until every
/// sender is dropped, then flushes. Write errors are logged and do not stop
/// the crawl: losing a record is preferable to losing the run.
pub fn spawn_sink_writer(
    mut sink: Box<dyn RecordSink>,
) -> (mpsc::UnboundedSender<CrawlRecord>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<CrawlRecord>();

    let handle = tokio::spawn(async move {
        while let Some(record) = rx.recv().await {
            if let Err(e) = sink.record(&record) {
                tracing::error!("Failed to write record for {}: {}", record.url, e);
            }
        }
        if let Err(e) = sink.flush() {
            tracing::error!("Failed to flush output sink: {}", e);
        }
    });

    (tx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_records() -> Vec<CrawlRecord> {
        vec![
            CrawlRecord::completed(
                "https://example.com/".to_string(),
                0,
                200,
                1,
                3,
                Some("Example".to_string()),
            ),
            CrawlRecord::failed(
                "https://example.com/missing".to_string(),
                1,
                Some(404),
                1,
                "HTTP 404".to_string(),
            ),
        ]
    }

    #[test]
    fn test_jsonl_sink_writes_one_line_per_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.jsonl");

        let mut sink = JsonLinesSink::create(&path).unwrap();
        for record in sample_records() {
            sink.record(&record).unwrap();
        }
        sink.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["url"], "https://example.com/");
        assert_eq!(first["outcome"], "completed");
        assert_eq!(first["status"], 200);
        assert_eq!(first["links_found"], 3);

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["outcome"], "failed");
        assert_eq!(second["error"], "HTTP 404");
    }

    #[test]
    fn test_csv_sink_writes_header_and_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let mut sink = CsvSink::create(&path).unwrap();
        for record in sample_records() {
            sink.record(&record).unwrap();
        }
        sink.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("url,depth,outcome"));
        assert!(lines[1].contains("completed"));
        assert!(lines[2].contains("failed"));
    }

    #[test]
    fn test_open_sink_null() {
        let config = OutputConfig {
            format: OutputFormat::None,
            path: String::new(),
        };
        let mut sink = open_sink(&config).unwrap();
        sink.record(&sample_records()[0]).unwrap();
        sink.flush().unwrap();
    }

    #[tokio::test]
    async fn test_writer_task_drains_and_flushes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        let sink = Box::new(JsonLinesSink::create(&path).unwrap());

        let (tx, handle) = spawn_sink_writer(sink);
        for record in sample_records() {
            tx.send(record).unwrap();
        }
        drop(tx);
        handle.await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
