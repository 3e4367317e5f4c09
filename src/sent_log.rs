use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Serialize, Serializer};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

pub const NO_CC: &str = "none";

/// One row of the sent log. Field order is column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentRecord {
    pub timestamp: DateTime<Local>,
    pub role: String,
    pub sender: String,
    pub subject: String,
    #[serde(serialize_with = "cc_or_none")]
    pub cc: Option<String>,
}

fn cc_or_none<S: Serializer>(cc: &Option<String>, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(cc.as_deref().unwrap_or(NO_CC))
}

pub trait LogSink {
    fn record(&mut self, entry: &SentRecord) -> Result<()>;
}

/// Append-only CSV of every reply that went out.
pub struct CsvSentLog {
    path: PathBuf,
}

impl CsvSentLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for CsvSentLog {
    fn record(&mut self, entry: &SentRecord) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file_exists = self.path.exists();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open sent log: {}", self.path.display()))?;

        let mut wtr = csv::WriterBuilder::new()
            .has_headers(!file_exists)
            .from_writer(file);
        wtr.serialize(entry)
            .with_context(|| format!("Failed to write sent log: {}", self.path.display()))?;
        wtr.flush()
            .with_context(|| format!("Failed to write sent log: {}", self.path.display()))?;
        Ok(())
    }
}
