//! File-backed audit trail: one JSON object per line.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use drift_engine::{AuditEntry, AuditLog, AuditSink};
use tracing::debug;

/// Appends audit entries to a JSON-lines file.
#[derive(Debug, Clone)]
pub struct JsonlAuditLog {
    path: PathBuf,
}

impl JsonlAuditLog {
    /// Creates a sink writing to `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Reads every entry into a queryable log. A missing file is an empty log.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a line is not an entry.
    pub fn load(&self) -> drift_engine::Result<AuditLog> {
        let log = AuditLog::new();
        if !self.path.exists() {
            return Ok(log);
        }

        let reader = BufReader::new(std::fs::File::open(&self.path)?);
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: AuditEntry = serde_json::from_str(&line)?;
            log.record(entry)?;
        }
        debug!(path = %self.path.display(), entries = log.len(), "audit log loaded");
        Ok(log)
    }
}

impl AuditSink for JsonlAuditLog {
    fn record(&self, entry: AuditEntry) -> drift_engine::Result<()> {
        let line = serde_json::to_string(&entry)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}
