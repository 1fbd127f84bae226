//! Durable JSON Lines audit log.
//!
//! Uses JSON Lines format (.jsonl) for robustness:
//! - Each line is a complete JSON object
//! - Partial file corruption only affects individual lines
//! - Can be read even if a write was interrupted
//!
//! Unlike a telemetry writer, every append here is flushed AND fsynced
//! before returning: an intent record that only exists in a userspace
//! buffer would not survive a crash mid-call, which defeats its purpose.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::AuditResult;
use crate::record::AuditRecord;

/// Append-only, monotonically sequenced audit log.
pub struct AuditLog {
    path: PathBuf,
    file: File,
    next_seq: u64,
}

impl AuditLog {
    /// Open (or create) the audit log at `path`.
    ///
    /// Sequence numbers continue from the last parseable record, so a
    /// restart never reuses or rewinds `seq`. A trailing corrupt line
    /// (interrupted write) is tolerated and skipped.
    pub fn open(path: impl AsRef<Path>) -> AuditResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let next_seq = match File::open(&path) {
            Ok(existing) => Self::scan_next_seq(existing),
            Err(_) => 0,
        };

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        info!(path = %path.display(), next_seq, "Audit log opened (append mode)");

        Ok(Self {
            path,
            file,
            next_seq,
        })
    }

    fn scan_next_seq(existing: File) -> u64 {
        let reader = BufReader::new(existing);
        let mut last_seq = None;
        for line in reader.lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditRecord>(&line) {
                Ok(record) => last_seq = Some(record.seq),
                Err(e) => {
                    warn!(?e, "Skipping unparseable audit line");
                }
            }
        }
        last_seq.map_or(0, |s| s + 1)
    }

    /// Append a record, assigning the next sequence number.
    ///
    /// Returns only after the line is flushed and fsynced; callers may
    /// treat a returned `Ok` as durable.
    pub fn append(&mut self, mut record: AuditRecord) -> AuditResult<u64> {
        record.seq = self.next_seq;

        let line = serde_json::to_string(&record)?;
        self.file.write_all(line.as_bytes())?;
        self.file.write_all(b"\n")?;
        self.file.flush()?;
        self.file.sync_data()?;

        debug!(seq = record.seq, note = %record.note, "Audit record appended");

        self.next_seq += 1;
        Ok(record.seq)
    }

    /// The sequence number the next append will receive.
    #[must_use]
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
