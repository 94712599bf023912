//! Progress reporting for import batches
//!
//! JSON-line messages on stderr so scripts driving the CLI can follow a batch.

use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use crate::error::{ImportBatchError, ImportError};
use crate::models::{ImportOutcome, ImportProgress};

/// Start message sent when a batch begins
#[derive(Debug, Clone, Serialize)]
pub struct StartMessage {
    /// Message type identifier
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    /// Number of files in the batch
    pub total: usize,
    /// Library receiving the files
    pub library: String,
}

impl StartMessage {
    pub fn new(seq: u64, ts: u64, total: usize, library: String) -> Self {
        Self {
            msg_type: "start",
            seq,
            ts,
            total,
            library,
        }
    }
}

/// Progress message sent after a file finishes
#[derive(Debug, Clone, Serialize)]
pub struct ProgressMessage {
    /// Message type identifier ("p" for progress)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    pub seq: u64,
    pub ts: u64,
    /// Files finished so far
    pub done: usize,
    pub total: usize,
    /// Whether the latest file was imported
    pub ok: bool,
    /// Latest finished file
    pub path: String,
    /// Estimated remaining time in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_ms: Option<u64>,
}

impl ProgressMessage {
    pub fn new(
        seq: u64,
        ts: u64,
        progress: &ImportProgress,
        eta_ms: Option<u64>,
    ) -> Self {
        Self {
            msg_type: "p",
            seq,
            ts,
            done: progress.completed,
            total: progress.total,
            ok: progress.succeeded,
            path: progress.path.to_string_lossy().to_string(),
            eta_ms,
        }
    }
}

/// Error message sent for a failed file or a failed batch
#[derive(Debug, Clone, Serialize)]
pub struct ErrorProgressMessage {
    /// Message type identifier ("err" for error)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    pub seq: u64,
    pub ts: u64,
    /// Error category
    pub error_type: String,
    pub message: String,
    /// Path that caused the error (if available)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ErrorProgressMessage {
    pub fn new(
        seq: u64,
        ts: u64,
        error_type: String,
        message: String,
        path: Option<String>,
    ) -> Self {
        Self {
            msg_type: "err",
            seq,
            ts,
            error_type,
            message,
            path,
        }
    }
}

/// Done message sent when a batch completes
#[derive(Debug, Clone, Serialize)]
pub struct DoneMessage {
    /// Message type identifier ("done" for completion)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    pub seq: u64,
    pub ts: u64,
    /// Files in the batch
    #[serde(rename = "tf")]
    pub total_files: usize,
    /// Files imported
    #[serde(rename = "nf")]
    pub imported: usize,
    /// Number of failed files
    #[serde(rename = "ec")]
    pub error_count: usize,
    pub cancelled: bool,
    /// Batch duration in milliseconds
    pub ms: u64,
}

impl DoneMessage {
    pub fn new(seq: u64, ts: u64, outcome: &ImportOutcome) -> Self {
        Self {
            msg_type: "done",
            seq,
            ts,
            total_files: outcome.total,
            imported: outcome.records.len(),
            error_count: outcome.error_count(),
            cancelled: outcome.cancelled,
            ms: outcome.duration_ms,
        }
    }
}

/// Progress reporter writing JSON lines to stderr
///
/// Progress messages are rate limited to one per interval; the final file of
/// a batch is always reported. Start, error and done messages are never
/// suppressed.
pub struct ProgressReporter {
    enabled: bool,
    /// Minimum interval between progress messages in milliseconds
    interval_ms: u64,
    /// Last time a progress message went out
    last_report: Mutex<Option<Instant>>,
    /// Sequence number for messages
    seq: AtomicU64,
    start_time: Instant,
}

impl ProgressReporter {
    pub fn new(enabled: bool, interval_ms: u64) -> Self {
        Self {
            enabled,
            interval_ms,
            last_report: Mutex::new(None),
            seq: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Check if enough time has passed since the last progress message
    pub fn should_report(&self) -> bool {
        if !self.enabled {
            return false;
        }
        let last = self.last_report.lock().unwrap_or_else(PoisonError::into_inner);
        match *last {
            Some(at) => at.elapsed().as_millis() as u64 >= self.interval_ms,
            None => true,
        }
    }

    /// Get the next sequence number (monotonically increasing)
    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Milliseconds since reporter creation
    pub fn current_timestamp(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Output a serializable message to stderr as JSON
    pub fn output_to_stderr<T: Serialize>(&self, msg: &T) {
        if let Ok(json) = serde_json::to_string(msg) {
            eprintln!("{}", json);
            std::io::stderr().flush().ok();
        }
    }

    pub fn report_start(&self, total: usize, library: &Path) {
        if !self.enabled {
            return;
        }
        let msg = StartMessage::new(
            self.next_seq(),
            self.current_timestamp(),
            total,
            library.to_string_lossy().to_string(),
        );
        self.output_to_stderr(&msg);
    }

    /// Report a finished file. Returns true if a message was written.
    pub fn report_progress(&self, progress: &ImportProgress) -> bool {
        if !self.enabled {
            return false;
        }
        let is_last = progress.completed >= progress.total;
        if !is_last && !self.should_report() {
            return false;
        }

        let msg = ProgressMessage::new(
            self.next_seq(),
            self.current_timestamp(),
            progress,
            self.estimate_remaining(progress),
        );
        self.output_to_stderr(&msg);
        *self.last_report.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
        true
    }

    /// Linear extrapolation from the files finished so far
    fn estimate_remaining(&self, progress: &ImportProgress) -> Option<u64> {
        if progress.completed == 0 || progress.completed >= progress.total {
            return None;
        }
        let elapsed = self.current_timestamp();
        let per_file = elapsed / progress.completed as u64;
        Some(per_file * (progress.total - progress.completed) as u64)
    }

    /// Report a failed file immediately
    pub fn report_error(&self, error: &ImportError) {
        if !self.enabled {
            return;
        }
        let msg = ErrorProgressMessage::new(
            self.next_seq(),
            self.current_timestamp(),
            error.kind.as_str().to_string(),
            error.message.clone(),
            error.path.as_ref().map(|p| p.to_string_lossy().to_string()),
        );
        self.output_to_stderr(&msg);
    }

    /// Report a batch that could not start
    pub fn report_batch_error(&self, error: &ImportBatchError) {
        if !self.enabled {
            return;
        }
        let path = match error {
            ImportBatchError::StorageUnavailable { path, .. } => path.to_string_lossy().to_string(),
        };
        let msg = ErrorProgressMessage::new(
            self.next_seq(),
            self.current_timestamp(),
            "storage_unavailable".to_string(),
            error.to_string(),
            Some(path),
        );
        self.output_to_stderr(&msg);
    }

    pub fn report_done(&self, outcome: &ImportOutcome) {
        if !self.enabled {
            return;
        }
        let msg = DoneMessage::new(self.next_seq(), self.current_timestamp(), outcome);
        self.output_to_stderr(&msg);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}
