//! Final run summary

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::types::{FailReason, JobOutcome, MessageRange, TransferJob};
use crate::utils::{format_duration, format_size};

/// What a run did, returned by [`crate::relay::Relay::process_range`]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunSummary {
    /// The resolved range
    pub range: MessageRange,
    /// Jobs delivered to every destination
    pub succeeded: u64,
    /// Skipped jobs by reason label
    pub skipped: BTreeMap<String, u64>,
    /// Failed jobs (and unfetchable ids) by reason label
    pub failed: BTreeMap<String, u64>,
    /// Messages without transferable media
    pub unsupported: u64,
    /// Ids the source did not return
    pub missing: u64,
    /// Bytes staged from the source
    pub bytes_downloaded: u64,
    /// Bytes delivered, summed over destinations
    pub bytes_uploaded: u64,
    /// When the run began
    pub started_at: DateTime<Utc>,
    /// Wall time of the run
    pub elapsed: Duration,
    /// Whether cancel-all ended the run early
    pub cancelled: bool,
}

impl RunSummary {
    pub(crate) fn new(range: MessageRange, started_at: DateTime<Utc>) -> Self {
        Self {
            range,
            succeeded: 0,
            skipped: BTreeMap::new(),
            failed: BTreeMap::new(),
            unsupported: 0,
            missing: 0,
            bytes_downloaded: 0,
            bytes_uploaded: 0,
            started_at,
            elapsed: Duration::ZERO,
            cancelled: false,
        }
    }

    /// Total skipped jobs
    pub fn skipped_total(&self) -> u64 {
        self.skipped.values().sum()
    }

    /// Total failures
    pub fn failed_total(&self) -> u64 {
        self.failed.values().sum()
    }

    pub(crate) fn record(&mut self, job: &TransferJob) {
        self.bytes_downloaded += job.bytes_downloaded;
        self.bytes_uploaded += job.bytes_uploaded;
        match &job.outcome {
            JobOutcome::Succeeded => self.succeeded += 1,
            JobOutcome::Skipped(reason) => {
                *self.skipped.entry(reason.label().to_string()).or_default() += 1;
            }
            JobOutcome::Failed(reason) => {
                *self.failed.entry(reason.label().to_string()).or_default() += 1;
            }
            JobOutcome::Pending => {}
        }
    }

    pub(crate) fn record_unfetched(&mut self, count: u64) {
        *self
            .failed
            .entry(FailReason::Fetch.label().to_string())
            .or_default() += count;
    }
}

fn write_breakdown(f: &mut fmt::Formatter<'_>, reasons: &BTreeMap<String, u64>) -> fmt::Result {
    if reasons.is_empty() {
        return Ok(());
    }
    let parts: Vec<String> = reasons
        .iter()
        .map(|(reason, count)| format!("{}: {}", reason, count))
        .collect();
    write!(f, " ({})", parts.join(", "))
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.cancelled {
            writeln!(f, "Transfer cancelled")?;
        } else {
            writeln!(f, "Transfer complete")?;
        }
        writeln!(f, "Range: {}", self.range)?;
        writeln!(f, "Succeeded: {}", self.succeeded)?;

        write!(f, "Skipped: {}", self.skipped_total())?;
        write_breakdown(f, &self.skipped)?;
        writeln!(f)?;

        write!(f, "Failed: {}", self.failed_total())?;
        write_breakdown(f, &self.failed)?;
        writeln!(f)?;

        writeln!(
            f,
            "Unsupported: {} | Missing: {}",
            self.unsupported, self.missing
        )?;
        writeln!(
            f,
            "Transferred: {} downloaded, {} uploaded",
            format_size(self.bytes_downloaded),
            format_size(self.bytes_uploaded)
        )?;
        write!(f, "Elapsed: {}", format_duration(self.elapsed))
    }
}
