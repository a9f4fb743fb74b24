use serde::Serialize;
use std::time::Duration;

use crate::validate::Rejection;

/// Per-reason rejection counters.
///
/// Validation rejections and dedup rejections are tracked separately but both
/// count as "invalid" in a [`RunSummary`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RejectionCounts {
    pub field_count: u64,
    pub empty_field: u64,
    pub unknown_column: u64,
    pub missing_field: u64,
    pub invalid_latitude: u64,
    pub invalid_longitude: u64,
    pub invalid_ip: u64,
    pub encoding: u64,
    pub duplicate_ip: u64,
    pub duplicate_coordinates: u64,
}

impl RejectionCounts {
    pub fn record(&mut self, rejection: &Rejection) {
        let counter = match rejection {
            Rejection::FieldCount { .. } => &mut self.field_count,
            Rejection::EmptyField { .. } => &mut self.empty_field,
            Rejection::UnknownColumn { .. } => &mut self.unknown_column,
            Rejection::MissingField { .. } => &mut self.missing_field,
            Rejection::InvalidLatitude => &mut self.invalid_latitude,
            Rejection::InvalidLongitude => &mut self.invalid_longitude,
            Rejection::InvalidIp => &mut self.invalid_ip,
            Rejection::Encoding => &mut self.encoding,
        };
        *counter += 1;
    }

    /// Lines rejected by the validator.
    pub fn validation_total(&self) -> u64 {
        self.field_count
            + self.empty_field
            + self.unknown_column
            + self.missing_field
            + self.invalid_latitude
            + self.invalid_longitude
            + self.invalid_ip
            + self.encoding
    }

    /// Candidates rejected by the deduplicator.
    pub fn duplicate_total(&self) -> u64 {
        self.duplicate_ip + self.duplicate_coordinates
    }

    pub fn total(&self) -> u64 {
        self.validation_total() + self.duplicate_total()
    }

    pub fn merge(&mut self, other: &RejectionCounts) {
        self.field_count += other.field_count;
        self.empty_field += other.empty_field;
        self.unknown_column += other.unknown_column;
        self.missing_field += other.missing_field;
        self.invalid_latitude += other.invalid_latitude;
        self.invalid_longitude += other.invalid_longitude;
        self.invalid_ip += other.invalid_ip;
        self.encoding += other.encoding;
        self.duplicate_ip += other.duplicate_ip;
        self.duplicate_coordinates += other.duplicate_coordinates;
    }
}

/// Counters accumulated while an import is running.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub lines_total: u64,
    pub chunks_read: u64,
    pub bytes_read: u64,
    pub valid: u64,
    pub rejections: RejectionCounts,
    pub batches_persisted: u64,
    pub batches_failed: u64,
    pub records_persisted: u64,
    pub records_lost: u64,
}

impl ImportStats {
    pub fn invalid(&self) -> u64 {
        self.rejections.total()
    }

    /// Freeze the counters into the summary returned to the caller.
    pub fn into_summary(self, elapsed: Duration) -> RunSummary {
        RunSummary {
            elapsed,
            lines_total: self.lines_total,
            valid: self.valid,
            invalid: self.rejections.total(),
            rejections: self.rejections,
            batches_persisted: self.batches_persisted,
            batches_failed: self.batches_failed,
            records_persisted: self.records_persisted,
            records_lost: self.records_lost,
        }
    }

    pub fn format_progress(&self) -> String {
        format!(
            "{} lines read ({} chunks), {} valid, {} invalid, {} records persisted",
            self.lines_total,
            self.chunks_read,
            self.valid,
            self.invalid(),
            self.records_persisted
        )
    }
}

/// Result of a completed (or cancelled) import run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    pub lines_total: u64,
    pub valid: u64,
    pub invalid: u64,
    pub rejections: RejectionCounts,
    pub batches_persisted: u64,
    pub batches_failed: u64,
    pub records_persisted: u64,
    pub records_lost: u64,
}

fn serialize_secs<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}

impl RunSummary {
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    pub fn format_summary(&self) -> String {
        let mut output = format!(
            "Imported {} valid records, rejected {} invalid ({} malformed, {} duplicate) of {} lines",
            self.valid,
            self.invalid,
            self.rejections.validation_total(),
            self.rejections.duplicate_total(),
            self.lines_total
        );

        let rounded = Duration::from_millis(self.elapsed.as_millis() as u64);
        output.push_str(&format!(" in {}", humantime::format_duration(rounded)));

        let millis = self.elapsed.as_millis();
        if millis > 0 && self.lines_total > 0 {
            let lines_per_sec = (self.lines_total as f64 * 1000.0) / millis as f64;
            output.push_str(&format!(" ({:.0} lines/s)", lines_per_sec));
        }

        if self.batches_failed > 0 {
            output.push_str(&format!(
                "; {} batches failed to persist ({} records lost)",
                self.batches_failed, self.records_lost
            ));
        }

        output
    }
}
