//! Deduplication stage
//!
//! A single thread owns both dedup sets and makes every admission decision, so
//! "first record wins" holds no matter how many validator workers feed it.

use crossbeam_channel::{Receiver, Sender};
use std::collections::HashSet;
use std::net::Ipv4Addr;

use crate::record::Record;

use super::tracker::ImportTracker;

/// Decisions are folded into the tracker every this many candidates.
const TRACKER_FLUSH_INTERVAL: u64 = 4096;

/// Verdict for one candidate record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    DuplicateIp,
    DuplicateCoordinates,
}

/// Remembers every IP and coordinate key admitted during a run.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen_ips: HashSet<Ipv4Addr>,
    seen_coordinates: HashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether `record` is the first of its IP and of its coordinates.
    ///
    /// Keys are only remembered when the record is admitted.
    pub fn admit(&mut self, record: &Record) -> Admission {
        // The validator only lets canonical dotted-decimal text through, so
        // the parsed address identifies the text exactly.
        let ip_key = record.ip().parse::<Ipv4Addr>().ok();
        let ip_seen = match ip_key {
            Some(addr) => self.seen_ips.contains(&addr),
            None => false,
        };
        if ip_seen {
            return Admission::DuplicateIp;
        }

        let coordinate_key = record.coordinate_key();
        if self.seen_coordinates.contains(&coordinate_key) {
            return Admission::DuplicateCoordinates;
        }

        if let Some(addr) = ip_key {
            self.seen_ips.insert(addr);
        }
        self.seen_coordinates.insert(coordinate_key);
        Admission::Admitted
    }

    pub fn admitted(&self) -> usize {
        self.seen_coordinates.len()
    }
}

#[derive(Default)]
struct PendingCounts {
    admitted: u64,
    duplicate_ip: u64,
    duplicate_coordinates: u64,
}

impl PendingCounts {
    fn total(&self) -> u64 {
        self.admitted + self.duplicate_ip + self.duplicate_coordinates
    }

    fn flush(&mut self, tracker: &ImportTracker) {
        tracker.record_admissions(self.admitted, self.duplicate_ip, self.duplicate_coordinates);
        *self = Self::default();
    }
}

/// Dedup thread: the single admission point between validators and the sink.
///
/// Returns when every validator has hung up (or the sink is gone).
pub(crate) fn dedup_thread(
    candidate_receiver: Receiver<Record>,
    admitted_sender: Sender<Record>,
    tracker: ImportTracker,
) {
    let mut dedup = Deduplicator::new();
    let mut pending = PendingCounts::default();

    while let Ok(record) = candidate_receiver.recv() {
        match dedup.admit(&record) {
            Admission::Admitted => {
                pending.admitted += 1;
                if admitted_sender.send(record).is_err() {
                    tracing::error!("batch sink hung up; stopping deduplication");
                    break;
                }
            }
            Admission::DuplicateIp => pending.duplicate_ip += 1,
            Admission::DuplicateCoordinates => pending.duplicate_coordinates += 1,
        }

        if pending.total() >= TRACKER_FLUSH_INTERVAL {
            pending.flush(&tracker);
        }
    }

    pending.flush(&tracker);
    tracing::debug!(admitted = dedup.admitted(), "deduplication finished");
}
