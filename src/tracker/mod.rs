//! Process-wide outcome counters for one pipeline run.
//!
//! The [`Tracker`] is the only internal shared mutable state in the pipeline.
//! It is constructed once per run, handed to workers behind an `Arc`, and read
//! only at end-of-run for the summary. All access is serialized under a single
//! mutex; counts are never reset mid-run and never persisted.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Outcome kinds counted during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The aggregator does not know the record id.
    RecordNotFound,
    /// A record-level failure outside the other categories (aggregator
    /// transport error, side-file write failure).
    RecordFailed,
    /// The record failed one or more eligibility checks.
    Ineligible,
    /// Manifest fetch/parse failed, or its version is unsupported.
    ManifestFailed,
    /// An asset was fetched, validated, and stored.
    Stored,
    /// An asset's destination was already populated.
    SkippedExists,
    /// An asset's payload sniffed as an error document.
    InvalidType,
    /// An asset's fetch or store failed.
    FailedIngest,
    /// An asset was uploaded to the target repository.
    Published,
    /// The target repository already held the asset's bytes.
    Duplicate,
    /// An asset was not publishable (policy skip).
    SkippedPublish,
    /// An upload was attempted and rejected or errored.
    FailedPublish,
    /// All checks passed but the upload was withheld (dry run).
    DryRun,
}

impl Outcome {
    /// Stable order and labels for summary rendering.
    const ALL: [(Outcome, &'static str); 13] = [
        (Outcome::RecordNotFound, "records not found"),
        (Outcome::RecordFailed, "records failed"),
        (Outcome::Ineligible, "records ineligible"),
        (Outcome::ManifestFailed, "manifests failed"),
        (Outcome::Stored, "assets stored"),
        (Outcome::SkippedExists, "assets already present"),
        (Outcome::InvalidType, "assets with invalid type"),
        (Outcome::FailedIngest, "assets failed"),
        (Outcome::Published, "assets published"),
        (Outcome::Duplicate, "duplicates at target"),
        (Outcome::SkippedPublish, "assets skipped at publish"),
        (Outcome::FailedPublish, "uploads failed"),
        (Outcome::DryRun, "uploads withheld (dry run)"),
    ];
}

/// Counter state behind the tracker's single mutex.
#[derive(Debug, Default)]
struct TrackerState {
    counts: HashMap<Outcome, u64>,
    bytes_stored: u64,
}

/// Thread-safe outcome counters for one run.
#[derive(Debug, Default)]
pub struct Tracker {
    state: Mutex<TrackerState>,
}

impl Tracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments an outcome counter by one.
    pub fn increment(&self, kind: Outcome) {
        self.increment_by(kind, 1);
    }

    /// Increments an outcome counter by `amount`.
    pub fn increment_by(&self, kind: Outcome, amount: u64) {
        let mut state = self.lock();
        *state.counts.entry(kind).or_insert(0) += amount;
    }

    /// Adds stored bytes to the running total.
    pub fn add_bytes(&self, bytes: u64) {
        self.lock().bytes_stored += bytes;
    }

    /// Returns the current count for an outcome kind.
    #[must_use]
    pub fn count(&self, kind: Outcome) -> u64 {
        self.lock().counts.get(&kind).copied().unwrap_or(0)
    }

    /// Returns the total bytes stored this run.
    #[must_use]
    pub fn bytes_stored(&self) -> u64 {
        self.lock().bytes_stored
    }

    /// Renders the non-zero counters in a stable order.
    #[must_use]
    pub fn summary(&self) -> String {
        let state = self.lock();
        let mut lines: Vec<String> = Outcome::ALL
            .iter()
            .filter_map(|(kind, label)| {
                let count = state.counts.get(kind).copied().unwrap_or(0);
                (count > 0).then(|| format!("{label}: {count}"))
            })
            .collect();
        if state.bytes_stored > 0 {
            lines.push(format!("bytes stored: {}", state.bytes_stored));
        }
        if lines.is_empty() {
            "nothing to report".to_string()
        } else {
            lines.join("\n")
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
