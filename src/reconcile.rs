//! Attendance reconciliation: replace-by-key upsert of a submitted batch.
//!
//! Only (student, date) pairs that appear in the batch are touched. Records
//! for students left out of the batch survive unchanged, so a full-day
//! resubmission has to name every student explicitly.

use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::model::AttendanceRecord;
use crate::store::RecordStore;

/// Outcome of one reconciliation, for logging and API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSummary {
    pub submitted: usize,
    pub replaced: usize,
    pub total_records: usize,
}

impl RecordStore {
    pub fn reconcile(&mut self, batch: Vec<AttendanceRecord>) -> ReconcileSummary {
        let submitted = batch.len();
        let batch = collapse_batch(batch);

        let before = self.attendance.len();
        {
            let keys: HashSet<(&str, NaiveDate)> =
                batch.iter().map(AttendanceRecord::key).collect();
            self.attendance
                .retain(|existing| !keys.contains(&existing.key()));
        }
        let replaced = before - self.attendance.len();

        self.attendance.extend(batch);

        let summary = ReconcileSummary {
            submitted,
            replaced,
            total_records: self.attendance.len(),
        };
        info!(
            batch_size = summary.submitted,
            replaced = summary.replaced,
            total = summary.total_records,
            "attendance reconciled"
        );
        summary
    }
}

// A batch that names the same pair twice keeps only its last entry, in the
// position that entry held.
fn collapse_batch(batch: Vec<AttendanceRecord>) -> Vec<AttendanceRecord> {
    let submitted = batch.len();
    let mut seen: HashSet<(String, NaiveDate)> = HashSet::with_capacity(batch.len());
    let mut kept: Vec<AttendanceRecord> = batch
        .into_iter()
        .rev()
        .filter(|r| seen.insert((r.student_id.clone(), r.date)))
        .collect();
    kept.reverse();

    if kept.len() < submitted {
        debug!(kept = kept.len(), "collapsed repeated pairs within batch");
    }
    kept
}
