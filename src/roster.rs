use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::{AttendanceRecord, AttendanceStatus, Student};
use crate::stats::per_student_rate;

const ALL_GRADES: &str = "All";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RosterFilter {
    pub grade: Option<String>,
    #[serde(default, rename = "q")]
    pub query: String,
}

impl RosterFilter {
    pub fn matches(&self, student: &Student) -> bool {
        let grade_ok = match self.grade.as_deref() {
            None | Some(ALL_GRADES) | Some("") => true,
            Some(grade) => student.grade == grade,
        };

        let needle = self.query.trim().to_lowercase();
        grade_ok && (needle.is_empty() || student.full_name().to_lowercase().contains(&needle))
    }
}

pub fn filter_students<'a>(students: &'a [Student], filter: &RosterFilter) -> Vec<&'a Student> {
    students.iter().filter(|s| filter.matches(s)).collect()
}

pub fn grades(students: &[Student]) -> Vec<String> {
    students
        .iter()
        .map(|s| s.grade.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DraftEntry {
    pub student_id: String,
    pub status: AttendanceStatus,
}

/// Editable attendance sheet for one date, covering the whole roster.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct AttendanceDraft {
    pub date: NaiveDate,
    pub entries: Vec<DraftEntry>,
}

impl AttendanceDraft {
    /// Each student starts at their recorded status for `date`, or
    /// `Present` when nothing has been recorded yet.
    pub fn for_date(
        date: NaiveDate,
        students: &[Student],
        attendance: &[AttendanceRecord],
    ) -> Self {
        let entries = students
            .iter()
            .map(|student| {
                let status = attendance
                    .iter()
                    .find(|a| a.student_id == student.id && a.date == date)
                    .map(|a| a.status)
                    .unwrap_or(AttendanceStatus::Present);
                DraftEntry {
                    student_id: student.id.clone(),
                    status,
                }
            })
            .collect();

        Self { date, entries }
    }

    pub fn set_status(&mut self, student_id: &str, status: AttendanceStatus) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.student_id == student_id) {
            entry.status = status;
        }
    }

    // Full-roster batch: every student on the sheet is submitted.
    pub fn into_batch(self) -> Vec<AttendanceRecord> {
        let date = self.date;
        self.entries
            .into_iter()
            .map(|e| AttendanceRecord::new(e.student_id, date, e.status))
            .collect()
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateBand {
    Excellent,
    Fair,
    Poor,
}

impl RateBand {
    pub fn from_rate(rate: u32) -> Self {
        if rate >= 90 {
            RateBand::Excellent
        } else if rate >= 75 {
            RateBand::Fair
        } else {
            RateBand::Poor
        }
    }
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StudentCard {
    #[serde(flatten)]
    pub student: Student,
    pub total_days: usize,
    pub attendance_rate: u32,
    pub band: RateBand,
}

pub fn student_overview(students: &[Student], attendance: &[AttendanceRecord]) -> Vec<StudentCard> {
    students
        .iter()
        .map(|student| {
            let rate = per_student_rate(&student.id, attendance);
            StudentCard {
                student: student.clone(),
                total_days: attendance.iter().filter(|a| a.student_id == student.id).count(),
                attendance_rate: rate,
                band: RateBand::from_rate(rate),
            }
        })
        .collect()
}
