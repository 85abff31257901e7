//! Derived attendance statistics.
//!
//! Every function here is a pure function of the current snapshot and is
//! cheap enough to recompute on each read, so nothing is cached.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::{AttendanceRecord, AttendanceStatus, Student};

pub const DEFAULT_WINDOW: usize = 5;

#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatusBreakdown {
    pub present: usize,
    pub absent: usize,
    pub late: usize,
    pub excused: usize,
}

impl StatusBreakdown {
    pub fn count(&self, status: AttendanceStatus) -> usize {
        match status {
            AttendanceStatus::Present => self.present,
            AttendanceStatus::Absent => self.absent,
            AttendanceStatus::Late => self.late,
            AttendanceStatus::Excused => self.excused,
        }
    }

    pub fn total(&self) -> usize {
        self.present + self.absent + self.late + self.excused
    }

    // Pie chart slices, zero counts dropped
    pub fn slices(&self) -> Vec<ChartSlice> {
        AttendanceStatus::ALL
            .iter()
            .map(|&status| ChartSlice {
                name: status,
                value: self.count(status),
                color: status_color(status),
            })
            .filter(|slice| slice.value > 0)
            .collect()
    }
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ChartSlice {
    pub name: AttendanceStatus,
    pub value: usize,
    pub color: &'static str,
}

// One bar group of the recent-days chart
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct DailyTally {
    pub date: NaiveDate,
    pub present: usize,
    pub absent: usize,
    pub late: usize,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_students: usize,
    pub total_records: usize,
    pub distinct_days: usize,
    pub attendance_rate: u32,
    pub absent_count: usize,
    pub breakdown: StatusBreakdown,
    pub pie_chart: Vec<ChartSlice>,
    pub recent_days: Vec<DailyTally>,
}

impl DashboardStats {
    pub fn compute(students: &[Student], attendance: &[AttendanceRecord]) -> Self {
        let breakdown = status_breakdown(attendance);

        DashboardStats {
            total_students: students.len(),
            total_records: attendance.len(),
            distinct_days: distinct_dates(attendance).len(),
            attendance_rate: overall_rate(attendance),
            absent_count: breakdown.absent,
            pie_chart: breakdown.slices(),
            breakdown,
            recent_days: recent_window(attendance, DEFAULT_WINDOW),
        }
    }
}

/// Share of `Present` records as a whole percentage in `0..=100`.
///
/// Rounds half up and is `0` for an empty collection.
pub fn overall_rate(attendance: &[AttendanceRecord]) -> u32 {
    let present = attendance
        .iter()
        .filter(|a| a.status == AttendanceStatus::Present)
        .count();
    percentage(present, attendance.len())
}

pub fn per_student_rate(student_id: &str, attendance: &[AttendanceRecord]) -> u32 {
    let (present, total) = attendance
        .iter()
        .filter(|a| a.student_id == student_id)
        .fold((0, 0), |(present, total), a| {
            let hit = usize::from(a.status == AttendanceStatus::Present);
            (present + hit, total + 1)
        });
    percentage(present, total)
}

pub fn status_breakdown(attendance: &[AttendanceRecord]) -> StatusBreakdown {
    let mut breakdown = StatusBreakdown::default();
    for record in attendance {
        match record.status {
            AttendanceStatus::Present => breakdown.present += 1,
            AttendanceStatus::Absent => breakdown.absent += 1,
            AttendanceStatus::Late => breakdown.late += 1,
            AttendanceStatus::Excused => breakdown.excused += 1,
        }
    }
    breakdown
}

pub fn distinct_dates(attendance: &[AttendanceRecord]) -> Vec<NaiveDate> {
    attendance
        .iter()
        .map(|a| a.date)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Per-day Present/Absent/Late counts for the `n` latest distinct dates,
/// oldest first.
pub fn recent_window(attendance: &[AttendanceRecord], n: usize) -> Vec<DailyTally> {
    let dates = distinct_dates(attendance);
    let start = dates.len().saturating_sub(n);

    dates[start..]
        .iter()
        .map(|&date| {
            let mut tally = DailyTally {
                date,
                present: 0,
                absent: 0,
                late: 0,
            };
            for record in attendance.iter().filter(|a| a.date == date) {
                match record.status {
                    AttendanceStatus::Present => tally.present += 1,
                    AttendanceStatus::Absent => tally.absent += 1,
                    AttendanceStatus::Late => tally.late += 1,
                    AttendanceStatus::Excused => {}
                }
            }
            tally
        })
        .collect()
}

fn percentage(part: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    // round half up in integer arithmetic
    ((200 * part + total) / (2 * total)) as u32
}

fn status_color(status: AttendanceStatus) -> &'static str {
    match status {
        AttendanceStatus::Present => "#4ade80",
        AttendanceStatus::Absent => "#f87171",
        AttendanceStatus::Late => "#fbbf24",
        AttendanceStatus::Excused => "#60a5fa",
    }
}
