use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::StoreError;

const GENERATED_ID_LEN: usize = 9;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

impl AttendanceStatus {
    pub const ALL: [AttendanceStatus; 4] = [
        AttendanceStatus::Present,
        AttendanceStatus::Absent,
        AttendanceStatus::Late,
        AttendanceStatus::Excused,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Absent => "Absent",
            AttendanceStatus::Late => "Late",
            AttendanceStatus::Excused => "Excused",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub grade: String,
    pub email: String,
    pub parent_contact: String,
    pub registration_date: NaiveDate,
}

impl Student {
    /// Builds a student from a registration form.
    ///
    /// Every text field must be non-blank. When the form carries no id, a
    /// short random one is generated so the caller never has to pick one.
    pub fn register(form: NewStudent, today: NaiveDate) -> Result<Self, StoreError> {
        Self::register_with(form, today, generate_student_id)
    }

    pub(crate) fn register_with(
        form: NewStudent,
        today: NaiveDate,
        next_id: impl FnOnce() -> String,
    ) -> Result<Self, StoreError> {
        form.validate()?;

        let id = match form.id {
            Some(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => next_id(),
        };

        Ok(Self {
            id,
            first_name: form.first_name.trim().to_string(),
            last_name: form.last_name.trim().to_string(),
            grade: form.grade.trim().to_string(),
            email: form.email.trim().to_string(),
            parent_contact: form.parent_contact.trim().to_string(),
            registration_date: today,
        })
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

// Registration form as submitted by the roster page
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    #[serde(default)]
    pub id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub grade: String,
    pub email: String,
    pub parent_contact: String,
}

impl NewStudent {
    /// Whether the caller picked the id rather than leaving it to us.
    pub fn supplies_id(&self) -> bool {
        self.id.as_deref().is_some_and(|id| !id.trim().is_empty())
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        let required = [
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("grade", &self.grade),
            ("email", &self.email),
            ("parentContact", &self.parent_contact),
        ];

        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(StoreError::MissingField(field));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub student_id: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

impl AttendanceRecord {
    pub fn new(student_id: impl Into<String>, date: NaiveDate, status: AttendanceStatus) -> Self {
        let student_id = student_id.into();
        Self {
            id: format!("{}-{}", date.format("%Y-%m-%d"), student_id),
            student_id,
            date,
            status,
        }
    }

    /// The (student, date) pair that identifies this record in the store.
    pub fn key(&self) -> (&str, NaiveDate) {
        (self.student_id.as_str(), self.date)
    }
}

// Submission shape for a single mark on the attendance page
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntry {
    pub student_id: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

impl From<AttendanceEntry> for AttendanceRecord {
    fn from(entry: AttendanceEntry) -> Self {
        AttendanceRecord::new(entry.student_id, entry.date, entry.status)
    }
}

pub(crate) fn generate_student_id() -> String {
    Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(GENERATED_ID_LEN)
        .collect()
}

// Demo roster used when no CSV is configured
pub fn seed_students() -> Vec<Student> {
    let enrolled =
        |id: &str, first: &str, last: &str, grade: &str, contact: &str, day: u32| Student {
            id: id.to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            grade: grade.to_string(),
            email: format!("{}@example.com", first.to_lowercase()),
            parent_contact: contact.to_string(),
            registration_date: NaiveDate::from_ymd_opt(2023, 9, day).unwrap_or_default(),
        };

    vec![
        enrolled("1", "Alice", "Johnson", "10A", "555-0101", 1),
        enrolled("2", "Bob", "Smith", "10A", "555-0102", 1),
        enrolled("3", "Charlie", "Brown", "10B", "555-0103", 2),
        enrolled("4", "Diana", "Prince", "11A", "555-0104", 3),
        enrolled("5", "Evan", "Wright", "11A", "555-0105", 4),
    ]
}

pub fn seed_attendance() -> Vec<AttendanceRecord> {
    let day = |d: u32| NaiveDate::from_ymd_opt(2023, 10, d).unwrap_or_default();

    vec![
        AttendanceRecord::new("1", day(1), AttendanceStatus::Present),
        AttendanceRecord::new("2", day(1), AttendanceStatus::Absent),
        AttendanceRecord::new("3", day(1), AttendanceStatus::Present),
        AttendanceRecord::new("1", day(2), AttendanceStatus::Present),
        AttendanceRecord::new("2", day(2), AttendanceStatus::Late),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> NewStudent {
        NewStudent {
            id: None,
            first_name: " Grace ".to_string(),
            last_name: "Hopper".to_string(),
            grade: "12C".to_string(),
            email: "grace@example.com".to_string(),
            parent_contact: "555-0199".to_string(),
        }
    }

    #[test]
    fn test_register_generates_short_id_and_trims() {
        let today = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let student = Student::register(form(), today).unwrap();

        assert_eq!(student.id.len(), GENERATED_ID_LEN);
        assert!(student.id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(student.first_name, "Grace");
        assert_eq!(student.registration_date, today);
        assert_eq!(student.full_name(), "Grace Hopper");
    }

    #[test]
    fn test_register_keeps_supplied_id() {
        let mut form = form();
        form.id = Some("s-42".to_string());
        assert!(form.supplies_id());
        let student = Student::register(form, NaiveDate::default()).unwrap();
        assert_eq!(student.id, "s-42");

        let mut blank = self::form();
        blank.id = Some("  ".to_string());
        assert!(!blank.supplies_id());
    }

    #[test]
    fn test_register_rejects_blank_field() {
        let mut form = form();
        form.email = "   ".to_string();
        let err = Student::register(form, NaiveDate::default()).unwrap_err();
        assert!(matches!(err, StoreError::MissingField("email")));
    }

    #[test]
    fn test_record_id_derived_from_date_and_student() {
        let date = NaiveDate::from_ymd_opt(2023, 10, 1).unwrap();
        let record = AttendanceRecord::new("7", date, AttendanceStatus::Late);
        assert_eq!(record.id, "2023-10-01-7");
        assert_eq!(record.key(), ("7", date));
    }

    #[test]
    fn test_status_serializes_as_label() {
        let json = serde_json::to_string(&AttendanceStatus::Excused).unwrap();
        assert_eq!(json, "\"Excused\"");

        let entry: AttendanceEntry = serde_json::from_str(
            r#"{"studentId":"1","date":"2023-10-01","status":"Absent"}"#,
        )
        .unwrap();
        assert_eq!(entry.status, AttendanceStatus::Absent);
    }

    #[test]
    fn test_seed_data_is_consistent() {
        let students = seed_students();
        for record in seed_attendance() {
            assert!(students.iter().any(|s| s.id == record.student_id));
        }
    }
}
