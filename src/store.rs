//! In-memory Record Store.
//!
//! Owns the student roster and the attendance collection for the lifetime of
//! the process. Other components only get read views or go through the two
//! mutation points: [`RecordStore::register_student`] and
//! [`RecordStore::reconcile`].

use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::model::{generate_student_id, AttendanceRecord, NewStudent, Student};

// Re-rolls allowed when a generated id is already taken
const GENERATED_ID_RETRIES: usize = 4;

#[derive(Debug, Default)]
pub struct RecordStore {
    students: Vec<Student>,
    student_ids: HashSet<String>,
    pub(crate) attendance: Vec<AttendanceRecord>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store pre-populated with a roster and attendance history.
    ///
    /// Attendance is applied through reconciliation, so duplicate
    /// (student, date) pairs in `attendance` collapse to the last one.
    pub fn with_data(
        students: Vec<Student>,
        attendance: Vec<AttendanceRecord>,
    ) -> Result<Self, StoreError> {
        let mut store = Self::new();
        for student in students {
            store.register_student(student)?;
        }
        store.reconcile(attendance);
        Ok(store)
    }

    pub fn list_students(&self) -> &[Student] {
        &self.students
    }

    pub fn list_attendance(&self) -> &[AttendanceRecord] {
        &self.attendance
    }

    pub fn student(&self, id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.id == id)
    }

    pub fn register_student(&mut self, student: Student) -> Result<(), StoreError> {
        if !self.student_ids.insert(student.id.clone()) {
            return Err(StoreError::DuplicateId(student.id));
        }

        info!(student_id = %student.id, grade = %student.grade, "student registered");
        self.students.push(student);
        Ok(())
    }

    /// Registers a student straight from a form.
    ///
    /// A caller-supplied id that is taken fails with
    /// [`StoreError::DuplicateId`]; a generated one is drawn again instead.
    pub fn enroll(&mut self, form: NewStudent, today: NaiveDate) -> Result<Student, StoreError> {
        self.enroll_with(form, today, generate_student_id)
    }

    fn enroll_with(
        &mut self,
        form: NewStudent,
        today: NaiveDate,
        mut next_id: impl FnMut() -> String,
    ) -> Result<Student, StoreError> {
        let retries = if form.supplies_id() { 0 } else { GENERATED_ID_RETRIES };
        let mut attempt = 0;

        loop {
            let student = Student::register_with(form.clone(), today, &mut next_id)?;
            match self.register_student(student.clone()) {
                Ok(()) => return Ok(student),
                Err(StoreError::DuplicateId(id)) if attempt < retries => {
                    warn!(student_id = %id, "generated student id collided, drawing another");
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Records for one student in insertion order (not sorted by date).
    pub fn attendance_for(&self, student_id: &str) -> Vec<AttendanceRecord> {
        self.attendance
            .iter()
            .filter(|a| a.student_id == student_id)
            .cloned()
            .collect()
    }

    pub fn attendance_on(&self, date: NaiveDate) -> Vec<AttendanceRecord> {
        self.attendance
            .iter()
            .filter(|a| a.date == date)
            .cloned()
            .collect()
    }
}

/// Store handle shared between HTTP workers.
///
/// A single write guard spans a whole reconciliation, so overlapping batches
/// never interleave.
#[derive(Debug, Default)]
pub struct SharedStore {
    inner: RwLock<RecordStore>,
}

impl SharedStore {
    pub fn new(store: RecordStore) -> Self {
        Self {
            inner: RwLock::new(store),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, RecordStore> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, RecordStore> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
