use chrono::NaiveDate;
use csv::{Reader, Writer};
use serde::Deserialize;
use std::io::{Read, Write};
use std::path::Path;
use tracing::info;

use crate::error::RosterError;
use crate::model::{AttendanceRecord, NewStudent, Student};
use crate::store::RecordStore;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RosterRow {
    #[serde(default)]
    id: String,
    first_name: String,
    last_name: String,
    grade: String,
    email: String,
    parent_contact: String,
    registration_date: NaiveDate,
}

/// Registers every roster row in `store`. Stops at the first bad row;
/// rows before it stay registered.
pub fn load_roster<R: Read>(reader: R, store: &mut RecordStore) -> Result<usize, RosterError> {
    let mut rdr = Reader::from_reader(reader);
    let mut loaded = 0;

    for (index, result) in rdr.deserialize::<RosterRow>().enumerate() {
        let row = result?;
        let row_number = index + 1;
        let form = NewStudent {
            id: Some(row.id),
            first_name: row.first_name,
            last_name: row.last_name,
            grade: row.grade,
            email: row.email,
            parent_contact: row.parent_contact,
        };

        Student::register(form, row.registration_date)
            .and_then(|student| store.register_student(student))
            .map_err(|source| RosterError::Row {
                row: row_number,
                source,
            })?;
        loaded += 1;
    }

    Ok(loaded)
}

pub fn load_roster_file(path: &Path, store: &mut RecordStore) -> Result<usize, RosterError> {
    let file = std::fs::File::open(path)?;
    let loaded = load_roster(file, store)?;
    info!(path = %path.display(), loaded, "roster loaded");
    Ok(loaded)
}

pub fn write_attendance<W: Write>(
    writer: W,
    records: &[AttendanceRecord],
) -> Result<(), RosterError> {
    let mut wtr = Writer::from_writer(writer);
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}
