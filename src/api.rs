use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::data::write_attendance;
use crate::error::StoreError;
use crate::insights::{InsightService, InsightState, InsightTracker};
use crate::model::{AttendanceEntry, AttendanceRecord, NewStudent, Student};
use crate::roster::{filter_students, grades, student_overview, AttendanceDraft, RosterFilter};
use crate::stats::{per_student_rate, DashboardStats};
use crate::store::SharedStore;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ResponseError for StoreError {
    fn status_code(&self) -> StatusCode {
        match self {
            StoreError::DuplicateId(_) => StatusCode::CONFLICT,
            StoreError::MissingField(_) => StatusCode::BAD_REQUEST,
            StoreError::UnknownStudent(_) => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.to_string(),
        })
    }
}

#[derive(Deserialize)]
struct AttendanceQuery {
    date: Option<NaiveDate>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StudentAttendance {
    student: Student,
    records: Vec<AttendanceRecord>,
    attendance_rate: u32,
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().body("Attendance Dashboard API is running!")
}

async fn list_students(
    store: web::Data<SharedStore>,
    filter: web::Query<RosterFilter>,
) -> HttpResponse {
    let store = store.read();
    let students: Vec<&Student> = filter_students(store.list_students(), &filter);
    HttpResponse::Ok().json(students)
}

async fn register_student(
    store: web::Data<SharedStore>,
    web::Json(form): web::Json<NewStudent>,
) -> Result<HttpResponse, StoreError> {
    let student = store.write().enroll(form, Utc::now().date_naive())?;
    Ok(HttpResponse::Created().json(student))
}

async fn students_overview(store: web::Data<SharedStore>) -> HttpResponse {
    let store = store.read();
    HttpResponse::Ok().json(student_overview(store.list_students(), store.list_attendance()))
}

async fn student_attendance(
    store: web::Data<SharedStore>,
    path: web::Path<String>,
) -> Result<HttpResponse, StoreError> {
    let student_id = path.into_inner();
    let store = store.read();
    let student = store
        .student(&student_id)
        .cloned()
        .ok_or_else(|| StoreError::UnknownStudent(student_id.clone()))?;

    Ok(HttpResponse::Ok().json(StudentAttendance {
        records: store.attendance_for(&student_id),
        attendance_rate: per_student_rate(&student_id, store.list_attendance()),
        student,
    }))
}

async fn list_grades(store: web::Data<SharedStore>) -> HttpResponse {
    HttpResponse::Ok().json(grades(store.read().list_students()))
}

async fn list_attendance(
    store: web::Data<SharedStore>,
    query: web::Query<AttendanceQuery>,
) -> HttpResponse {
    let store = store.read();
    match query.date {
        Some(date) => HttpResponse::Ok().json(store.attendance_on(date)),
        None => HttpResponse::Ok().json(store.list_attendance()),
    }
}

// The whole batch is checked and applied under one write lock.
async fn submit_attendance(
    store: web::Data<SharedStore>,
    web::Json(entries): web::Json<Vec<AttendanceEntry>>,
) -> Result<HttpResponse, StoreError> {
    let mut store = store.write();
    if let Some(unknown) = entries.iter().find(|e| store.student(&e.student_id).is_none()) {
        warn!(student_id = %unknown.student_id, "attendance batch rejected");
        return Err(StoreError::UnknownStudent(unknown.student_id.clone()));
    }

    let batch: Vec<AttendanceRecord> = entries.into_iter().map(AttendanceRecord::from).collect();
    let summary = store.reconcile(batch);
    Ok(HttpResponse::Ok().json(summary))
}

async fn attendance_draft(
    store: web::Data<SharedStore>,
    path: web::Path<NaiveDate>,
) -> HttpResponse {
    let store = store.read();
    let draft = AttendanceDraft::for_date(
        path.into_inner(),
        store.list_students(),
        store.list_attendance(),
    );
    HttpResponse::Ok().json(draft)
}

async fn export_attendance(store: web::Data<SharedStore>) -> HttpResponse {
    let mut body = Vec::new();
    if let Err(err) = write_attendance(&mut body, store.read().list_attendance()) {
        error!(error = %err, "attendance export failed");
        return HttpResponse::InternalServerError().json(ErrorBody {
            error: err.to_string(),
        });
    }

    HttpResponse::Ok()
        .content_type("text/csv")
        .insert_header(("Content-Disposition", "attachment; filename=\"attendance.csv\""))
        .body(body)
}

async fn dashboard(store: web::Data<SharedStore>) -> HttpResponse {
    let store = store.read();
    HttpResponse::Ok().json(DashboardStats::compute(store.list_students(), store.list_attendance()))
}

async fn generate_insights(
    store: web::Data<SharedStore>,
    service: web::Data<InsightService>,
    tracker: web::Data<InsightTracker>,
) -> HttpResponse {
    let request = {
        let store = store.read();
        service.prepare(store.list_students(), store.list_attendance())
    };

    // detached; the tracker publishes the outcome
    tracker.trigger(service.into_inner(), request);
    HttpResponse::Accepted().json(InsightState::Requesting)
}

async fn insight_state(tracker: web::Data<InsightTracker>) -> HttpResponse {
    HttpResponse::Ok().json(tracker.state())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/students", web::get().to(list_students))
        .route("/students", web::post().to(register_student))
        .route("/students/overview", web::get().to(students_overview))
        .route("/students/{id}/attendance", web::get().to(student_attendance))
        .route("/grades", web::get().to(list_grades))
        .route("/attendance", web::get().to(list_attendance))
        .route("/attendance", web::post().to(submit_attendance))
        .route("/attendance/draft/{date}", web::get().to(attendance_draft))
        .route("/attendance/export", web::get().to(export_attendance))
        .route("/dashboard", web::get().to(dashboard))
        .route("/insights", web::get().to(insight_state))
        .route("/insights", web::post().to(generate_insights));
}
