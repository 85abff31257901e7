use std::sync::Arc;
use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use async_trait::async_trait;
use serde_json::{json, Value};

use attendance_dashboard::insights::{GenerationRequest, FAILURE_MESSAGE, MISSING_KEY_MESSAGE};
use attendance_dashboard::model::{seed_attendance, seed_students};
use attendance_dashboard::{
    api, InsightError, InsightService, InsightTracker, RecordStore, SharedStore, TextGenerator,
};

struct Unreachable;

#[async_trait]
impl TextGenerator for Unreachable {
    async fn generate(&self, _request: GenerationRequest) -> Result<String, InsightError> {
        Err(InsightError::Request("connection refused".to_string()))
    }
}

struct Canned;

#[async_trait]
impl TextGenerator for Canned {
    async fn generate(&self, request: GenerationRequest) -> Result<String, InsightError> {
        if request.response_schema.is_some() {
            Ok(r#"[{"studentId":"2","reason":"Missed 1 of 2 days"}]"#.to_string())
        } else {
            Ok("Attendance is broadly healthy.".to_string())
        }
    }
}

fn seeded() -> web::Data<SharedStore> {
    let store = RecordStore::with_data(seed_students(), seed_attendance()).unwrap();
    web::Data::new(SharedStore::new(store))
}

fn insights(generator: Option<Arc<dyn TextGenerator>>) -> web::Data<InsightService> {
    web::Data::new(InsightService::new(generator, Duration::from_secs(2), 50))
}

macro_rules! app {
    ($store:expr, $insights:expr) => {
        test::init_service(
            App::new()
                .app_data($store.clone())
                .app_data($insights)
                .app_data(web::Data::new(InsightTracker::new()))
                .configure(api::configure),
        )
        .await
    };
}

// Polls GET /insights until the background invocation has finished
macro_rules! settled {
    ($app:expr) => {{
        let mut latest = Value::Null;
        for _ in 0..100 {
            let req = test::TestRequest::get().uri("/insights").to_request();
            latest = test::call_and_read_body_json(&$app, req).await;
            if latest["state"] != "Requesting" {
                break;
            }
            actix_web::rt::time::sleep(Duration::from_millis(10)).await;
        }
        latest
    }};
}

#[actix_web::test]
async fn test_health() {
    let app = app!(seeded(), insights(None));
    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert!(resp.status().is_success());
}

#[actix_web::test]
async fn test_register_and_filter_students() {
    let store = seeded();
    let app = app!(store, insights(None));

    let req = test::TestRequest::post()
        .uri("/students")
        .set_json(json!({
            "firstName": "Fiona",
            "lastName": "Gallagher",
            "grade": "12B",
            "email": "fiona@example.com",
            "parentContact": "555-0106"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(resp).await;
    assert_eq!(created["id"].as_str().unwrap().len(), 9);

    let req = test::TestRequest::get().uri("/students?grade=12B").to_request();
    let found: Vec<Value> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["firstName"], "Fiona");

    let req = test::TestRequest::get().uri("/grades").to_request();
    let grades: Vec<String> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(grades, vec!["10A", "10B", "11A", "12B"]);
}

#[actix_web::test]
async fn test_register_errors() {
    let app = app!(seeded(), insights(None));

    let duplicate = test::TestRequest::post()
        .uri("/students")
        .set_json(json!({
            "id": "1",
            "firstName": "Alice",
            "lastName": "Again",
            "grade": "10A",
            "email": "a@example.com",
            "parentContact": "1"
        }))
        .to_request();
    assert_eq!(test::call_service(&app, duplicate).await.status(), StatusCode::CONFLICT);

    let missing = test::TestRequest::post()
        .uri("/students")
        .set_json(json!({
            "firstName": "",
            "lastName": "Nobody",
            "grade": "10A",
            "email": "n@example.com",
            "parentContact": "1"
        }))
        .to_request();
    assert_eq!(test::call_service(&app, missing).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_submit_attendance_replaces_by_key() {
    let store = seeded();
    let app = app!(store, insights(None));

    let req = test::TestRequest::post()
        .uri("/attendance")
        .set_json(json!([
            {"studentId": "1", "date": "2023-10-01", "status": "Absent"},
            {"studentId": "4", "date": "2023-10-01", "status": "Excused"}
        ]))
        .to_request();
    let summary: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(summary["replaced"], 1);
    assert_eq!(summary["totalRecords"], 6);

    let req = test::TestRequest::get().uri("/attendance?date=2023-10-01").to_request();
    let day: Vec<Value> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(day.len(), 4);
    let alice: Vec<_> = day.iter().filter(|r| r["studentId"] == "1").collect();
    assert_eq!(alice.len(), 1);
    assert_eq!(alice[0]["status"], "Absent");
    assert_eq!(alice[0]["id"], "2023-10-01-1");
}

#[actix_web::test]
async fn test_submit_attendance_rejects_unknown_student() {
    let store = seeded();
    let app = app!(store, insights(None));

    let req = test::TestRequest::post()
        .uri("/attendance")
        .set_json(json!([
            {"studentId": "1", "date": "2023-10-05", "status": "Present"},
            {"studentId": "ghost", "date": "2023-10-05", "status": "Present"}
        ]))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(store.read().list_attendance().len(), 5);
}

#[actix_web::test]
async fn test_draft_and_student_views() {
    let app = app!(seeded(), insights(None));

    let req = test::TestRequest::get().uri("/attendance/draft/2023-10-02").to_request();
    let draft: Value = test::call_and_read_body_json(&app, req).await;
    let entries = draft["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 5);
    assert_eq!(entries[1]["status"], "Late");
    assert_eq!(entries[2]["status"], "Present");

    let req = test::TestRequest::get().uri("/students/2/attendance").to_request();
    let bob: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(bob["records"].as_array().unwrap().len(), 2);
    assert_eq!(bob["attendanceRate"], 0);

    let req = test::TestRequest::get().uri("/students/404/attendance").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get().uri("/students/overview").to_request();
    let cards: Vec<Value> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(cards[0]["band"], "Excellent");
    assert_eq!(cards[0]["firstName"], "Alice");
}

#[actix_web::test]
async fn test_dashboard_stats() {
    let app = app!(seeded(), insights(None));

    let req = test::TestRequest::get().uri("/dashboard").to_request();
    let stats: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(stats["totalStudents"], 5);
    assert_eq!(stats["totalRecords"], 5);
    assert_eq!(stats["attendanceRate"], 60);
    assert_eq!(stats["absentCount"], 1);
    assert_eq!(stats["recentDays"].as_array().unwrap().len(), 2);
    assert_eq!(stats["pieChart"].as_array().unwrap().len(), 3);
}

#[actix_web::test]
async fn test_export_csv() {
    let app = app!(seeded(), insights(None));

    let req = test::TestRequest::get().uri("/attendance/export").to_request();
    let body = test::call_and_read_body(&app, req).await;
    let text = String::from_utf8(body.to_vec()).unwrap();

    assert!(text.starts_with("id,studentId,date,status\n"));
    assert_eq!(text.lines().count(), 6);
}

#[actix_web::test]
async fn test_insights_without_credentials() {
    let app = app!(seeded(), insights(None));

    let req = test::TestRequest::get().uri("/insights").to_request();
    let idle: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(idle["state"], "Idle");

    let req = test::TestRequest::post().uri("/insights").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let started: Value = test::read_body_json(resp).await;
    assert_eq!(started["state"], "Requesting");

    let state = settled!(app);
    assert_eq!(state["state"], "Failed");
    assert_eq!(state["report"]["summary"], MISSING_KEY_MESSAGE);
    assert_eq!(state["report"]["atRisk"], json!([]));
}

#[actix_web::test]
async fn test_insights_service_down_fails_open() {
    let app = app!(seeded(), insights(Some(Arc::new(Unreachable))));

    let req = test::TestRequest::post().uri("/insights").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let state = settled!(app);
    assert_eq!(state["state"], "Failed");
    assert_eq!(state["report"]["summary"], FAILURE_MESSAGE);
    assert_eq!(state["report"]["atRisk"], json!([]));
}

#[actix_web::test]
async fn test_insights_ready() {
    let app = app!(seeded(), insights(Some(Arc::new(Canned))));

    let req = test::TestRequest::post().uri("/insights").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::ACCEPTED);

    let state = settled!(app);
    assert_eq!(state["state"], "Ready");
    assert_eq!(state["report"]["atRisk"][0]["name"], "Bob Smith");
}
