//! Risk Classifier: AI-written attendance summary plus an at-risk list.
//!
//! The analytical judgment is delegated to a [`TextGenerator`]. This module
//! only builds size-bounded digests, runs the two requests side by side, and
//! turns every failure into a fixed fallback. Nothing here returns an error
//! to its caller.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::InsightError;
use crate::gemini::GeminiClient;
use crate::model::{AttendanceRecord, AttendanceStatus, Student};
use crate::settings::Config;

pub const MISSING_KEY_MESSAGE: &str = "API Key is missing. Unable to generate insights.";
pub const FAILURE_MESSAGE: &str = "Failed to generate AI insights at this time.";
pub const EMPTY_MESSAGE: &str = "No insights generated.";

const SYSTEM_INSTRUCTION: &str = "You are an AI assistant for a school administrator.";

/// One-shot prompt for the text-generation collaborator.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system_instruction: Option<String>,
    /// When set, the reply must be JSON matching this schema.
    pub response_schema: Option<serde_json::Value>,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<String, InsightError>;
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AtRiskStudent {
    pub student_id: String,
    pub reason: String,
}

// At-risk entry joined with the roster for display
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AtRiskEntry {
    pub student_id: String,
    pub reason: String,
    pub name: Option<String>,
    pub grade: Option<String>,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SummaryDigest {
    pub total_students: usize,
    pub attendance_records_count: usize,
    pub sample_data: Vec<AttendanceRecord>,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StudentDigest {
    pub id: String,
    pub name: String,
    pub total_days: usize,
    pub absent_days: usize,
}

/// Owned snapshot of everything one invocation needs, so no store lock is
/// held while the requests are in flight.
#[derive(Debug, Clone)]
pub struct InsightRequest {
    pub summary: SummaryDigest,
    pub students: Vec<StudentDigest>,
    roster: HashMap<String, (String, String)>,
}

impl InsightRequest {
    pub fn build(
        students: &[Student],
        attendance: &[AttendanceRecord],
        sample_limit: usize,
    ) -> Self {
        let summary = SummaryDigest {
            total_students: students.len(),
            attendance_records_count: attendance.len(),
            sample_data: attendance.iter().take(sample_limit).cloned().collect(),
        };

        let digests = students
            .iter()
            .map(|s| {
                let records = attendance.iter().filter(|a| a.student_id == s.id);
                let (total_days, absent_days) = records.fold((0, 0), |(total, absent), a| {
                    let hit = usize::from(a.status == AttendanceStatus::Absent);
                    (total + 1, absent + hit)
                });
                StudentDigest {
                    id: s.id.clone(),
                    name: s.full_name(),
                    total_days,
                    absent_days,
                }
            })
            .collect();

        let roster = students
            .iter()
            .map(|s| (s.id.clone(), (s.full_name(), s.grade.clone())))
            .collect();

        Self {
            summary,
            students: digests,
            roster,
        }
    }

    fn summary_prompt(&self) -> Result<GenerationRequest, InsightError> {
        let data = serde_json::to_string(&self.summary)?;
        let prompt = format!(
            "Analyze the following student registration and attendance summary data.\n\
             Data: {data}\n\n\
             Please provide a concise, 3-paragraph executive summary.\n\
             1. Overall attendance trends based on the data provided.\n\
             2. Identification of any potential issues (e.g., high absenteeism trends).\n\
             3. Recommendations for improving student engagement.\n\n\
             Keep the tone professional and administrative."
        );

        Ok(GenerationRequest {
            prompt,
            system_instruction: Some(SYSTEM_INSTRUCTION.to_string()),
            response_schema: None,
        })
    }

    fn at_risk_prompt(&self) -> Result<GenerationRequest, InsightError> {
        let data = serde_json::to_string(&self.students)?;
        let prompt = format!(
            "Analyze this list: {data}. Identify students with high absenteeism \
             (more than 20% absence rate). Return a JSON list."
        );

        Ok(GenerationRequest {
            prompt,
            system_instruction: None,
            response_schema: Some(at_risk_schema()),
        })
    }

    fn resolve(&self, at_risk: Vec<AtRiskStudent>) -> Vec<AtRiskEntry> {
        at_risk
            .into_iter()
            .map(|entry| {
                let known = self.roster.get(&entry.student_id);
                AtRiskEntry {
                    name: known.map(|(name, _)| name.clone()),
                    grade: known.map(|(_, grade)| grade.clone()),
                    student_id: entry.student_id,
                    reason: entry.reason,
                }
            })
            .collect()
    }
}

fn at_risk_schema() -> serde_json::Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "studentId": { "type": "STRING" },
                "reason": { "type": "STRING" }
            }
        }
    })
}

/// Decodes the at-risk reply.
///
/// The top level must be a JSON array; entries that do not have string
/// `studentId` and `reason` fields are dropped individually.
pub fn decode_at_risk(text: &str) -> Result<Vec<AtRiskStudent>, InsightError> {
    let body = strip_code_fence(text);
    if body.is_empty() {
        return Ok(Vec::new());
    }

    let items: Vec<serde_json::Value> = serde_json::from_str(body)?;
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<AtRiskStudent>(item).ok())
        .collect())
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.strip_prefix("json").unwrap_or(rest);
            rest.strip_suffix("```").unwrap_or(rest).trim()
        }
        None => trimmed,
    }
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InsightReport {
    pub summary: String,
    pub at_risk: Vec<AtRiskEntry>,
    pub summary_ok: bool,
    pub at_risk_ok: bool,
    pub generated_at: DateTime<Utc>,
}

impl InsightReport {
    fn unavailable() -> Self {
        Self {
            summary: MISSING_KEY_MESSAGE.to_string(),
            at_risk: Vec::new(),
            summary_ok: false,
            at_risk_ok: false,
            generated_at: Utc::now(),
        }
    }

    pub fn is_failure(&self) -> bool {
        !self.summary_ok && !self.at_risk_ok
    }
}

pub struct InsightService {
    generator: Option<Arc<dyn TextGenerator>>,
    timeout: Duration,
    sample_limit: usize,
}

impl InsightService {
    pub fn new(
        generator: Option<Arc<dyn TextGenerator>>,
        timeout: Duration,
        sample_limit: usize,
    ) -> Self {
        Self {
            generator,
            timeout,
            sample_limit,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let generator = config.api_key.as_ref().map(|key| {
            let client = GeminiClient::new(&config.base_url, &config.model, key);
            Arc::new(client) as Arc<dyn TextGenerator>
        });
        Self::new(generator, config.request_timeout, config.sample_limit)
    }

    pub fn is_configured(&self) -> bool {
        self.generator.is_some()
    }

    pub fn prepare(&self, students: &[Student], attendance: &[AttendanceRecord]) -> InsightRequest {
        InsightRequest::build(students, attendance, self.sample_limit)
    }

    /// Runs the summary and at-risk requests concurrently.
    ///
    /// Each half falls back on its own: a failed summary still lets a good
    /// at-risk list through and vice versa.
    pub async fn run(&self, request: &InsightRequest) -> InsightReport {
        let Some(generator) = self.generator.as_deref() else {
            warn!(error = %InsightError::MissingCredentials, "insights unavailable");
            return InsightReport::unavailable();
        };

        let (summary, at_risk) = tokio::join!(
            self.request_summary(generator, request),
            self.request_at_risk(generator, request),
        );

        let summary_ok = summary.is_ok();
        let at_risk_ok = at_risk.is_ok();

        let summary = summary.unwrap_or_else(|err| {
            warn!(error = %err, "summary generation failed, using fallback");
            FAILURE_MESSAGE.to_string()
        });
        let at_risk = at_risk.unwrap_or_else(|err| {
            warn!(error = %err, "at-risk generation failed, using empty list");
            Vec::new()
        });

        info!(summary_ok, at_risk_ok, flagged = at_risk.len(), "insights generated");
        InsightReport {
            summary,
            at_risk: request.resolve(at_risk),
            summary_ok,
            at_risk_ok,
            generated_at: Utc::now(),
        }
    }

    pub async fn analyze(
        &self,
        students: &[Student],
        attendance: &[AttendanceRecord],
    ) -> InsightReport {
        let request = self.prepare(students, attendance);
        self.run(&request).await
    }

    async fn request_summary(
        &self,
        generator: &dyn TextGenerator,
        request: &InsightRequest,
    ) -> Result<String, InsightError> {
        let text = self.call(generator, request.summary_prompt()?).await?;
        if text.trim().is_empty() {
            return Ok(EMPTY_MESSAGE.to_string());
        }
        Ok(text)
    }

    async fn request_at_risk(
        &self,
        generator: &dyn TextGenerator,
        request: &InsightRequest,
    ) -> Result<Vec<AtRiskStudent>, InsightError> {
        let text = self.call(generator, request.at_risk_prompt()?).await?;
        decode_at_risk(&text)
    }

    async fn call(
        &self,
        generator: &dyn TextGenerator,
        prompt: GenerationRequest,
    ) -> Result<String, InsightError> {
        tokio::time::timeout(self.timeout, generator.generate(prompt))
            .await
            .map_err(|_| InsightError::Timeout(self.timeout))?
    }
}

/// Lifecycle of the on-demand insight panel.
#[derive(Debug, Serialize, Clone, PartialEq, Eq, Default)]
#[serde(tag = "state", content = "report")]
pub enum InsightState {
    #[default]
    Idle,
    Requesting,
    Ready(InsightReport),
    Failed(InsightReport),
}

impl InsightState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InsightState::Ready(_) | InsightState::Failed(_))
    }
}

#[derive(Debug, Default)]
struct Slot {
    state: InsightState,
    latest: u64,
}

/// Tracks the newest invocation.
///
/// Each invocation runs on its own task, so it reaches a terminal state even
/// when whoever started it goes away. Only the most recently started
/// invocation may publish its result; older ones finishing later are
/// discarded. There is no automatic retry.
#[derive(Debug, Default, Clone)]
pub struct InsightTracker {
    slot: Arc<Mutex<Slot>>,
}

impl InsightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> InsightState {
        self.lock().state.clone()
    }

    /// Moves to `Requesting` and starts an invocation in the background.
    ///
    /// The returned handle resolves to the state this invocation finished
    /// with; dropping it does not cancel the work.
    pub fn trigger(
        &self,
        service: Arc<InsightService>,
        request: InsightRequest,
    ) -> JoinHandle<InsightState> {
        let ticket = {
            let mut slot = self.lock();
            slot.latest += 1;
            slot.state = InsightState::Requesting;
            slot.latest
        };

        let tracker = self.clone();
        tokio::spawn(async move {
            let report = service.run(&request).await;
            let finished = if report.is_failure() {
                InsightState::Failed(report)
            } else {
                InsightState::Ready(report)
            };
            tracker.publish(ticket, finished.clone());
            finished
        })
    }

    fn publish(&self, ticket: u64, finished: InsightState) {
        let mut slot = self.lock();
        if slot.latest == ticket {
            slot.state = finished;
        } else {
            debug!(ticket, latest = slot.latest, "discarding superseded insight result");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
