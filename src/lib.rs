//! School attendance dashboard core.
//!
//! Holds the student roster and daily attendance in memory, derives the
//! dashboard statistics from them, and asks an external text-generation
//! service for a narrative summary and an at-risk list.

pub mod api;
pub mod data;
pub mod error;
pub mod gemini;
pub mod insights;
pub mod model;
pub mod reconcile;
pub mod roster;
pub mod settings;
pub mod stats;
pub mod store;

pub use error::{ConfigError, InsightError, RosterError, StoreError};
pub use insights::{InsightReport, InsightService, InsightState, InsightTracker, TextGenerator};
pub use model::{AttendanceEntry, AttendanceRecord, AttendanceStatus, NewStudent, Student};
pub use reconcile::ReconcileSummary;
pub use settings::Config;
pub use store::{RecordStore, SharedStore};
