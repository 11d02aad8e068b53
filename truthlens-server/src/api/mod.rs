//! HTTP API handlers

mod audit;
mod health;
mod reports;
mod scan;
mod sse;
mod verify;

pub use audit::{audit_routes, start_audit};
pub use health::{health_check, health_routes};
pub use reports::{report_routes, get_report, list_reports};
pub use scan::{scan_routes, scan};
pub use sse::event_stream;
pub use verify::{verify_routes, submit_verification};
