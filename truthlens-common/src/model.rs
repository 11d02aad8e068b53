//! Domain model: truth reports, verifications, lifecycle statuses
//!
//! One `TruthReport` row exists per restaurant key. Verifications are
//! append-only and keyed by the same restaurant key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scoring::VerificationStatus;

/// Lifecycle of a truth report.
///
/// `Debunked` is terminal: it is set by the reveal workflow and is never
/// reverted by score recomputation or re-analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStatus {
    /// Record created, no analysis yet
    Pending,
    /// Analysis in flight
    Scanning,
    /// AI analysis complete; zero or more verifications
    Ready,
    /// Terminal state set by the reveal workflow
    Debunked,
}

impl LifecycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStatus::Pending => "pending",
            LifecycleStatus::Scanning => "scanning",
            LifecycleStatus::Ready => "ready",
            LifecycleStatus::Debunked => "debunked",
        }
    }

    /// Ordering rank for forward-transition merging.
    ///
    /// An update may only replace a report when its lifecycle rank did not
    /// move backwards; this keeps push (SSE) and poll deliveries of the same
    /// transition idempotent.
    pub fn rank(&self) -> u8 {
        match self {
            LifecycleStatus::Pending => 0,
            LifecycleStatus::Scanning => 1,
            LifecycleStatus::Ready => 2,
            LifecycleStatus::Debunked => 3,
        }
    }
}

impl std::str::FromStr for LifecycleStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(LifecycleStatus::Pending),
            "scanning" => Ok(LifecycleStatus::Scanning),
            "ready" => Ok(LifecycleStatus::Ready),
            "debunked" => Ok(LifecycleStatus::Debunked),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown lifecycle status: {}",
                other
            ))),
        }
    }
}

/// Supporting evidence entry attached to a completed audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub description: String,
}

/// Persisted truth report, one per restaurant key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TruthReport {
    pub id: Uuid,
    /// Natural key; unique. All lookups and upserts go through it.
    pub restaurant_key: String,
    pub name: String,
    pub location: String,
    /// Aggregate rating from the Web2 review source, 0-5
    pub web2_score: f64,
    pub web2_review_count: i64,
    /// AI forensic estimate, 0-5; None until the first analysis lands
    pub ai_score: Option<f64>,
    /// 0-100
    pub ai_bot_probability: Option<f64>,
    /// 0-100
    pub ai_confidence: Option<f64>,
    /// Blended output score, 0-5
    pub final_score: f64,
    /// 0-100; equals the verifier weight percentage
    pub confidence: u32,
    pub verification_status: VerificationStatus,
    /// Denormalized count of verification rows for this key
    pub verification_count: u32,
    pub lifecycle_status: LifecycleStatus,
    pub analysis_summary: String,
    pub key_findings: Vec<String>,
    pub evidence_items: Vec<EvidenceItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Timestamp of the most recent AI analysis; drives staleness checks
    pub last_analysis_at: Option<DateTime<Utc>>,
}

impl TruthReport {
    /// Create the initial record written on a cache miss.
    ///
    /// Records are born in `Scanning`: the audit is triggered in the same
    /// breath as the insert.
    pub fn new_scanning(name: &str, location: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            restaurant_key: restaurant_key(name, location),
            name: name.to_string(),
            location: location.to_string(),
            web2_score: 0.0,
            web2_review_count: 0,
            ai_score: None,
            ai_bot_probability: None,
            ai_confidence: None,
            final_score: 0.0,
            confidence: 0,
            verification_status: VerificationStatus::AiAnalyzing,
            verification_count: 0,
            lifecycle_status: LifecycleStatus::Scanning,
            analysis_summary: "AI forensic scan in progress".to_string(),
            key_findings: Vec::new(),
            evidence_items: Vec::new(),
            created_at: now,
            updated_at: now,
            last_analysis_at: None,
        }
    }

    /// Whether the stored analysis is still fresh.
    ///
    /// A report with at least one verification never goes stale; an AI-only
    /// report is fresh while its last analysis is within the window.
    pub fn is_fresh(&self, staleness_window: chrono::Duration, now: DateTime<Utc>) -> bool {
        if self.verification_count > 0 {
            return true;
        }
        match self.last_analysis_at {
            Some(at) => now.signed_duration_since(at) < staleness_window,
            None => false,
        }
    }
}

/// A single receipt-backed verifier submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verification {
    pub id: Uuid,
    pub restaurant_key: String,
    pub verifier_id: String,
    /// 0-5
    pub score: f64,
    /// Opaque evidence reference, e.g. a receipt hash
    pub evidence_ref: String,
    pub created_at: DateTime<Utc>,
}

/// Derive the stable natural key for a restaurant.
///
/// Lowercased, runs of whitespace collapsed to `-`, name and location joined
/// with `_`. Repeated lookups of the "same" restaurant must map to the same
/// key.
pub fn restaurant_key(name: &str, location: &str) -> String {
    format!("{}_{}", normalize(name), normalize(location))
}

fn normalize(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// Forward-transition reducer for push/poll convergence.
///
/// Push (SSE) and client-side polling are two independent notification
/// sources observing the same record; whichever delivers a given transition
/// first wins and the other becomes a no-op. An incoming report replaces the
/// current one only when its lifecycle rank advanced, or the rank is equal
/// and `updated_at` moved forward.
pub fn should_replace(current: &TruthReport, incoming: &TruthReport) -> bool {
    let cur = current.lifecycle_status.rank();
    let inc = incoming.lifecycle_status.rank();
    if inc != cur {
        return inc > cur;
    }
    incoming.updated_at > current.updated_at
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn restaurant_key_normalizes_case_and_whitespace() {
        assert_eq!(
            restaurant_key("Din Tai Fung", "Taipei"),
            "din-tai-fung_taipei"
        );
        assert_eq!(
            restaurant_key("  Din   Tai  Fung ", "TAIPEI"),
            "din-tai-fung_taipei"
        );
        assert_eq!(restaurant_key("Joe's Diner", "New York"), "joe's-diner_new-york");
    }

    #[test]
    fn same_restaurant_maps_to_same_key() {
        let a = restaurant_key("Ichiran Ramen", "Shibuya Tokyo");
        let b = restaurant_key("ICHIRAN  ramen", " shibuya   tokyo");
        assert_eq!(a, b);
    }

    #[test]
    fn lifecycle_status_round_trips() {
        for status in [
            LifecycleStatus::Pending,
            LifecycleStatus::Scanning,
            LifecycleStatus::Ready,
            LifecycleStatus::Debunked,
        ] {
            let parsed: LifecycleStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("unknown".parse::<LifecycleStatus>().is_err());
    }

    #[test]
    fn freshness_window() {
        let mut report = TruthReport::new_scanning("A", "B");
        let now = Utc::now();

        // No analysis yet: stale
        assert!(!report.is_fresh(Duration::hours(24), now));

        report.last_analysis_at = Some(now - Duration::hours(2));
        assert!(report.is_fresh(Duration::hours(24), now));

        report.last_analysis_at = Some(now - Duration::hours(25));
        assert!(!report.is_fresh(Duration::hours(24), now));

        // A verified report never goes stale
        report.verification_count = 1;
        assert!(report.is_fresh(Duration::hours(24), now));
    }

    #[test]
    fn forward_transition_reducer_is_idempotent() {
        let scanning = TruthReport::new_scanning("A", "B");
        let mut ready = scanning.clone();
        ready.lifecycle_status = LifecycleStatus::Ready;
        ready.updated_at = scanning.updated_at + Duration::seconds(5);

        // Forward transition applies
        assert!(should_replace(&scanning, &ready));
        // Re-delivery of the same transition (poll after push) is a no-op
        assert!(!should_replace(&ready, &ready.clone()));
        // Backward transition never applies
        assert!(!should_replace(&ready, &scanning));

        // Same rank, newer timestamp (e.g. new verification on ready)
        let mut newer = ready.clone();
        newer.updated_at = ready.updated_at + Duration::seconds(1);
        assert!(should_replace(&ready, &newer));
    }

    #[test]
    fn debunked_outranks_everything() {
        let ready = {
            let mut r = TruthReport::new_scanning("A", "B");
            r.lifecycle_status = LifecycleStatus::Ready;
            r
        };
        let mut debunked = ready.clone();
        debunked.lifecycle_status = LifecycleStatus::Debunked;
        assert!(should_replace(&ready, &debunked));
        assert!(!should_replace(&debunked, &ready));
    }
}
