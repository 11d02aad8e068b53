//! Hybrid truth-score blending
//!
//! Pure arithmetic over heterogeneous evidence: an AI forensic estimate and
//! a list of receipt-backed verifier scores. Verifier evidence gains weight
//! linearly with the number of verifications and becomes fully authoritative
//! at the saturation threshold, at which point the AI score has zero
//! influence regardless of divergence.

use serde::{Deserialize, Serialize};

/// Tunable scoring parameters.
///
/// The saturation threshold is a product constant with no analytic
/// derivation, so it is carried as a parameter rather than a literal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoringParams {
    /// Verification count at which verifier evidence fully overrides the
    /// AI estimate.
    pub saturation_threshold: u32,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            saturation_threshold: 50,
        }
    }
}

/// Verification status label derived from the verifier weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    /// Verifier weight saturated (weight == 1)
    Verified,
    /// Verifier weight >= 0.8
    HighlyVerified,
    /// Verifier weight >= 0.2
    PartiallyVerified,
    /// Verifier weight < 0.2; score is effectively the AI estimate
    AiAnalyzing,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Verified => "VERIFIED",
            VerificationStatus::HighlyVerified => "HIGHLY_VERIFIED",
            VerificationStatus::PartiallyVerified => "PARTIALLY_VERIFIED",
            VerificationStatus::AiAnalyzing => "AI_ANALYZING",
        }
    }
}

impl std::str::FromStr for VerificationStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VERIFIED" => Ok(VerificationStatus::Verified),
            "HIGHLY_VERIFIED" => Ok(VerificationStatus::HighlyVerified),
            "PARTIALLY_VERIFIED" => Ok(VerificationStatus::PartiallyVerified),
            "AI_ANALYZING" => Ok(VerificationStatus::AiAnalyzing),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown verification status: {}",
                other
            ))),
        }
    }
}

/// Output of the blending algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HybridScore {
    /// Blended score, 0-5, rounded to one decimal place
    pub final_score: f64,
    /// Confidence percentage, 0-100 (equals the verifier weight)
    pub confidence: u32,
    /// Status label derived from the verifier weight
    pub status: VerificationStatus,
    /// True while verifier evidence is too thin to matter (weight < 0.2)
    pub is_ai_only: bool,
}

impl HybridScore {
    /// Whether the UI shows the verification seal (confidence >= 80%).
    pub fn show_seal(&self) -> bool {
        self.confidence >= 80
    }
}

/// Blend the AI estimate with verifier evidence.
///
/// `verification_count` is conventionally `verifier_scores.len()`, but is
/// taken separately because the persisted record denormalizes it.
///
/// The weighting is deliberately linear: `weight = min(count / threshold, 1)`.
/// At zero verifications the result degenerates to the AI score with zero
/// confidence; at or past the threshold the result is exactly the verifier
/// mean and the AI score has no influence.
pub fn blend_scores(
    ai_score: f64,
    verifier_scores: &[f64],
    verification_count: u32,
    params: &ScoringParams,
) -> HybridScore {
    let threshold = params.saturation_threshold.max(1) as f64;
    let verifier_weight = (verification_count as f64 / threshold).min(1.0);
    let ai_weight = 1.0 - verifier_weight;

    // With no verifier data the weight is already 0, but fall back to the
    // AI score so the mean is well-defined.
    let avg_verifier_score = if verifier_scores.is_empty() {
        ai_score
    } else {
        verifier_scores.iter().sum::<f64>() / verifier_scores.len() as f64
    };

    let final_score = avg_verifier_score * verifier_weight + ai_score * ai_weight;
    let final_score = (final_score * 10.0).round() / 10.0;

    let confidence = (verifier_weight * 100.0).round() as u32;

    let status = if verifier_weight >= 1.0 {
        VerificationStatus::Verified
    } else if verifier_weight >= 0.8 {
        VerificationStatus::HighlyVerified
    } else if verifier_weight >= 0.2 {
        VerificationStatus::PartiallyVerified
    } else {
        VerificationStatus::AiAnalyzing
    };

    HybridScore {
        final_score,
        confidence,
        status,
        is_ai_only: verifier_weight < 0.2,
    }
}
