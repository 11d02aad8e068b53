//! Forensic analyzer: AI estimate of review authenticity
//!
//! Wraps a Gemini text-completion call with a fixed prompt template and a
//! guaranteed fallback. The estimate is a bounded adjustment of the Web2
//! rating, never an unconstrained judgment: the truth score is clamped into
//! a configurable band so a single bad completion cannot produce a wildly
//! implausible headline number.
//!
//! The analyzer never fails past its own boundary. Missing configuration,
//! network failures, and unparseable completions all convert to
//! deterministic fallback reports derived from the Web2 score alone.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::services::web2::Web2Snapshot;

/// Gemini API base URL
const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Default model for forensic analysis
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Default timeout for generation requests
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Clamp bounds for analyzer output.
///
/// The reference bounds (2.5-4.5 truth score, 15-70 bot probability) are
/// product constants without a documented derivation, so they are carried
/// as parameters.
#[derive(Debug, Clone, Copy)]
pub struct AnalyzerBounds {
    pub score_min: f64,
    pub score_max: f64,
    pub bot_probability_min: f64,
    pub bot_probability_max: f64,
}

impl Default for AnalyzerBounds {
    fn default() -> Self {
        Self {
            score_min: 2.5,
            score_max: 4.5,
            bot_probability_min: 15.0,
            bot_probability_max: 70.0,
        }
    }
}

/// Structured analyzer output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForensicReport {
    /// Bounded truth-score estimate, 0-5 scale
    pub truth_score: f64,
    /// 0-100
    pub bot_probability: f64,
    /// Analyzer self-reported confidence, 0-100
    pub confidence: f64,
    pub key_findings: Vec<String>,
    pub analysis_summary: String,
}

/// Forensic analyzer seam.
///
/// Infallible by contract: implementations convert every internal failure
/// into a well-formed fallback report.
#[async_trait]
pub trait ForensicAnalyzer: Send + Sync {
    /// Analyzer name for logging
    fn name(&self) -> &'static str;

    /// Analyze a restaurant's review snapshot.
    async fn analyze(&self, restaurant_name: &str, snapshot: &Web2Snapshot) -> ForensicReport;
}

/// Gemini-backed analyzer.
///
/// With no API key configured it degenerates to the deterministic fallback
/// path without touching the network; a valid configuration, not an error.
pub struct GeminiAnalyzer {
    http_client: Client,
    api_key: Option<String>,
    model: String,
    bounds: AnalyzerBounds,
}

impl GeminiAnalyzer {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            http_client: Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
            api_key,
            model: DEFAULT_MODEL.to_string(),
            bounds: AnalyzerBounds::default(),
        }
    }

    pub fn with_bounds(mut self, bounds: AnalyzerBounds) -> Self {
        self.bounds = bounds;
        self
    }

    /// Deterministic prompt template embedding the review sample.
    fn build_prompt(&self, restaurant_name: &str, snapshot: &Web2Snapshot) -> String {
        let review_lines = snapshot
            .reviews
            .iter()
            .map(|r| {
                format!(
                    "[{}] {} ({}★): \"{}\"",
                    if r.verified { "VERIFIED" } else { "UNVERIFIED" },
                    r.author,
                    r.rating,
                    r.text
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"You are a restaurant review forensics assistant. Provide a balanced, objective assessment of the reviews below.

## Restaurant
- Name: {name}
- Platform rating: {rating:.1}/5
- Total reviews: {total}

## Review sample
{reviews}

## Scoring guidelines (IMPORTANT)
- truthScore must be based on the platform rating with reasonable adjustment:
  - Reviews look mostly genuine: truthScore = rating x 0.9 to 1.0
  - Some suspicious reviews: truthScore = rating x 0.8 to 0.9
  - Obvious manipulation only: truthScore = rating x 0.6 to 0.8
- Keep truthScore between {smin} and {smax}; avoid extreme scores
- botProbability must be reasonable: typical 20-40, clearly inflated 50-70

## Output format (pure JSON, no other text)
{{
  "truthScore": number ({smin}-{smax}, per the guidelines above),
  "botProbability": number (20-70),
  "confidence": number (70-90),
  "keyFindings": ["finding 1 (objective)", "finding 2", "finding 3"],
  "analysisSummary": "one balanced paragraph, under 200 characters"
}}"#,
            name = restaurant_name,
            rating = snapshot.rating,
            total = snapshot.total_reviews,
            reviews = review_lines,
            smin = self.bounds.score_min,
            smax = self.bounds.score_max,
        )
    }

    /// Call the generation API and return the raw completion text.
    async fn request_completion(&self, api_key: &str, prompt: &str) -> Result<String, String> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            GEMINI_API_URL, self.model, api_key
        );

        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("Generation API request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!(
                "Generation API returned error {}: {}",
                status, body
            ));
        }

        let completion: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to decode generation response: {}", e))?;

        completion
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| "Generation response contained no candidates".to_string())
    }

    /// Strip formatting fences and parse the structured result.
    ///
    /// Tolerates a raw JSON object, a ```json fenced block, and a bare
    /// ``` fenced block. Missing fields fall back field-wise; out-of-range
    /// values are clamped into the configured bounds.
    fn parse_report(&self, text: &str, web2_score: f64) -> Option<ForensicReport> {
        let json_str = extract_json_payload(text);
        let raw: RawAnalysis = serde_json::from_str(json_str.trim()).ok()?;

        let degraded = self.fallback_degraded("", web2_score);

        Some(ForensicReport {
            truth_score: self.clamp_score(raw.truth_score.unwrap_or(degraded.truth_score)),
            bot_probability: self
                .clamp_bot_probability(raw.bot_probability.unwrap_or(degraded.bot_probability)),
            confidence: raw.confidence.unwrap_or(degraded.confidence).clamp(0.0, 100.0),
            key_findings: if raw.key_findings.is_empty() {
                degraded.key_findings
            } else {
                raw.key_findings
            },
            analysis_summary: raw
                .analysis_summary
                .unwrap_or(degraded.analysis_summary),
        })
    }

    fn clamp_score(&self, score: f64) -> f64 {
        score.clamp(self.bounds.score_min, self.bounds.score_max)
    }

    fn clamp_bot_probability(&self, probability: f64) -> f64 {
        probability.clamp(
            self.bounds.bot_probability_min,
            self.bounds.bot_probability_max,
        )
    }

    /// Fallback for the no-credential configuration.
    ///
    /// A pure function of the Web2 score: slightly deflated, clamped into
    /// the configured band. No randomness: repeated calls with the same
    /// input yield the same score.
    fn fallback_unconfigured(&self, restaurant_name: &str, web2_score: f64) -> ForensicReport {
        let adjusted = web2_score * 0.85 + 0.3;
        ForensicReport {
            truth_score: self.clamp_score(adjusted),
            bot_probability: self.clamp_bot_probability(35.0),
            confidence: 75.0,
            key_findings: vec![
                "Review authenticity broadly plausible".to_string(),
                "Some high ratings use exaggerated promotional language".to_string(),
                "Verified reviewers report steadier satisfaction".to_string(),
            ],
            analysis_summary: format!(
                "{} rates reasonably overall, though some reviews appear polished. \
                 Cross-check against verified diner feedback.",
                restaurant_name
            ),
        }
    }

    /// Fallback for upstream failure or an unparseable completion.
    ///
    /// Deliberately distinct from the unconfigured fallback (higher floor,
    /// lower confidence) so the two paths are distinguishable in stored
    /// data, but equally deterministic.
    fn fallback_degraded(&self, restaurant_name: &str, web2_score: f64) -> ForensicReport {
        let adjusted = (web2_score * 0.85).max(3.0);
        ForensicReport {
            truth_score: self.clamp_score(adjusted),
            bot_probability: self.clamp_bot_probability(35.0),
            confidence: 70.0,
            key_findings: vec![
                "Automated estimate in effect".to_string(),
                "Review a larger sample before relying on this score".to_string(),
            ],
            analysis_summary: format!(
                "{} rates acceptably overall; verify in person before trusting the rating.",
                restaurant_name
            ),
        }
    }
}

#[async_trait]
impl ForensicAnalyzer for GeminiAnalyzer {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn analyze(&self, restaurant_name: &str, snapshot: &Web2Snapshot) -> ForensicReport {
        let api_key = match &self.api_key {
            Some(key) => key,
            None => {
                debug!(
                    restaurant = %restaurant_name,
                    "No generation API key configured, using deterministic fallback"
                );
                return self.fallback_unconfigured(restaurant_name, snapshot.rating);
            }
        };

        let prompt = self.build_prompt(restaurant_name, snapshot);

        let text = match self.request_completion(api_key, &prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    restaurant = %restaurant_name,
                    error = %e,
                    "Generation call failed, using degraded fallback"
                );
                return self.fallback_degraded(restaurant_name, snapshot.rating);
            }
        };

        match self.parse_report(&text, snapshot.rating) {
            Some(report) => report,
            None => {
                warn!(
                    restaurant = %restaurant_name,
                    "Generation output was not parseable as analysis JSON, using degraded fallback"
                );
                self.fallback_degraded(restaurant_name, snapshot.rating)
            }
        }
    }
}

/// Extract the JSON payload from a completion that may be wrapped in
/// triple-backtick fences, with or without a language tag.
fn extract_json_payload(text: &str) -> &str {
    if let Some(after) = text.split("```json").nth(1) {
        if let Some(inner) = after.split("```").next() {
            return inner;
        }
    }
    if let Some(inner) = text.split("```").nth(1) {
        return inner;
    }
    text
}

// ============================================================================
// Gemini API request/response types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

/// Completion payload shape; every field optional so partial output still
/// yields a usable report.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    truth_score: Option<f64>,
    bot_probability: Option<f64>,
    confidence: Option<f64>,
    #[serde(default)]
    key_findings: Vec<String>,
    analysis_summary: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::web2::{MockReviewSource, ReviewSource};

    fn analyzer_without_key() -> GeminiAnalyzer {
        GeminiAnalyzer::new(None)
    }

    const PAYLOAD: &str = r#"{
        "truthScore": 3.8,
        "botProbability": 42,
        "confidence": 80,
        "keyFindings": ["a", "b", "c"],
        "analysisSummary": "Looks mostly genuine."
    }"#;

    #[test]
    fn parses_raw_json() {
        let analyzer = analyzer_without_key();
        let report = analyzer.parse_report(PAYLOAD, 4.5).unwrap();
        assert_eq!(report.truth_score, 3.8);
        assert_eq!(report.bot_probability, 42.0);
        assert_eq!(report.key_findings, vec!["a", "b", "c"]);
    }

    #[test]
    fn parses_fenced_json_with_language_tag() {
        let analyzer = analyzer_without_key();
        let fenced = format!("Here is my analysis:\n```json\n{}\n```\n", PAYLOAD);
        let report = analyzer.parse_report(&fenced, 4.5).unwrap();
        assert_eq!(report.truth_score, 3.8);
    }

    #[test]
    fn parses_fenced_json_without_language_tag() {
        let analyzer = analyzer_without_key();
        let fenced = format!("```\n{}\n```", PAYLOAD);
        let report = analyzer.parse_report(&fenced, 4.5).unwrap();
        assert_eq!(report.truth_score, 3.8);
    }

    #[test]
    fn rejects_non_json_output() {
        let analyzer = analyzer_without_key();
        assert!(analyzer
            .parse_report("I cannot comply with that request.", 4.5)
            .is_none());
    }

    #[test]
    fn clamps_out_of_range_model_output() {
        let analyzer = analyzer_without_key();
        let wild = r#"{"truthScore": 0.1, "botProbability": 99, "confidence": 80,
                       "keyFindings": ["x"], "analysisSummary": "s"}"#;
        let report = analyzer.parse_report(wild, 4.5).unwrap();
        assert_eq!(report.truth_score, 2.5);
        assert_eq!(report.bot_probability, 70.0);

        let wild_high = r#"{"truthScore": 5.0, "botProbability": 3, "confidence": 80,
                            "keyFindings": ["x"], "analysisSummary": "s"}"#;
        let report = analyzer.parse_report(wild_high, 4.5).unwrap();
        assert_eq!(report.truth_score, 4.5);
        assert_eq!(report.bot_probability, 15.0);
    }

    #[test]
    fn missing_fields_fall_back_field_wise() {
        let analyzer = analyzer_without_key();
        let partial = r#"{"truthScore": 4.0}"#;
        let report = analyzer.parse_report(partial, 4.6).unwrap();
        assert_eq!(report.truth_score, 4.0);
        assert_eq!(report.bot_probability, 35.0);
        assert!(!report.key_findings.is_empty());
    }

    #[tokio::test]
    async fn unconfigured_analyzer_is_deterministic() {
        let analyzer = analyzer_without_key();
        let snapshot = MockReviewSource.fetch("Din Tai Fung", "Taipei").await.unwrap();

        let a = analyzer.analyze("Din Tai Fung", &snapshot).await;
        let b = analyzer.analyze("Din Tai Fung", &snapshot).await;

        assert_eq!(a.truth_score, b.truth_score);
        assert_eq!(a.bot_probability, b.bot_probability);
        assert!((2.5..=4.5).contains(&a.truth_score));
        assert!((15.0..=70.0).contains(&a.bot_probability));
    }

    #[tokio::test]
    async fn unconfigured_fallback_tracks_web2_score() {
        let analyzer = analyzer_without_key();
        let mut snapshot = MockReviewSource.fetch("X", "Y").await.unwrap();

        snapshot.rating = 4.8;
        let high = analyzer.analyze("X", &snapshot).await;
        // 4.8 * 0.85 + 0.3 = 4.38
        assert!((high.truth_score - 4.38).abs() < 1e-9);

        snapshot.rating = 2.0;
        let low = analyzer.analyze("X", &snapshot).await;
        // 2.0 * 0.85 + 0.3 = 2.0, clamped up to 2.5
        assert_eq!(low.truth_score, 2.5);
    }

    #[test]
    fn degraded_fallback_has_floor_and_is_deterministic() {
        let analyzer = analyzer_without_key();
        let a = analyzer.fallback_degraded("X", 3.0);
        let b = analyzer.fallback_degraded("X", 3.0);
        assert_eq!(a.truth_score, b.truth_score);
        // 3.0 * 0.85 = 2.55, floored at 3.0
        assert_eq!(a.truth_score, 3.0);
        assert_eq!(a.confidence, 70.0);
    }

    #[test]
    fn prompt_embeds_review_sample() {
        let analyzer = analyzer_without_key();
        let snapshot = Web2Snapshot {
            platform: "google".to_string(),
            rating: 4.4,
            total_reviews: 123,
            reviews: vec![crate::services::web2::Web2Review {
                author: "A".to_string(),
                rating: 5.0,
                text: "Great!".to_string(),
                verified: true,
            }],
        };
        let prompt = analyzer.build_prompt("Test Cafe", &snapshot);
        assert!(prompt.contains("Test Cafe"));
        assert!(prompt.contains("4.4/5"));
        assert!(prompt.contains("[VERIFIED] A (5★): \"Great!\""));
        assert!(prompt.contains("pure JSON"));
    }
}
