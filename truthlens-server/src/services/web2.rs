//! Web2 review aggregator seam
//!
//! The aggregate rating and review sample feeding the forensic analyzer
//! come through this trait. Production deployments would back it with a
//! Places/Yelp scraper integration; the bundled implementation serves
//! deterministic in-memory data so tests and unconfigured deployments
//! never depend on network availability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use truthlens_common::Result;

/// One sampled review from the aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Web2Review {
    pub author: String,
    /// 0-5
    pub rating: f64,
    pub text: String,
    /// Whether the platform marks the reviewer as verified
    pub verified: bool,
}

/// Aggregate snapshot for one restaurant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Web2Snapshot {
    pub platform: String,
    /// Aggregate rating, 0-5
    pub rating: f64,
    pub total_reviews: i64,
    pub reviews: Vec<Web2Review>,
}

/// Source of Web2 review data.
#[async_trait]
pub trait ReviewSource: Send + Sync {
    /// Source name for logging
    fn name(&self) -> &'static str;

    /// Fetch the aggregate snapshot for a restaurant.
    async fn fetch(&self, restaurant_name: &str, location: &str) -> Result<Web2Snapshot>;
}

/// In-memory review source.
///
/// The rating is keyed off the restaurant name so repeated fetches for the
/// same restaurant agree, and different restaurants still land on different
/// ratings within the plausible 4.2-4.8 band of a hyped venue.
pub struct MockReviewSource;

impl MockReviewSource {
    fn rating_for(name: &str) -> f64 {
        // FNV-1a over the normalized name, mapped into [4.2, 4.8]
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in name.trim().to_lowercase().bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        4.2 + (hash % 7) as f64 * 0.1
    }
}

#[async_trait]
impl ReviewSource for MockReviewSource {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn fetch(&self, restaurant_name: &str, _location: &str) -> Result<Web2Snapshot> {
        let rating = Self::rating_for(restaurant_name);

        Ok(Web2Snapshot {
            platform: "google".to_string(),
            rating,
            total_reviews: 1847,
            reviews: vec![
                Web2Review {
                    author: "FoodInfluencer_88".to_string(),
                    rating: 5.0,
                    text: "OMG AMAZING!!! Best food EVER!!! Must try!!!".to_string(),
                    verified: false,
                },
                Web2Review {
                    author: "LocalDiner42".to_string(),
                    rating: 2.0,
                    text: "Waited 45min for cold ramen. Portion shrunk since they went viral."
                        .to_string(),
                    verified: true,
                },
                Web2Review {
                    author: "TasteExplorer2024".to_string(),
                    rating: 5.0,
                    text: "Hidden gem! Best kept secret! Must visit!".to_string(),
                    verified: false,
                },
                Web2Review {
                    author: "HonestReview_TW".to_string(),
                    rating: 3.0,
                    text: "Food is decent but overpriced for the quality. Service was slow."
                        .to_string(),
                    verified: true,
                },
            ],
        })
    }
}
