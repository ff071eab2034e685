//! Identity types for favorites entities

use chrono::{DateTime, Utc};

/// Opaque asset identifier, assigned by the caller.
pub type AssetId = String;

/// Opaque identifier of the user that owns an asset.
pub type OwnerId = String;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Recency score used to order the cache index. Higher is more recent.
pub type Score = f64;

/// Score for an index entry assigned at `at`.
pub fn score_at(at: Timestamp) -> Score {
    at.timestamp_millis() as Score
}

/// Score for an index entry assigned now.
pub fn score_now() -> Score {
    score_at(Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_later_assignment_scores_higher() {
        let earlier = Utc::now();
        let later = earlier + Duration::milliseconds(5);
        assert!(score_at(later) > score_at(earlier));
    }
}
