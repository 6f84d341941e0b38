//! Durable indexing progress cursor.
//!
//! The status is persisted as the payload of every index commit and read back
//! at startup to decide which activities must be replayed.

use serde::{Deserialize, Serialize};

use crate::error::IndexDataError;

/// Number of gaps printed in diagnostic output.
pub const GAPS_DISPLAY_MAX_COUNT: usize = 50;
/// Gap lists at most this much longer than the max are printed in full.
pub const GAPS_DISPLAY_GROWTH: usize = 10;

/// Last processed activity id plus the ids below it that are still pending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexingActivityStatus {
    #[serde(rename = "LastActivityId")]
    pub last_activity_id: i32,
    #[serde(rename = "Gaps", default)]
    pub gaps: Vec<i32>,
}

impl IndexingActivityStatus {
    /// Status of an index that has never processed an activity.
    pub fn startup() -> Self {
        Self::default()
    }

    /// Create a status; gaps are sorted, deduplicated and bounded by `last_activity_id`.
    pub fn new(last_activity_id: i32, gaps: impl IntoIterator<Item = i32>) -> Self {
        let mut gaps: Vec<i32> = gaps
            .into_iter()
            .filter(|gap| *gap < last_activity_id)
            .collect();
        gaps.sort_unstable();
        gaps.dedup();
        Self {
            last_activity_id,
            gaps,
        }
    }

    pub fn is_startup(&self) -> bool {
        self.last_activity_id == 0 && self.gaps.is_empty()
    }

    pub fn to_json(&self) -> Result<String, IndexDataError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a persisted status, normalizing its gaps.
    pub fn from_json(text: &str) -> Result<Self, IndexDataError> {
        let raw: IndexingActivityStatus = serde_json::from_str(text)?;
        Ok(Self::new(raw.last_activity_id, raw.gaps))
    }

    /// Render gaps for logs, keeping the output bounded for long lists.
    pub fn gaps_to_string(gaps: &[i32], max_count: usize, growth: usize) -> String {
        if gaps.len() <= max_count + growth {
            return join_ids(gaps);
        }

        let additional = gaps.len() - max_count;
        format!(
            "{},...and {} additional {}",
            join_ids(&gaps[..max_count]),
            additional,
            if additional == 1 { "item" } else { "items" }
        )
    }
}

fn join_ids(ids: &[i32]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

impl std::fmt::Display for IndexingActivityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}({})",
            self.last_activity_id,
            Self::gaps_to_string(&self.gaps, GAPS_DISPLAY_MAX_COUNT, GAPS_DISPLAY_GROWTH)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup() {
        let status = IndexingActivityStatus::startup();
        assert_eq!(status.last_activity_id, 0);
        assert!(status.gaps.is_empty());
        assert!(status.is_startup());
        assert_eq!(status.to_string(), "0()");
    }

    #[test]
    fn test_new_normalizes_gaps() {
        let status = IndexingActivityStatus::new(10, vec![7, 3, 7, 10, 12, 5]);
        assert_eq!(status.gaps, vec![3, 5, 7]);
        assert_eq!(status.to_string(), "10(3,5,7)");
    }

    #[test]
    fn test_json_form() {
        let status = IndexingActivityStatus::new(42, vec![40, 41]);
        let json = status.to_json().unwrap();
        assert_eq!(json, r#"{"LastActivityId":42,"Gaps":[40,41]}"#);
        assert_eq!(IndexingActivityStatus::from_json(&json).unwrap(), status);

        let parsed = IndexingActivityStatus::from_json(r#"{"LastActivityId":5,"Gaps":[9,1]}"#)
            .unwrap();
        assert_eq!(parsed.gaps, vec![1]);
        assert!(IndexingActivityStatus::from_json("{}").is_err());
    }

    #[test]
    fn test_gaps_to_string_at_threshold_prints_all() {
        let gaps: Vec<i32> = (1..=15).collect();
        let text = IndexingActivityStatus::gaps_to_string(&gaps, 10, 5);
        assert_eq!(text, "1,2,3,4,5,6,7,8,9,10,11,12,13,14,15");
    }

    #[test]
    fn test_gaps_to_string_below_threshold_prints_all() {
        let gaps: Vec<i32> = (1..=14).collect();
        let text = IndexingActivityStatus::gaps_to_string(&gaps, 10, 5);
        assert_eq!(text.split(',').count(), 14);
    }

    #[test]
    fn test_gaps_to_string_over_threshold_is_bounded() {
        let gaps: Vec<i32> = (1..=16).collect();
        let text = IndexingActivityStatus::gaps_to_string(&gaps, 10, 5);
        assert_eq!(text, "1,2,3,4,5,6,7,8,9,10,...and 6 additional items");
    }

    #[test]
    fn test_gaps_to_string_singular_suffix() {
        let gaps: Vec<i32> = (1..=3).collect();
        let text = IndexingActivityStatus::gaps_to_string(&gaps, 2, 0);
        assert_eq!(text, "1,2,...and 1 additional item");
    }
}
