use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One successful non-empty recognition. Immutable once created; lives in
/// the bounded history list and the "latest scan" slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    pub id: String,
    pub captured_at: DateTime<Utc>,
    /// Data URL of the captured frame, for history display.
    pub image_data_url: String,
    /// Cleaned recognition text.
    pub text: String,
}

impl ScanRecord {
    pub fn new(captured_at: DateTime<Utc>, image_data_url: String, text: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            captured_at,
            image_data_url,
            text,
        }
    }
}
