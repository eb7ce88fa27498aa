use serde::{Deserialize, Serialize};
use validator::Validate;

/// How a question classifies for a given user, derived from progress
/// history. `Marked` is non-exclusive: it matches on the progress flag
/// regardless of the last result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionClassification {
    Unused,
    Correct,
    Incorrect,
    Omitted,
    Marked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastResult {
    Correct,
    Incorrect,
    Omitted,
}

/// Per-question progress for one user within one product. Read-only
/// from this service's perspective; written by the grading pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionProgress {
    pub question_id: String,
    pub last_result: Option<LastResult>,
    #[serde(default)]
    pub marked: bool,
}

/// Filter dimensions for pool computation. An empty selection on any
/// dimension means "no constraint", never "match nothing".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolFilters {
    #[serde(default)]
    pub systems: Vec<String>,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub statuses: Vec<QuestionClassification>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PoolRequest {
    #[validate(length(min = 1, message = "user_id is required"))]
    pub user_id: String,
    #[validate(length(min = 1, message = "product_id is required"))]
    pub product_id: String,
    #[serde(default)]
    pub filters: PoolFilters,
}

#[derive(Debug, Serialize)]
pub struct PoolResponse {
    pub universe_size: u64,
    pub eligible_pool_size: u64,
    pub eligible_ids: Vec<String>,
}

/// Result of a pool computation, before any selection happens.
#[derive(Debug, Clone)]
pub struct PoolComputation {
    pub universe_size: u64,
    pub eligible_ids: Vec<String>,
}
