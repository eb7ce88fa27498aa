use serde::{Deserialize, Serialize};

/// A bank question as stored in the catalog. Content is frozen into
/// attempt snapshots at assembly time, so later edits never propagate
/// to existing attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "_id")]
    pub id: String,
    pub product_id: String,
    pub stem: String,
    pub choices: Vec<Choice>,
    pub correct_choice: String,
    pub explanation: Option<String>,
    pub system: String,
    pub subject: String,
    pub topic: Option<String>,
    pub status: QuestionStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub label: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionStatus {
    Draft,
    Published,
    Deprecated,
}
