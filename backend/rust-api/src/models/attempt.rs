use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::pool::PoolFilters;
use super::question::{Choice, Question};

/// One assembled test session. The `questions` list is frozen at
/// creation; only per-question answer/flag fields and the session
/// fields mutate afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestAttempt {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub product_id: String,
    /// Published question count for the product at assembly time.
    pub universe_size: u64,
    /// Eligible pool size at assembly time. Never recomputed.
    pub eligible_pool_size: u64,
    pub status: AttemptStatus,
    pub questions: Vec<QuestionSnapshot>,
    /// Append-only forensic event log, ordered by insertion.
    #[serde(default)]
    pub behavior_log: Vec<BehaviorLogEntry>,
    pub seconds_elapsed: i64,
    pub current_index: u32,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub result: Option<AttemptResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Active,
    Suspended,
    Finished,
}

/// Frozen copy of question content embedded in an attempt, immune to
/// later catalog edits or deletions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSnapshot {
    pub question_id: String,
    pub stem: String,
    pub choices: Vec<Choice>,
    pub correct_choice: String,
    pub explanation: Option<String>,
    pub system: String,
    pub subject: String,
    pub chosen_answer: Option<String>,
    pub flagged: bool,
}

impl QuestionSnapshot {
    pub fn from_question(question: &Question) -> Self {
        Self {
            question_id: question.id.clone(),
            stem: question.stem.clone(),
            choices: question.choices.clone(),
            correct_choice: question.correct_choice.clone(),
            explanation: question.explanation.clone(),
            system: question.system.clone(),
            subject: question.subject.clone(),
            chosen_answer: None,
            flagged: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorLogEntry {
    pub question_id: Option<String>,
    pub action: String,
    pub detail: Option<String>,
    pub offset_seconds: i64,
    pub recorded_at: DateTime<Utc>,
}

/// Grading summary computed once, at finalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptResult {
    pub correct_count: u32,
    pub incorrect_count: u32,
    pub omitted_count: u32,
    pub percentage: f64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AssembleTestRequest {
    #[validate(length(min = 1, message = "user_id is required"))]
    pub user_id: String,
    #[validate(length(min = 1, message = "product_id is required"))]
    pub product_id: String,
    #[serde(default)]
    pub filters: PoolFilters,
    #[validate(range(min = 1, max = 100, message = "count must be between 1 and 100"))]
    pub count: u32,
}

/// Incremental mutation of a live attempt. Tagged so each variant
/// carries exactly the fields it needs.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttemptMutation {
    Answer {
        question_id: String,
        selected_choice: String,
        #[serde(default)]
        seconds_delta: i64,
    },
    Flag {
        question_id: String,
        flagged: bool,
    },
    Log {
        question_id: Option<String>,
        action: String,
        detail: Option<String>,
        #[serde(default)]
        offset_seconds: i64,
    },
}

/// Session-level transition: save/suspend a session snapshot, or
/// finish the attempt for good.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttemptTransition {
    Snapshot {
        current_index: u32,
        seconds_elapsed: i64,
        #[serde(default)]
        suspend: bool,
    },
    Finish,
}
