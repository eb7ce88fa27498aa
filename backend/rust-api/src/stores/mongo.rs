use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, to_bson};
use mongodb::{Collection, Database};
use serde::{Deserialize, Serialize};

use crate::models::attempt::{AttemptResult, AttemptStatus, BehaviorLogEntry, TestAttempt};
use crate::models::audit_log::AuditEvent;
use crate::models::pool::{LastResult, QuestionProgress};
use crate::models::question::Question;

use super::{AttemptStore, AuditSink, ProgressStore, QuestionCatalog};

pub struct MongoQuestionCatalog {
    questions: Collection<Question>,
}

impl MongoQuestionCatalog {
    pub fn new(mongo: &Database) -> Self {
        Self {
            questions: mongo.collection("questions"),
        }
    }
}

#[async_trait]
impl QuestionCatalog for MongoQuestionCatalog {
    async fn published_by_product(&self, product_id: &str) -> Result<Vec<Question>> {
        let cursor = self
            .questions
            .find(doc! { "product_id": product_id, "status": "published" })
            .await
            .context("Failed to query published questions")?;

        cursor
            .try_collect()
            .await
            .context("Failed to read question cursor")
    }

    async fn question_by_id(&self, question_id: &str) -> Result<Option<Question>> {
        self.questions
            .find_one(doc! { "_id": question_id })
            .await
            .context("Failed to query question by id")
    }
}

/// Progress document as the grading pipeline writes it. Only the
/// per-question fields are exposed to the core.
#[derive(Debug, Serialize, Deserialize)]
struct ProgressDocument {
    user_id: String,
    product_id: String,
    question_id: String,
    last_result: Option<LastResult>,
    #[serde(default)]
    marked: bool,
}

pub struct MongoProgressStore {
    progress: Collection<ProgressDocument>,
}

impl MongoProgressStore {
    pub fn new(mongo: &Database) -> Self {
        Self {
            progress: mongo.collection("question_progress"),
        }
    }
}

#[async_trait]
impl ProgressStore for MongoProgressStore {
    async fn progress_for_user(
        &self,
        user_id: &str,
        product_id: &str,
    ) -> Result<HashMap<String, QuestionProgress>> {
        let mut cursor = self
            .progress
            .find(doc! { "user_id": user_id, "product_id": product_id })
            .await
            .context("Failed to query user progress")?;

        let mut by_question = HashMap::new();
        while let Some(record) = cursor.try_next().await.context("Failed to read progress")? {
            by_question.insert(
                record.question_id.clone(),
                QuestionProgress {
                    question_id: record.question_id,
                    last_result: record.last_result,
                    marked: record.marked,
                },
            );
        }

        Ok(by_question)
    }
}

pub struct MongoAttemptStore {
    attempts: Collection<TestAttempt>,
    mongo: Database,
}

impl MongoAttemptStore {
    pub fn new(mongo: &Database) -> Self {
        Self {
            attempts: mongo.collection("test_attempts"),
            mongo: mongo.clone(),
        }
    }
}

#[async_trait]
impl AttemptStore for MongoAttemptStore {
    async fn create(&self, attempt: &TestAttempt) -> Result<()> {
        self.attempts
            .insert_one(attempt)
            .await
            .context("Failed to insert attempt")?;
        Ok(())
    }

    async fn get(&self, attempt_id: &str) -> Result<Option<TestAttempt>> {
        self.attempts
            .find_one(doc! { "_id": attempt_id })
            .await
            .context("Failed to query attempt")
    }

    async fn set_answer(
        &self,
        attempt_id: &str,
        question_id: &str,
        selected_choice: &str,
        seconds_delta: i64,
    ) -> Result<()> {
        self.attempts
            .update_one(
                doc! { "_id": attempt_id, "questions.question_id": question_id },
                doc! {
                    "$set": { "questions.$.chosen_answer": selected_choice },
                    "$inc": { "seconds_elapsed": seconds_delta },
                },
            )
            .await
            .context("Failed to store answer")?;
        Ok(())
    }

    async fn set_flag(&self, attempt_id: &str, question_id: &str, flagged: bool) -> Result<()> {
        self.attempts
            .update_one(
                doc! { "_id": attempt_id, "questions.question_id": question_id },
                doc! { "$set": { "questions.$.flagged": flagged } },
            )
            .await
            .context("Failed to store flag")?;
        Ok(())
    }

    async fn append_log(&self, attempt_id: &str, entry: &BehaviorLogEntry) -> Result<()> {
        let entry_bson = to_bson(entry).context("Failed to serialize behavior log entry")?;
        self.attempts
            .update_one(
                doc! { "_id": attempt_id },
                doc! { "$push": { "behavior_log": entry_bson } },
            )
            .await
            .context("Failed to append behavior log entry")?;
        Ok(())
    }

    async fn save_session_state(
        &self,
        attempt_id: &str,
        current_index: u32,
        seconds_elapsed: i64,
        status: AttemptStatus,
    ) -> Result<()> {
        let status_bson = to_bson(&status).context("Failed to serialize status")?;
        self.attempts
            .update_one(
                doc! { "_id": attempt_id },
                doc! {
                    "$set": {
                        "current_index": current_index,
                        "seconds_elapsed": seconds_elapsed,
                        "status": status_bson,
                    },
                },
            )
            .await
            .context("Failed to save session state")?;
        Ok(())
    }

    async fn finish(
        &self,
        attempt_id: &str,
        result: &AttemptResult,
        finished_at: DateTime<Utc>,
    ) -> Result<()> {
        let result_bson = to_bson(result).context("Failed to serialize attempt result")?;
        let finished_bson = to_bson(&finished_at).context("Failed to serialize finish time")?;
        self.attempts
            .update_one(
                doc! { "_id": attempt_id },
                doc! {
                    "$set": {
                        "status": "finished",
                        "finished_at": finished_bson,
                        "result": result_bson,
                    },
                },
            )
            .await
            .context("Failed to finalize attempt")?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.mongo
            .run_command(doc! { "ping": 1 })
            .await
            .context("MongoDB ping failed")?;
        Ok(())
    }
}

pub struct MongoAuditSink {
    events: Collection<AuditEvent>,
}

impl MongoAuditSink {
    pub fn new(mongo: &Database) -> Self {
        Self {
            events: mongo.collection("attempt_audit_log"),
        }
    }
}

#[async_trait]
impl AuditSink for MongoAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<()> {
        self.events
            .insert_one(event)
            .await
            .context("Failed to insert audit event")?;
        Ok(())
    }
}
