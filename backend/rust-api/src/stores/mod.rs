use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::attempt::{AttemptResult, AttemptStatus, BehaviorLogEntry, TestAttempt};
use crate::models::audit_log::AuditEvent;
use crate::models::pool::QuestionProgress;
use crate::models::question::Question;

pub mod memory;
pub mod mongo;

/// Read-only view of the question catalog. The core never writes here.
#[async_trait]
pub trait QuestionCatalog: Send + Sync {
    async fn published_by_product(&self, product_id: &str) -> Result<Vec<Question>>;
    async fn question_by_id(&self, question_id: &str) -> Result<Option<Question>>;
}

/// Read-only view of per-user progress, keyed by question id.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn progress_for_user(
        &self,
        user_id: &str,
        product_id: &str,
    ) -> Result<HashMap<String, QuestionProgress>>;
}

/// Attempt persistence. Each mutation is a single atomic store
/// operation with last-write-wins semantics; callers enforce the
/// attempt state machine before issuing writes.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn create(&self, attempt: &TestAttempt) -> Result<()>;
    async fn get(&self, attempt_id: &str) -> Result<Option<TestAttempt>>;
    async fn set_answer(
        &self,
        attempt_id: &str,
        question_id: &str,
        selected_choice: &str,
        seconds_delta: i64,
    ) -> Result<()>;
    async fn set_flag(&self, attempt_id: &str, question_id: &str, flagged: bool) -> Result<()>;
    async fn append_log(&self, attempt_id: &str, entry: &BehaviorLogEntry) -> Result<()>;
    async fn save_session_state(
        &self,
        attempt_id: &str,
        current_index: u32,
        seconds_elapsed: i64,
        status: AttemptStatus,
    ) -> Result<()>;
    async fn finish(
        &self,
        attempt_id: &str,
        result: &AttemptResult,
        finished_at: DateTime<Utc>,
    ) -> Result<()>;
    /// Backing-store liveness probe used by the health endpoint.
    async fn ping(&self) -> Result<()>;
}

/// Sink for attempt lifecycle audit events.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: &AuditEvent) -> Result<()>;
}
