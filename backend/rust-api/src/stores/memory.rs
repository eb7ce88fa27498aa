use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::attempt::{AttemptResult, AttemptStatus, BehaviorLogEntry, TestAttempt};
use crate::models::audit_log::AuditEvent;
use crate::models::pool::QuestionProgress;
use crate::models::question::{Question, QuestionStatus};

use super::{AttemptStore, AuditSink, ProgressStore, QuestionCatalog};

/// In-memory stores backing the test suite and embedded use. Same
/// contracts as the Mongo implementations, minus durability.
#[derive(Default)]
pub struct MemoryQuestionCatalog {
    questions: Mutex<Vec<Question>>,
}

impl MemoryQuestionCatalog {
    /// Inserts a question, replacing any existing one with the same id.
    pub fn insert(&self, question: Question) {
        let mut questions = self.questions.lock().expect("catalog lock poisoned");
        questions.retain(|q| q.id != question.id);
        questions.push(question);
    }

    pub fn remove(&self, question_id: &str) {
        let mut questions = self.questions.lock().expect("catalog lock poisoned");
        questions.retain(|q| q.id != question_id);
    }
}

#[async_trait]
impl QuestionCatalog for MemoryQuestionCatalog {
    async fn published_by_product(&self, product_id: &str) -> Result<Vec<Question>> {
        let questions = self
            .questions
            .lock()
            .map_err(|_| anyhow!("catalog lock poisoned"))?;
        Ok(questions
            .iter()
            .filter(|q| q.product_id == product_id && q.status == QuestionStatus::Published)
            .cloned()
            .collect())
    }

    async fn question_by_id(&self, question_id: &str) -> Result<Option<Question>> {
        let questions = self
            .questions
            .lock()
            .map_err(|_| anyhow!("catalog lock poisoned"))?;
        Ok(questions.iter().find(|q| q.id == question_id).cloned())
    }
}

#[derive(Default)]
pub struct MemoryProgressStore {
    records: Mutex<HashMap<(String, String), HashMap<String, QuestionProgress>>>,
}

impl MemoryProgressStore {
    pub fn set(&self, user_id: &str, product_id: &str, progress: QuestionProgress) {
        let mut records = self.records.lock().expect("progress lock poisoned");
        records
            .entry((user_id.to_string(), product_id.to_string()))
            .or_default()
            .insert(progress.question_id.clone(), progress);
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn progress_for_user(
        &self,
        user_id: &str,
        product_id: &str,
    ) -> Result<HashMap<String, QuestionProgress>> {
        let records = self
            .records
            .lock()
            .map_err(|_| anyhow!("progress lock poisoned"))?;
        Ok(records
            .get(&(user_id.to_string(), product_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct MemoryAttemptStore {
    attempts: Mutex<HashMap<String, TestAttempt>>,
    fail_log_appends: AtomicBool,
}

impl MemoryAttemptStore {
    pub fn count(&self) -> usize {
        self.attempts.lock().expect("attempt lock poisoned").len()
    }

    /// Makes every subsequent `append_log` call fail, for exercising
    /// the swallowed-secondary-write path.
    pub fn fail_log_appends(&self, fail: bool) {
        self.fail_log_appends.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl AttemptStore for MemoryAttemptStore {
    async fn create(&self, attempt: &TestAttempt) -> Result<()> {
        let mut attempts = self
            .attempts
            .lock()
            .map_err(|_| anyhow!("attempt lock poisoned"))?;
        attempts.insert(attempt.id.clone(), attempt.clone());
        Ok(())
    }

    async fn get(&self, attempt_id: &str) -> Result<Option<TestAttempt>> {
        let attempts = self
            .attempts
            .lock()
            .map_err(|_| anyhow!("attempt lock poisoned"))?;
        Ok(attempts.get(attempt_id).cloned())
    }

    async fn set_answer(
        &self,
        attempt_id: &str,
        question_id: &str,
        selected_choice: &str,
        seconds_delta: i64,
    ) -> Result<()> {
        let mut attempts = self
            .attempts
            .lock()
            .map_err(|_| anyhow!("attempt lock poisoned"))?;
        let attempt = attempts
            .get_mut(attempt_id)
            .ok_or_else(|| anyhow!("attempt {attempt_id} missing"))?;
        let snapshot = attempt
            .questions
            .iter_mut()
            .find(|q| q.question_id == question_id)
            .ok_or_else(|| anyhow!("question {question_id} missing from attempt"))?;
        snapshot.chosen_answer = Some(selected_choice.to_string());
        attempt.seconds_elapsed += seconds_delta;
        Ok(())
    }

    async fn set_flag(&self, attempt_id: &str, question_id: &str, flagged: bool) -> Result<()> {
        let mut attempts = self
            .attempts
            .lock()
            .map_err(|_| anyhow!("attempt lock poisoned"))?;
        let attempt = attempts
            .get_mut(attempt_id)
            .ok_or_else(|| anyhow!("attempt {attempt_id} missing"))?;
        let snapshot = attempt
            .questions
            .iter_mut()
            .find(|q| q.question_id == question_id)
            .ok_or_else(|| anyhow!("question {question_id} missing from attempt"))?;
        snapshot.flagged = flagged;
        Ok(())
    }

    async fn append_log(&self, attempt_id: &str, entry: &BehaviorLogEntry) -> Result<()> {
        if self.fail_log_appends.load(Ordering::SeqCst) {
            bail!("behavior log append failure injected");
        }
        let mut attempts = self
            .attempts
            .lock()
            .map_err(|_| anyhow!("attempt lock poisoned"))?;
        let attempt = attempts
            .get_mut(attempt_id)
            .ok_or_else(|| anyhow!("attempt {attempt_id} missing"))?;
        attempt.behavior_log.push(entry.clone());
        Ok(())
    }

    async fn save_session_state(
        &self,
        attempt_id: &str,
        current_index: u32,
        seconds_elapsed: i64,
        status: AttemptStatus,
    ) -> Result<()> {
        let mut attempts = self
            .attempts
            .lock()
            .map_err(|_| anyhow!("attempt lock poisoned"))?;
        let attempt = attempts
            .get_mut(attempt_id)
            .ok_or_else(|| anyhow!("attempt {attempt_id} missing"))?;
        attempt.current_index = current_index;
        attempt.seconds_elapsed = seconds_elapsed;
        attempt.status = status;
        Ok(())
    }

    async fn finish(
        &self,
        attempt_id: &str,
        result: &AttemptResult,
        finished_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut attempts = self
            .attempts
            .lock()
            .map_err(|_| anyhow!("attempt lock poisoned"))?;
        let attempt = attempts
            .get_mut(attempt_id)
            .ok_or_else(|| anyhow!("attempt {attempt_id} missing"))?;
        attempt.status = AttemptStatus::Finished;
        attempt.finished_at = Some(finished_at);
        attempt.result = Some(result.clone());
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
    fail_writes: AtomicBool,
}

impl MemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().expect("audit lock poisoned").clone()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("audit write failure injected");
        }
        let mut events = self
            .events
            .lock()
            .map_err(|_| anyhow!("audit lock poisoned"))?;
        events.push(event.clone());
        Ok(())
    }
}
