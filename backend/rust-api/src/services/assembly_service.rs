use std::sync::Arc;

use chrono::Utc;
use rand::seq::SliceRandom;
use uuid::Uuid;

use crate::error::CoreError;
use crate::metrics::{ATTEMPTS_ACTIVE, ATTEMPTS_ASSEMBLED_TOTAL};
use crate::models::attempt::{AssembleTestRequest, AttemptStatus, QuestionSnapshot, TestAttempt};
use crate::stores::{AttemptStore, AuditSink, ProgressStore, QuestionCatalog};

use super::audit_service::AuditService;
use super::pool_service::PoolService;

/// Test Assembler: snapshots a fixed question set into a new immutable
/// attempt. Deliberately not idempotent; every call creates a new
/// attempt record.
pub struct AssemblyService {
    catalog: Arc<dyn QuestionCatalog>,
    progress: Arc<dyn ProgressStore>,
    attempts: Arc<dyn AttemptStore>,
    audit: Arc<dyn AuditSink>,
}

impl AssemblyService {
    pub fn new(
        catalog: Arc<dyn QuestionCatalog>,
        progress: Arc<dyn ProgressStore>,
        attempts: Arc<dyn AttemptStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            catalog,
            progress,
            attempts,
            audit,
        }
    }

    pub async fn assemble(&self, req: &AssembleTestRequest) -> Result<TestAttempt, CoreError> {
        // DTO validation enforces the 1..=100 range; re-checked here so
        // a direct caller cannot slip through with zero.
        if req.count == 0 {
            return Err(CoreError::validation("count must be at least 1"));
        }

        let pool_service = PoolService::new(self.catalog.clone(), self.progress.clone());
        let pool = pool_service
            .compute_eligible_pool(&req.user_id, &req.product_id, &req.filters)
            .await?;

        if pool.eligible_ids.is_empty() {
            return Err(CoreError::NoEligibleQuestions);
        }

        let eligible_pool_size = pool.eligible_ids.len() as u64;
        let take = (req.count as usize).min(pool.eligible_ids.len());
        let degraded = take < req.count as usize;
        if degraded {
            tracing::info!(
                requested = req.count,
                available = take,
                "eligible pool smaller than requested count, assembling degraded attempt"
            );
        }

        // Uniform selection without replacement
        let mut selected = pool.eligible_ids;
        selected.shuffle(&mut rand::rng());
        selected.truncate(take);

        let mut snapshots = Vec::with_capacity(selected.len());
        for question_id in &selected {
            let question = self
                .catalog
                .question_by_id(question_id)
                .await?
                .ok_or_else(|| CoreError::not_found(format!("question {question_id}")))?;
            snapshots.push(QuestionSnapshot::from_question(&question));
        }

        let attempt = TestAttempt {
            id: Uuid::new_v4().to_string(),
            user_id: req.user_id.clone(),
            product_id: req.product_id.clone(),
            universe_size: pool.universe_size,
            eligible_pool_size,
            status: AttemptStatus::Active,
            questions: snapshots,
            behavior_log: Vec::new(),
            seconds_elapsed: 0,
            current_index: 0,
            created_at: Utc::now(),
            finished_at: None,
            result: None,
        };

        self.attempts.create(&attempt).await?;

        let mode = if degraded { "degraded" } else { "full" };
        ATTEMPTS_ASSEMBLED_TOTAL.with_label_values(&[mode]).inc();
        ATTEMPTS_ACTIVE.inc();

        AuditService::new(self.audit.clone())
            .attempt_assembled(&attempt)
            .await;

        tracing::info!(
            attempt_id = %attempt.id,
            user_id = %attempt.user_id,
            questions = attempt.questions.len(),
            universe = attempt.universe_size,
            pool = attempt.eligible_pool_size,
            "test attempt assembled"
        );

        Ok(attempt)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::models::pool::PoolFilters;
    use crate::models::question::{Choice, Question, QuestionStatus};
    use crate::stores::memory::{
        MemoryAttemptStore, MemoryAuditSink, MemoryProgressStore, MemoryQuestionCatalog,
    };

    struct Fixture {
        catalog: Arc<MemoryQuestionCatalog>,
        attempts: Arc<MemoryAttemptStore>,
        audit: Arc<MemoryAuditSink>,
        service: AssemblyService,
    }

    fn fixture() -> Fixture {
        let catalog = Arc::new(MemoryQuestionCatalog::default());
        let progress = Arc::new(MemoryProgressStore::default());
        let attempts = Arc::new(MemoryAttemptStore::default());
        let audit = Arc::new(MemoryAuditSink::default());
        let service = AssemblyService::new(
            catalog.clone(),
            progress.clone(),
            attempts.clone(),
            audit.clone(),
        );
        Fixture {
            catalog,
            attempts,
            audit,
            service,
        }
    }

    fn question(id: &str, product_id: &str) -> Question {
        Question {
            id: id.to_string(),
            product_id: product_id.to_string(),
            stem: format!("Stem for {id}"),
            choices: vec![
                Choice {
                    label: "A".to_string(),
                    text: "First".to_string(),
                },
                Choice {
                    label: "B".to_string(),
                    text: "Second".to_string(),
                },
            ],
            correct_choice: "A".to_string(),
            explanation: Some("Because A.".to_string()),
            system: "cardio".to_string(),
            subject: "medicine".to_string(),
            topic: None,
            status: QuestionStatus::Published,
        }
    }

    fn request(count: u32) -> AssembleTestRequest {
        AssembleTestRequest {
            user_id: "u1".to_string(),
            product_id: "step1".to_string(),
            filters: PoolFilters::default(),
            count,
        }
    }

    #[tokio::test]
    async fn assembles_requested_count_of_distinct_questions() {
        let fx = fixture();
        for i in 0..10 {
            fx.catalog.insert(question(&format!("q{i}"), "step1"));
        }

        let attempt = fx.service.assemble(&request(5)).await.unwrap();

        assert_eq!(attempt.universe_size, 10);
        assert_eq!(attempt.eligible_pool_size, 10);
        assert_eq!(attempt.questions.len(), 5);
        assert_eq!(attempt.status, AttemptStatus::Active);

        let ids: HashSet<&str> = attempt
            .questions
            .iter()
            .map(|q| q.question_id.as_str())
            .collect();
        assert_eq!(ids.len(), 5);
        for id in &ids {
            assert!(id.starts_with('q'));
        }
    }

    #[tokio::test]
    async fn degrades_to_pool_size_when_count_exceeds_it() {
        let fx = fixture();
        for i in 0..3 {
            fx.catalog.insert(question(&format!("q{i}"), "step1"));
        }

        let attempt = fx.service.assemble(&request(10)).await.unwrap();
        assert_eq!(attempt.questions.len(), 3);
        assert_eq!(attempt.eligible_pool_size, 3);
    }

    #[tokio::test]
    async fn empty_pool_fails_without_creating_an_attempt() {
        let fx = fixture();

        let err = fx.service.assemble(&request(5)).await.unwrap_err();
        assert!(matches!(err, CoreError::NoEligibleQuestions));
        assert_eq!(fx.attempts.count(), 0);
    }

    #[tokio::test]
    async fn snapshots_survive_source_question_edits_and_deletes() {
        let fx = fixture();
        fx.catalog.insert(question("q0", "step1"));
        fx.catalog.insert(question("q1", "step1"));

        let attempt = fx.service.assemble(&request(2)).await.unwrap();
        let original = attempt.questions.clone();

        let mut edited = question("q0", "step1");
        edited.stem = "Rewritten stem".to_string();
        edited.correct_choice = "B".to_string();
        fx.catalog.insert(edited);
        fx.catalog.remove("q1");

        let stored = fx.attempts.get(&attempt.id).await.unwrap().unwrap();
        assert_eq!(stored.questions, original);
    }

    #[tokio::test]
    async fn every_call_creates_a_new_attempt() {
        let fx = fixture();
        for i in 0..4 {
            fx.catalog.insert(question(&format!("q{i}"), "step1"));
        }

        let first = fx.service.assemble(&request(2)).await.unwrap();
        let second = fx.service.assemble(&request(2)).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(fx.attempts.count(), 2);
    }

    #[tokio::test]
    async fn audit_write_failure_does_not_fail_assembly() {
        let fx = fixture();
        fx.catalog.insert(question("q0", "step1"));
        fx.audit.fail_writes(true);

        let attempt = fx.service.assemble(&request(1)).await.unwrap();
        assert_eq!(attempt.questions.len(), 1);
        assert_eq!(fx.attempts.count(), 1);
        assert!(fx.audit.events().is_empty());
    }
}
