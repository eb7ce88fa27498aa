use std::sync::Arc;

use chrono::Utc;

use crate::error::CoreError;
use crate::metrics::{ATTEMPTS_ACTIVE, ATTEMPT_MUTATIONS_TOTAL};
use crate::models::attempt::{
    AttemptResult, AttemptStatus, BehaviorLogEntry, QuestionSnapshot, TestAttempt,
};
use crate::stores::{AttemptStore, AuditSink};

use super::audit_service::AuditService;

/// Attempt State Tracker: idempotent, narrowly-scoped mutations on a
/// live attempt plus the terminal finalize operation. Every mutation
/// re-checks the state machine against the stored attempt first; a
/// finished attempt rejects all of them with `AttemptFinalized`.
pub struct AttemptService {
    attempts: Arc<dyn AttemptStore>,
    audit: Arc<dyn AuditSink>,
}

impl AttemptService {
    pub fn new(attempts: Arc<dyn AttemptStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { attempts, audit }
    }

    pub async fn get(&self, attempt_id: &str) -> Result<TestAttempt, CoreError> {
        self.attempts
            .get(attempt_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("attempt {attempt_id}")))
    }

    async fn load_open(&self, attempt_id: &str) -> Result<TestAttempt, CoreError> {
        let attempt = self.get(attempt_id).await?;
        if attempt.status == AttemptStatus::Finished {
            return Err(CoreError::AttemptFinalized);
        }
        Ok(attempt)
    }

    /// Sets or overwrites the answer for one question, last write wins,
    /// and adds `seconds_delta` to the running time counter.
    pub async fn record_answer(
        &self,
        attempt_id: &str,
        question_id: &str,
        selected_choice: &str,
        seconds_delta: i64,
    ) -> Result<(), CoreError> {
        let attempt = self.load_open(attempt_id).await?;
        let snapshot = find_question(&attempt, question_id)?;
        if !snapshot
            .choices
            .iter()
            .any(|c| c.label == selected_choice)
        {
            return Err(CoreError::validation(format!(
                "choice {selected_choice} is not an option for question {question_id}"
            )));
        }

        self.attempts
            .set_answer(attempt_id, question_id, selected_choice, seconds_delta)
            .await?;
        ATTEMPT_MUTATIONS_TOTAL.with_label_values(&["answer"]).inc();

        self.append_log_swallowed(
            attempt_id,
            BehaviorLogEntry {
                question_id: Some(question_id.to_string()),
                action: "answer_selected".to_string(),
                detail: Some(selected_choice.to_string()),
                offset_seconds: attempt.seconds_elapsed + seconds_delta,
                recorded_at: Utc::now(),
            },
        )
        .await;

        Ok(())
    }

    /// Sets or clears the review flag, independent of answer state.
    pub async fn record_flag(
        &self,
        attempt_id: &str,
        question_id: &str,
        flagged: bool,
    ) -> Result<(), CoreError> {
        let attempt = self.load_open(attempt_id).await?;
        find_question(&attempt, question_id)?;

        self.attempts
            .set_flag(attempt_id, question_id, flagged)
            .await?;
        ATTEMPT_MUTATIONS_TOTAL.with_label_values(&["flag"]).inc();

        self.append_log_swallowed(
            attempt_id,
            BehaviorLogEntry {
                question_id: Some(question_id.to_string()),
                action: "flag_toggled".to_string(),
                detail: Some(flagged.to_string()),
                offset_seconds: attempt.seconds_elapsed,
                recorded_at: Utc::now(),
            },
        )
        .await;

        Ok(())
    }

    /// Appends an event to the forensic log. Never overwrites prior
    /// entries; ordering is insertion order.
    pub async fn append_behavior_log(
        &self,
        attempt_id: &str,
        entry: BehaviorLogEntry,
    ) -> Result<(), CoreError> {
        self.load_open(attempt_id).await?;
        self.attempts.append_log(attempt_id, &entry).await?;
        ATTEMPT_MUTATIONS_TOTAL.with_label_values(&["log"]).inc();
        Ok(())
    }

    /// Saves an absolute session snapshot (position + elapsed time) and
    /// optionally suspends or resumes the attempt.
    pub async fn save_session_state(
        &self,
        attempt_id: &str,
        current_index: u32,
        seconds_elapsed: i64,
        suspend: bool,
    ) -> Result<AttemptStatus, CoreError> {
        let attempt = self.load_open(attempt_id).await?;
        if current_index as usize > attempt.questions.len() {
            return Err(CoreError::validation(format!(
                "current_index {current_index} is out of range for {} questions",
                attempt.questions.len()
            )));
        }
        if seconds_elapsed < 0 {
            return Err(CoreError::validation("seconds_elapsed must not be negative"));
        }

        let status = if suspend {
            AttemptStatus::Suspended
        } else {
            AttemptStatus::Active
        };
        self.attempts
            .save_session_state(attempt_id, current_index, seconds_elapsed, status)
            .await?;
        ATTEMPT_MUTATIONS_TOTAL
            .with_label_values(&["snapshot"])
            .inc();

        self.append_log_swallowed(
            attempt_id,
            BehaviorLogEntry {
                question_id: None,
                action: "session_saved".to_string(),
                detail: Some(format!("index {current_index}, suspend {suspend}")),
                offset_seconds: seconds_elapsed,
                recorded_at: Utc::now(),
            },
        )
        .await;

        Ok(status)
    }

    /// Grades the snapshot and marks the attempt finished. Terminal: a
    /// second finalize, like any later mutation, fails with
    /// `AttemptFinalized`.
    pub async fn finalize(&self, attempt_id: &str) -> Result<TestAttempt, CoreError> {
        let attempt = self.load_open(attempt_id).await?;

        let result = grade(&attempt.questions);
        let finished_at = Utc::now();
        self.attempts
            .finish(attempt_id, &result, finished_at)
            .await?;
        ATTEMPTS_ACTIVE.dec();

        let mut finished = attempt;
        finished.status = AttemptStatus::Finished;
        finished.finished_at = Some(finished_at);
        finished.result = Some(result);

        AuditService::new(self.audit.clone())
            .attempt_finalized(&finished)
            .await;

        tracing::info!(attempt_id, "attempt finalized");
        Ok(finished)
    }

    async fn append_log_swallowed(&self, attempt_id: &str, entry: BehaviorLogEntry) {
        if let Err(e) = self.attempts.append_log(attempt_id, &entry).await {
            tracing::warn!(
                attempt_id,
                error = %e,
                "behavior log append failed, primary write already committed"
            );
        }
    }
}

fn find_question<'a>(
    attempt: &'a TestAttempt,
    question_id: &str,
) -> Result<&'a QuestionSnapshot, CoreError> {
    attempt
        .questions
        .iter()
        .find(|q| q.question_id == question_id)
        .ok_or_else(|| {
            CoreError::not_found(format!("question {question_id} in attempt {}", attempt.id))
        })
}

fn grade(questions: &[QuestionSnapshot]) -> AttemptResult {
    let mut correct_count = 0;
    let mut incorrect_count = 0;
    let mut omitted_count = 0;
    for question in questions {
        match &question.chosen_answer {
            Some(answer) if *answer == question.correct_choice => correct_count += 1,
            Some(_) => incorrect_count += 1,
            None => omitted_count += 1,
        }
    }

    let total = questions.len() as f64;
    let percentage = if total > 0.0 {
        correct_count as f64 / total * 100.0
    } else {
        0.0
    };

    AttemptResult {
        correct_count,
        incorrect_count,
        omitted_count,
        percentage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::Choice;
    use crate::stores::memory::{MemoryAttemptStore, MemoryAuditSink};
    use crate::stores::AttemptStore as _;

    fn snapshot(question_id: &str) -> QuestionSnapshot {
        QuestionSnapshot {
            question_id: question_id.to_string(),
            stem: format!("Stem for {question_id}"),
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
            explanation: None,
            system: "cardio".to_string(),
            subject: "medicine".to_string(),
            chosen_answer: None,
            flagged: false,
        }
    }

    fn attempt(id: &str, question_ids: &[&str]) -> TestAttempt {
        TestAttempt {
            id: id.to_string(),
            user_id: "u1".to_string(),
            product_id: "step1".to_string(),
            universe_size: question_ids.len() as u64,
            eligible_pool_size: question_ids.len() as u64,
            status: AttemptStatus::Active,
            questions: question_ids.iter().map(|q| snapshot(q)).collect(),
            behavior_log: Vec::new(),
            seconds_elapsed: 0,
            current_index: 0,
            created_at: Utc::now(),
            finished_at: None,
            result: None,
        }
    }

    struct Fixture {
        attempts: Arc<MemoryAttemptStore>,
        audit: Arc<MemoryAuditSink>,
        service: AttemptService,
    }

    async fn fixture(seed: TestAttempt) -> Fixture {
        let attempts = Arc::new(MemoryAttemptStore::default());
        let audit = Arc::new(MemoryAuditSink::default());
        attempts.create(&seed).await.unwrap();
        let service = AttemptService::new(attempts.clone(), audit.clone());
        Fixture {
            attempts,
            audit,
            service,
        }
    }

    #[tokio::test]
    async fn answer_last_write_wins_and_log_keeps_both() {
        let fx = fixture(attempt("a1", &["q1", "q2"])).await;

        fx.service.record_answer("a1", "q1", "A", 10).await.unwrap();
        fx.service.record_answer("a1", "q1", "B", 5).await.unwrap();

        let stored = fx.attempts.get("a1").await.unwrap().unwrap();
        assert_eq!(
            stored.questions[0].chosen_answer.as_deref(),
            Some("B")
        );
        assert_eq!(stored.seconds_elapsed, 15);

        let log: Vec<_> = stored
            .behavior_log
            .iter()
            .map(|e| (e.action.as_str(), e.detail.as_deref()))
            .collect();
        assert_eq!(
            log,
            vec![
                ("answer_selected", Some("A")),
                ("answer_selected", Some("B")),
            ]
        );
    }

    #[tokio::test]
    async fn flag_is_independent_of_answer_state() {
        let fx = fixture(attempt("a1", &["q1"])).await;

        fx.service.record_flag("a1", "q1", true).await.unwrap();
        let stored = fx.attempts.get("a1").await.unwrap().unwrap();
        assert!(stored.questions[0].flagged);
        assert_eq!(stored.questions[0].chosen_answer, None);

        fx.service.record_flag("a1", "q1", false).await.unwrap();
        let stored = fx.attempts.get("a1").await.unwrap().unwrap();
        assert!(!stored.questions[0].flagged);
    }

    #[tokio::test]
    async fn answer_for_unknown_question_is_not_found() {
        let fx = fixture(attempt("a1", &["q1"])).await;
        let err = fx
            .service
            .record_answer("a1", "q9", "A", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn answer_with_unknown_choice_is_rejected() {
        let fx = fixture(attempt("a1", &["q1"])).await;
        let err = fx
            .service
            .record_answer("a1", "q1", "Z", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn unknown_attempt_is_not_found() {
        let fx = fixture(attempt("a1", &["q1"])).await;
        let err = fx
            .service
            .record_answer("missing", "q1", "A", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn session_snapshot_suspends_and_resumes() {
        let fx = fixture(attempt("a1", &["q1", "q2"])).await;

        let status = fx
            .service
            .save_session_state("a1", 1, 120, true)
            .await
            .unwrap();
        assert_eq!(status, AttemptStatus::Suspended);

        let stored = fx.attempts.get("a1").await.unwrap().unwrap();
        assert_eq!(stored.status, AttemptStatus::Suspended);
        assert_eq!(stored.current_index, 1);
        assert_eq!(stored.seconds_elapsed, 120);

        // Mutations while suspended are allowed; the student reopened
        // the test from the resume screen.
        fx.service.record_answer("a1", "q2", "A", 30).await.unwrap();

        let status = fx
            .service
            .save_session_state("a1", 2, 150, false)
            .await
            .unwrap();
        assert_eq!(status, AttemptStatus::Active);
    }

    #[tokio::test]
    async fn session_snapshot_rejects_out_of_range_index() {
        let fx = fixture(attempt("a1", &["q1"])).await;
        let err = fx
            .service
            .save_session_state("a1", 5, 0, false)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn finalize_grades_the_snapshot() {
        let fx = fixture(attempt("a1", &["q1", "q2", "q3", "q4"])).await;
        fx.service.record_answer("a1", "q1", "A", 0).await.unwrap();
        fx.service.record_answer("a1", "q2", "A", 0).await.unwrap();
        fx.service.record_answer("a1", "q3", "B", 0).await.unwrap();
        // q4 left omitted

        let finished = fx.service.finalize("a1").await.unwrap();
        let result = finished.result.unwrap();
        assert_eq!(result.correct_count, 2);
        assert_eq!(result.incorrect_count, 1);
        assert_eq!(result.omitted_count, 1);
        assert_eq!(result.percentage, 50.0);
        assert_eq!(finished.status, AttemptStatus::Finished);
        assert!(finished.finished_at.is_some());

        let events = fx.audit.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].attempt_id, "a1");
    }

    #[tokio::test]
    async fn finalize_is_terminal_for_all_mutations() {
        let fx = fixture(attempt("a1", &["q1"])).await;
        fx.service.record_answer("a1", "q1", "A", 0).await.unwrap();
        fx.service.finalize("a1").await.unwrap();

        let before = fx.attempts.get("a1").await.unwrap().unwrap();

        let err = fx
            .service
            .record_answer("a1", "q1", "B", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::AttemptFinalized));

        let err = fx.service.record_flag("a1", "q1", true).await.unwrap_err();
        assert!(matches!(err, CoreError::AttemptFinalized));

        let err = fx
            .service
            .append_behavior_log(
                "a1",
                BehaviorLogEntry {
                    question_id: None,
                    action: "late_event".to_string(),
                    detail: None,
                    offset_seconds: 0,
                    recorded_at: Utc::now(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::AttemptFinalized));

        let err = fx
            .service
            .save_session_state("a1", 0, 0, true)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::AttemptFinalized));

        let err = fx.service.finalize("a1").await.unwrap_err();
        assert!(matches!(err, CoreError::AttemptFinalized));

        // state untouched by the rejected mutations
        let after = fx.attempts.get("a1").await.unwrap().unwrap();
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn behavior_log_append_failure_keeps_the_answer() {
        let fx = fixture(attempt("a1", &["q1"])).await;
        fx.attempts.fail_log_appends(true);

        fx.service.record_answer("a1", "q1", "B", 7).await.unwrap();

        let stored = fx.attempts.get("a1").await.unwrap().unwrap();
        assert_eq!(stored.questions[0].chosen_answer.as_deref(), Some("B"));
        assert_eq!(stored.seconds_elapsed, 7);
        assert!(stored.behavior_log.is_empty());
    }

    #[tokio::test]
    async fn explicit_log_append_failure_is_surfaced() {
        let fx = fixture(attempt("a1", &["q1"])).await;
        fx.attempts.fail_log_appends(true);

        let err = fx
            .service
            .append_behavior_log(
                "a1",
                BehaviorLogEntry {
                    question_id: Some("q1".to_string()),
                    action: "option_viewed".to_string(),
                    detail: None,
                    offset_seconds: 3,
                    recorded_at: Utc::now(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Storage(_)));
    }
}
