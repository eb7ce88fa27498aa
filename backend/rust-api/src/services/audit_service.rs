use std::sync::Arc;

use chrono::Utc;

use crate::models::attempt::TestAttempt;
use crate::models::audit_log::{AuditEvent, AuditEventType};
use crate::stores::AuditSink;

/// Writes attempt lifecycle events to the audit trail. These writes
/// are secondary bookkeeping: failures are logged and swallowed so the
/// primary operation's success is never rolled back.
pub struct AuditService {
    sink: Arc<dyn AuditSink>,
}

impl AuditService {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    pub async fn attempt_assembled(&self, attempt: &TestAttempt) {
        let detail = format!(
            "{} questions selected from eligible pool of {}",
            attempt.questions.len(),
            attempt.eligible_pool_size
        );
        self.record(attempt, AuditEventType::AttemptAssembled, Some(detail))
            .await;
    }

    pub async fn attempt_finalized(&self, attempt: &TestAttempt) {
        let detail = attempt
            .result
            .as_ref()
            .map(|r| format!("{} of {} correct", r.correct_count, attempt.questions.len()));
        self.record(attempt, AuditEventType::AttemptFinalized, detail)
            .await;
    }

    async fn record(
        &self,
        attempt: &TestAttempt,
        event_type: AuditEventType,
        detail: Option<String>,
    ) {
        let event = AuditEvent {
            attempt_id: attempt.id.clone(),
            user_id: attempt.user_id.clone(),
            product_id: attempt.product_id.clone(),
            event_type,
            detail,
            created_at: Utc::now(),
        };

        if let Err(e) = self.sink.record(&event).await {
            tracing::warn!(
                attempt_id = %attempt.id,
                error = %e,
                "audit event write failed, primary operation already committed"
            );
        }
    }
}
