use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Attempt lifecycle event for the governance/audit trail. Writes are
/// secondary bookkeeping: a failed insert never rolls back the primary
/// operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub attempt_id: String,
    pub user_id: String,
    pub product_id: String,
    pub event_type: AuditEventType,
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    AttemptAssembled,
    AttemptFinalized,
}
