pub mod attempt;
pub mod audit_log;
pub mod pool;
pub mod question;

pub use attempt::{
    AssembleTestRequest, AttemptMutation, AttemptResult, AttemptStatus, AttemptTransition,
    BehaviorLogEntry, QuestionSnapshot, TestAttempt,
};
pub use pool::{
    LastResult, PoolComputation, PoolFilters, PoolRequest, PoolResponse, QuestionClassification,
    QuestionProgress,
};
pub use question::{Choice, Question, QuestionStatus};
