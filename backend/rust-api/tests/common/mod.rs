use std::sync::Arc;

use axum::Router;
use qbank_api::models::question::{Choice, Question, QuestionStatus};
use qbank_api::stores::memory::{
    MemoryAttemptStore, MemoryAuditSink, MemoryProgressStore, MemoryQuestionCatalog,
};
use qbank_api::{config::Config, create_router, services::AppState};

/// Router plus handles to the in-memory stores behind it, so tests can
/// seed the catalog and inspect persisted attempts directly.
pub struct TestApp {
    pub router: Router,
    pub catalog: Arc<MemoryQuestionCatalog>,
    pub progress: Arc<MemoryProgressStore>,
    pub attempts: Arc<MemoryAttemptStore>,
    pub audit: Arc<MemoryAuditSink>,
}

pub fn create_test_app() -> TestApp {
    // Initialize tracing for tests
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let catalog = Arc::new(MemoryQuestionCatalog::default());
    let progress = Arc::new(MemoryProgressStore::default());
    let attempts = Arc::new(MemoryAttemptStore::default());
    let audit = Arc::new(MemoryAuditSink::default());

    let app_state = Arc::new(AppState::with_stores(
        Config::default(),
        catalog.clone(),
        progress.clone(),
        attempts.clone(),
        audit.clone(),
    ));

    TestApp {
        router: create_router(app_state),
        catalog,
        progress,
        attempts,
        audit,
    }
}

/// Seeds `count` published questions q0..qN into one product, systems
/// alternating between cardio and renal.
pub fn seed_questions(catalog: &MemoryQuestionCatalog, product_id: &str, count: usize) {
    for i in 0..count {
        let system = if i % 2 == 0 { "cardio" } else { "renal" };
        catalog.insert(Question {
            id: format!("q{i}"),
            product_id: product_id.to_string(),
            stem: format!("Stem for question {i}"),
            choices: vec![
                Choice {
                    label: "A".to_string(),
                    text: "Alpha".to_string(),
                },
                Choice {
                    label: "B".to_string(),
                    text: "Beta".to_string(),
                },
                Choice {
                    label: "C".to_string(),
                    text: "Gamma".to_string(),
                },
            ],
            correct_choice: "A".to_string(),
            explanation: Some(format!("Explanation for question {i}")),
            system: system.to_string(),
            subject: "medicine".to_string(),
            topic: None,
            status: QuestionStatus::Published,
        });
    }
}
