use std::sync::Arc;

use mongodb::{Client as MongoClient, Database};

use crate::config::Config;
use crate::stores::{mongo, AttemptStore, AuditSink, ProgressStore, QuestionCatalog};

/// Shared application state. Stores are trait objects so the core runs
/// against MongoDB in production and in-memory stores in tests.
pub struct AppState {
    pub config: Config,
    pub catalog: Arc<dyn QuestionCatalog>,
    pub progress: Arc<dyn ProgressStore>,
    pub attempts: Arc<dyn AttemptStore>,
    pub audit: Arc<dyn AuditSink>,
}

impl AppState {
    pub fn new(config: Config, mongo_client: MongoClient) -> Self {
        let mongo: Database = mongo_client.database(&config.mongo_database);
        Self {
            catalog: Arc::new(mongo::MongoQuestionCatalog::new(&mongo)),
            progress: Arc::new(mongo::MongoProgressStore::new(&mongo)),
            attempts: Arc::new(mongo::MongoAttemptStore::new(&mongo)),
            audit: Arc::new(mongo::MongoAuditSink::new(&mongo)),
            config,
        }
    }

    pub fn with_stores(
        config: Config,
        catalog: Arc<dyn QuestionCatalog>,
        progress: Arc<dyn ProgressStore>,
        attempts: Arc<dyn AttemptStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            config,
            catalog,
            progress,
            attempts,
            audit,
        }
    }
}

pub mod assembly_service;
pub mod attempt_service;
pub mod audit_service;
pub mod pool_service;
