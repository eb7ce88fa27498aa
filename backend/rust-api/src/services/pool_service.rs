use std::collections::HashMap;
use std::sync::Arc;

use crate::error::CoreError;
use crate::metrics::POOLS_COMPUTED_TOTAL;
use crate::models::pool::{
    LastResult, PoolComputation, PoolFilters, QuestionClassification, QuestionProgress,
};
use crate::models::question::Question;
use crate::stores::{ProgressStore, QuestionCatalog};

/// Pool Calculator: read-only, stateless, safe to run concurrently for
/// any number of users and products.
pub struct PoolService {
    catalog: Arc<dyn QuestionCatalog>,
    progress: Arc<dyn ProgressStore>,
}

impl PoolService {
    pub fn new(catalog: Arc<dyn QuestionCatalog>, progress: Arc<dyn ProgressStore>) -> Self {
        Self { catalog, progress }
    }

    /// Computes the universe size and the eligible question ids for one
    /// user + product + filter combination. The universe ignores
    /// filters; eligibility applies all of them.
    pub async fn compute_eligible_pool(
        &self,
        user_id: &str,
        product_id: &str,
        filters: &PoolFilters,
    ) -> Result<PoolComputation, CoreError> {
        if user_id.is_empty() {
            return Err(CoreError::validation("user_id is required"));
        }
        if product_id.is_empty() {
            return Err(CoreError::validation("product_id is required"));
        }

        let published = self.catalog.published_by_product(product_id).await?;
        let progress = self.progress.progress_for_user(user_id, product_id).await?;

        // Product scoping is the strict source of truth: drop anything
        // the catalog returned under a mismatched product id.
        let in_product: Vec<&Question> = published
            .iter()
            .filter(|q| q.product_id == product_id)
            .collect();

        let universe_size = in_product.len() as u64;
        let eligible_ids: Vec<String> = in_product
            .iter()
            .filter(|q| matches_filters(q, filters, &progress))
            .map(|q| q.id.clone())
            .collect();

        POOLS_COMPUTED_TOTAL.inc();
        tracing::debug!(
            user_id,
            product_id,
            universe_size,
            eligible = eligible_ids.len(),
            "eligible pool computed"
        );

        Ok(PoolComputation {
            universe_size,
            eligible_ids,
        })
    }
}

fn matches_filters(
    question: &Question,
    filters: &PoolFilters,
    progress: &HashMap<String, QuestionProgress>,
) -> bool {
    if !filters.systems.is_empty() && !filters.systems.contains(&question.system) {
        return false;
    }
    if !filters.subjects.is_empty() && !filters.subjects.contains(&question.subject) {
        return false;
    }
    if filters.statuses.is_empty() {
        return true;
    }

    let record = progress.get(&question.id);
    filters.statuses.contains(&classify(record))
        || (filters.statuses.contains(&QuestionClassification::Marked)
            && record.is_some_and(|p| p.marked))
}

/// Derives a question's exclusive classification from progress. The
/// `marked` flag is handled separately since it overlaps all of these.
fn classify(record: Option<&QuestionProgress>) -> QuestionClassification {
    match record.and_then(|p| p.last_result) {
        None => QuestionClassification::Unused,
        Some(LastResult::Correct) => QuestionClassification::Correct,
        Some(LastResult::Incorrect) => QuestionClassification::Incorrect,
        Some(LastResult::Omitted) => QuestionClassification::Omitted,
    }
}
