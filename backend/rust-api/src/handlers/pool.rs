use axum::{extract::State, Json};
use std::sync::Arc;
use validator::Validate;

use crate::error::CoreError;
use crate::extractors::AppJson;
use crate::models::pool::{PoolRequest, PoolResponse};
use crate::services::{pool_service::PoolService, AppState};

pub async fn compute_pool(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<PoolRequest>,
) -> Result<Json<PoolResponse>, CoreError> {
    req.validate()
        .map_err(|e| CoreError::validation(e.to_string()))?;

    tracing::info!(
        user_id = %req.user_id,
        product_id = %req.product_id,
        "computing eligible pool"
    );

    let service = PoolService::new(state.catalog.clone(), state.progress.clone());
    let pool = service
        .compute_eligible_pool(&req.user_id, &req.product_id, &req.filters)
        .await?;

    Ok(Json(PoolResponse {
        universe_size: pool.universe_size,
        eligible_pool_size: pool.eligible_ids.len() as u64,
        eligible_ids: pool.eligible_ids,
    }))
}
