use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::error::CoreError;
use crate::extractors::AppJson;
use crate::models::attempt::{
    AssembleTestRequest, AttemptMutation, AttemptTransition, BehaviorLogEntry, TestAttempt,
};
use crate::services::{
    assembly_service::AssemblyService, attempt_service::AttemptService, AppState,
};

pub async fn assemble_test(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<AssembleTestRequest>,
) -> Result<impl IntoResponse, CoreError> {
    req.validate()
        .map_err(|e| CoreError::validation(e.to_string()))?;

    tracing::info!(
        user_id = %req.user_id,
        product_id = %req.product_id,
        count = req.count,
        "assembling test attempt"
    );

    let service = AssemblyService::new(
        state.catalog.clone(),
        state.progress.clone(),
        state.attempts.clone(),
        state.audit.clone(),
    );
    let attempt = service.assemble(&req).await?;

    Ok((StatusCode::CREATED, Json(attempt)))
}

pub async fn get_attempt(
    State(state): State<Arc<AppState>>,
    Path(attempt_id): Path<String>,
) -> Result<Json<TestAttempt>, CoreError> {
    let service = AttemptService::new(state.attempts.clone(), state.audit.clone());
    let attempt = service.get(&attempt_id).await?;
    Ok(Json(attempt))
}

pub async fn mutate_attempt(
    State(state): State<Arc<AppState>>,
    Path(attempt_id): Path<String>,
    AppJson(mutation): AppJson<AttemptMutation>,
) -> Result<impl IntoResponse, CoreError> {
    let service = AttemptService::new(state.attempts.clone(), state.audit.clone());

    match mutation {
        AttemptMutation::Answer {
            question_id,
            selected_choice,
            seconds_delta,
        } => {
            service
                .record_answer(&attempt_id, &question_id, &selected_choice, seconds_delta)
                .await?;
        }
        AttemptMutation::Flag {
            question_id,
            flagged,
        } => {
            service
                .record_flag(&attempt_id, &question_id, flagged)
                .await?;
        }
        AttemptMutation::Log {
            question_id,
            action,
            detail,
            offset_seconds,
        } => {
            if action.is_empty() {
                return Err(CoreError::validation("action is required"));
            }
            service
                .append_behavior_log(
                    &attempt_id,
                    BehaviorLogEntry {
                        question_id,
                        action,
                        detail,
                        offset_seconds,
                        recorded_at: Utc::now(),
                    },
                )
                .await?;
        }
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn transition_attempt(
    State(state): State<Arc<AppState>>,
    Path(attempt_id): Path<String>,
    AppJson(transition): AppJson<AttemptTransition>,
) -> Result<Response, CoreError> {
    let service = AttemptService::new(state.attempts.clone(), state.audit.clone());

    match transition {
        AttemptTransition::Snapshot {
            current_index,
            seconds_elapsed,
            suspend,
        } => {
            let status = service
                .save_session_state(&attempt_id, current_index, seconds_elapsed, suspend)
                .await?;
            Ok(Json(json!({ "status": status })).into_response())
        }
        AttemptTransition::Finish => {
            let attempt = service.finalize(&attempt_id).await?;
            Ok(Json(attempt).into_response())
        }
    }
}
