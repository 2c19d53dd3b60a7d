//! Analysis route handlers

use crate::analysis::types::AnalysisReport;
use crate::auth::Claims;
use crate::error::{ApiResult, AppError};
use crate::state::{AppState, SharedState};
use crate::storage::{with_deadline, MetricsRecord, StorageError};
use crate::telemetry::{self, ErrorLabel};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct AnalyzeRequest {
    pub old_schema: Value,
    pub new_schema: Value,
    #[serde(default)]
    pub queries: Option<Vec<String>>,
    #[serde(default)]
    #[validate(length(min = 1, max = 255, message = "session_id must be 1 to 255 characters"))]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub session_id: String,
    pub result: AnalysisReport,
}

/// POST /analyze
///
/// Runs the full analysis and stores the report under the session id. Storage
/// failures are logged and counted but never fail the request.
pub async fn analyze(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<AnalyzeRequest>,
) -> ApiResult<Json<AnalyzeResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let session_id = payload
        .session_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    info!(session_id = %session_id, user = %claims.sub, "Analysis requested");

    let started = Instant::now();
    let report = telemetry::instrument_analysis(|| {
        state.analyzer.analyze(
            &payload.old_schema,
            &payload.new_schema,
            payload.queries.as_deref(),
        )
    })?;
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    persist(&state, &session_id, &report, duration_ms).await;

    Ok(Json(AnalyzeResponse {
        success: true,
        session_id,
        result: report,
    }))
}

/// GET /results/{session_id}
pub async fn get_result(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<AnalysisReport>> {
    let lookup = state.storage.retrieve_result(&session_id);
    let report = match with_deadline(state.storage_timeout, lookup).await {
        Ok(report) => {
            telemetry::record_storage_operation("retrieve_result");
            report
        }
        Err(e) => {
            telemetry::record_storage_error(e.error_label());
            return Err(e.into());
        }
    };

    report
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No analysis result for session: {}", session_id)))
}

/// Store the report and its metrics record within the storage budget
async fn persist(state: &AppState, session_id: &str, report: &AnalysisReport, duration_ms: u64) {
    let record = MetricsRecord::from_report(session_id, report, duration_ms);

    let writes = async {
        match state.storage.store_result(session_id, report).await {
            Ok(()) => telemetry::record_storage_operation("store_result"),
            Err(e) => {
                telemetry::record_storage_error(e.error_label());
                warn!(session_id, "Failed to store analysis result: {}", e);
            }
        }

        match state.storage.store_metrics(&record).await {
            Ok(()) => telemetry::record_storage_operation("store_metrics"),
            Err(e) => {
                telemetry::record_storage_error(e.error_label());
                warn!(session_id, "Failed to store analysis metrics: {}", e);
            }
        }
        Ok::<(), StorageError>(())
    };

    if let Err(e) = with_deadline(state.storage_timeout, writes).await {
        telemetry::record_storage_error(e.error_label());
        warn!(session_id, "Abandoned storing analysis output: {}", e);
    }
}
