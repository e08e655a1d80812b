//! Scan API handlers
//!
//! POST /v1/scans/analyze, GET /v1/scans/{scan_id},
//! POST /v1/scans/{scan_id}/confirm
//!
//! The analyze handler never fails on upstream provider outages: the
//! pipeline degrades to deterministic fallbacks and the caller always gets
//! a well-formed identity and valuation.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use slabscan_common::types::{GradingCompany, ResolvedIdentity, ScanRecord, ScanStatus, Valuation};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// POST /v1/scans/analyze request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeScanRequest {
    pub image_base64: String,
    #[serde(default)]
    pub user_hints: Option<UserHints>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserHints {
    pub grading_company: Option<GradingCompany>,
}

/// POST /v1/scans/analyze response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeScanResponse {
    pub scan_id: Uuid,
    pub identity: ResolvedIdentity,
    pub valuation: Valuation,
    pub needs_user_confirmation: bool,
}

/// POST /v1/scans/{scan_id}/confirm response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmScanResponse {
    pub scan_id: Uuid,
    pub status: ScanStatus,
    pub valuation: Valuation,
}

/// POST /v1/scans/analyze
///
/// Analyze a scan image and persist the result.
pub async fn analyze_scan(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeScanRequest>,
) -> ApiResult<Json<AnalyzeScanResponse>> {
    if request.image_base64.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "imageBase64 must not be empty".to_string(),
        ));
    }

    let hint = request.user_hints.and_then(|hints| hints.grading_company);
    let outcome = state.analyzer.analyze(&request.image_base64, hint).await;

    let record = state
        .store
        .create(
            outcome.identity,
            outcome.valuation,
            outcome.needs_user_confirmation,
        )
        .await;

    tracing::info!(
        scan_id = %record.scan_id,
        card = %record.identity.card.name,
        fair_market_value = record.valuation.fair_market_value,
        needs_confirmation = record.needs_user_confirmation,
        "Scan analyzed"
    );

    Ok(Json(AnalyzeScanResponse {
        scan_id: record.scan_id,
        identity: record.identity,
        valuation: record.valuation,
        needs_user_confirmation: record.needs_user_confirmation,
    }))
}

/// GET /v1/scans/{scan_id}
pub async fn get_scan(
    State(state): State<AppState>,
    Path(scan_id): Path<Uuid>,
) -> ApiResult<Json<ScanRecord>> {
    state
        .store
        .get(scan_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Scan not found: {scan_id}")))
}

/// POST /v1/scans/{scan_id}/confirm
///
/// Idempotent: confirming an already-confirmed scan is not an error.
pub async fn confirm_scan(
    State(state): State<AppState>,
    Path(scan_id): Path<Uuid>,
) -> ApiResult<Json<ConfirmScanResponse>> {
    let record = state
        .store
        .confirm(scan_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Scan not found: {scan_id}")))?;

    tracing::info!(scan_id = %record.scan_id, "Scan confirmed");

    Ok(Json(ConfirmScanResponse {
        scan_id: record.scan_id,
        status: record.status,
        valuation: record.valuation,
    }))
}

/// Build scan routes
pub fn scan_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/scans/analyze", post(analyze_scan))
        .route("/v1/scans/:scan_id", get(get_scan))
        .route("/v1/scans/:scan_id/confirm", post(confirm_scan))
}
