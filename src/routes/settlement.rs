use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::engine::SettleError;
use crate::state::AppState;
use crate::types::{SettlementRecord, StatusProjection};

#[derive(Serialize)]
pub struct SettleResponse {
    pub settled: bool,
}

#[derive(Serialize)]
pub struct SettlementView {
    #[serde(flatten)]
    pub record: SettlementRecord,
    pub hash: String,
}

pub async fn market_status(
    State(state): State<AppState>,
    Path(market_id): Path<u64>,
) -> Result<Json<StatusProjection>, (StatusCode, String)> {
    state
        .engine
        .status(market_id)
        .await
        .map(Json)
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))
}

pub async fn manual_settle(
    State(state): State<AppState>,
    Path(market_id): Path<u64>,
) -> Result<Json<SettleResponse>, (StatusCode, String)> {
    match state.engine.manual_settle(market_id).await {
        Ok(settled) => Ok(Json(SettleResponse { settled })),
        Err(e) => Err((status_for(&e), e.to_string())),
    }
}

pub async fn get_settlement(
    State(state): State<AppState>,
    Path(market_id): Path<u64>,
) -> Result<Json<SettlementView>, (StatusCode, String)> {
    let record = state
        .store
        .find_by_market(market_id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or((StatusCode::NOT_FOUND, "No settlement for market".to_string()))?;

    let hash = settlement_hash(&record);

    Ok(Json(SettlementView { record, hash }))
}

pub async fn participant_settlements(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<Vec<SettlementRecord>>, (StatusCode, String)> {
    state
        .store
        .find_by_participant(&address)
        .await
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

fn status_for(err: &SettleError) -> StatusCode {
    match err {
        SettleError::AlreadyRecorded(_) => StatusCode::CONFLICT,
        SettleError::Store(_) | SettleError::AuditGap { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_GATEWAY,
    }
}

/// Tamper-evidence fingerprint over the canonical record fields, returned
/// with the settlement view.
fn settlement_hash(record: &SettlementRecord) -> String {
    let mut hasher = Sha256::new();

    hasher.update(record.market_id.to_be_bytes());
    hasher.update(record.winner_side.as_str().as_bytes());
    hasher.update(record.total_staked.as_bytes());
    hasher.update(record.creator_reward.as_bytes());
    hasher.update(record.voter_reward_pool.as_bytes());
    hasher.update(record.tx_hash.as_bytes());
    hasher.update(record.settled_at.to_rfc3339().as_bytes());

    hex::encode(hasher.finalize())
}
