//! HTTP handlers for inter-store transfers

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use shared::Role;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::services::transfer::{
    CreateTransferInput, InventoryTransfer, RejectTransferInput, TransferCompletion, TransferQuery,
    TransferService,
};
use crate::AppState;

/// Request a transfer
pub async fn create_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateTransferInput>,
) -> AppResult<impl IntoResponse> {
    let service = TransferService::new(state.db);
    let transfer = service
        .create_transfer(current_user.0.company_id, current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(transfer)))
}

/// List transfers
pub async fn list_transfers(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<TransferQuery>,
) -> AppResult<Json<Vec<InventoryTransfer>>> {
    let service = TransferService::new(state.db);
    let transfers = service
        .list_transfers(current_user.0.company_id, query)
        .await?;
    Ok(Json(transfers))
}

/// Get a transfer
pub async fn get_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(transfer_id): Path<Uuid>,
) -> AppResult<Json<InventoryTransfer>> {
    let service = TransferService::new(state.db);
    let transfer = service
        .get_transfer(current_user.0.company_id, transfer_id)
        .await?;
    Ok(Json(transfer))
}

/// Approve a pending transfer (managers only)
pub async fn approve_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(transfer_id): Path<Uuid>,
) -> AppResult<Json<InventoryTransfer>> {
    current_user.0.require_role(Role::Manager)?;

    let service = TransferService::new(state.db);
    let transfer = service
        .approve_transfer(current_user.0.company_id, current_user.0.user_id, transfer_id)
        .await?;
    Ok(Json(transfer))
}

/// Reject a pending transfer (managers only)
pub async fn reject_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(transfer_id): Path<Uuid>,
    body: Bytes,
) -> AppResult<Json<InventoryTransfer>> {
    current_user.0.require_role(Role::Manager)?;

    let input = parse_reject_body(&body)?;
    let service = TransferService::new(state.db);
    let transfer = service
        .reject_transfer(
            current_user.0.company_id,
            current_user.0.user_id,
            transfer_id,
            input,
        )
        .await?;
    Ok(Json(transfer))
}

/// Complete an approved transfer
pub async fn complete_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(transfer_id): Path<Uuid>,
) -> AppResult<Json<TransferCompletion>> {
    let service = TransferService::new(state.db);
    let completion = service
        .complete_transfer(current_user.0.company_id, current_user.0.user_id, transfer_id)
        .await?;
    Ok(Json(completion))
}

/// The rejection body is optional; a present but malformed one is refused
fn parse_reject_body(body: &[u8]) -> AppResult<RejectTransferInput> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RejectTransferInput::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::validation("body", format!("Invalid JSON body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_reject_body_has_no_reason() {
        assert!(parse_reject_body(b"").unwrap().reason.is_none());
        assert!(parse_reject_body(b"  \n").unwrap().reason.is_none());
    }

    #[test]
    fn test_reject_reason_accepts_both_field_names() {
        let input = parse_reject_body(br#"{"reason": "Damaged"}"#).unwrap();
        assert_eq!(input.reason.as_deref(), Some("Damaged"));

        let input = parse_reject_body(br#"{"rejection_reason": "Not needed"}"#).unwrap();
        assert_eq!(input.reason.as_deref(), Some("Not needed"));
    }

    #[test]
    fn test_malformed_reject_body_is_refused() {
        assert!(matches!(
            parse_reject_body(br#"{"reason": "#),
            Err(AppError::Validation { .. })
        ));
    }
}
