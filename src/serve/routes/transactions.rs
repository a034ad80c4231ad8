use axum::extract::Path;
use chrono::{DateTime, Utc};
use axum::http::StatusCode;
use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use tracing::warn;

use crate::chain::hrc20::extract_transfers;
use crate::serve::AppState;
use crate::serve::error::ServeError;
use crate::serve::types::{ServeResponse, TokenTransferView, TransactionWithTransfers};
use crate::storage::encdec::decode_hex_fixed;
use crate::sync::stages::index::indexers::core::transactions::TransactionsKV;

#[utoipa::path(
    tag = "Transactions",
    get,
    path = "/transactions/{txid}",
    params(
        ("txid" = String, Path, description = "Transaction id"),
    ),
    responses(
        (status = 200, description = "Requested data", body = ServeResponse<TransactionWithTransfers>),
        (status = 400, description = "Malformed query parameters"),
        (status = 404, description = "Transaction not indexed"),
        (status = 500, description = "Internal server error"),
    )
)]
/// Transaction by Id
///
/// Returns an indexed transaction with its receipt and the HRC20 token transfers decoded from
/// the receipt logs.
pub async fn transactions_by_txid(
    State(state): State<AppState>,
    Path(txid): Path<String>,
) -> Result<impl IntoResponse, ServeError> {
    let tx_hash = decode_hex_fixed(|| "txid".into(), &txid).map_err(ServeError::malformed_request)?;

    let (storage, indexer_info) = state.start_reader()?;

    let (tx, height) = TransactionsKV::find(&storage, &tx_hash)?.ok_or(ServeError::NotFound)?;

    let logs = tx.receipt.as_ref().map(|r| r.logs.as_slice()).unwrap_or_default();

    let (token_transfers, token_transfers_error) = match extract_transfers(logs, state.codec()) {
        Ok(transfers) => (
            transfers
                .into_iter()
                .map(|t| TokenTransferView {
                    contract: hex::encode(t.contract),
                    from: t.from,
                    to: t.to,
                    amount: t.amount.to_string(),
                })
                .collect(),
            None,
        ),
        Err(e) => {
            warn!(txid = %txid, "unable to decode token transfers: {e}");
            (vec![], Some(e.to_string()))
        }
    };

    let block_timestamp = i64::try_from(tx.block_time)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|time| time.to_rfc3339());

    let out = ServeResponse {
        data: TransactionWithTransfers {
            height,
            block_timestamp,
            tx,
            token_transfers,
            token_transfers_error,
        },
        indexer_info,
    };

    Ok((StatusCode::OK, Json(out)))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/{txid}", get(transactions_by_txid))
}
