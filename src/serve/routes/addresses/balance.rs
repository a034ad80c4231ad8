use axum::extract::Path;
use axum::http::StatusCode;
use axum::{Json, extract::State, response::IntoResponse};

use crate::serve::AppState;
use crate::serve::error::ServeError;
use crate::serve::reader_wrapper::{ServeReaderHelper, parse_address};
use crate::serve::types::ServeResponse;
use crate::sync::stages::index::indexers::core::addr_balance::{AddrBalance, AddrBalanceKV};

#[utoipa::path(
    tag = "Addresses",
    get,
    path = "/addresses/{address}/balance",
    params(
        ("address" = String, Path, description = "Hydra address or 40 hex character account"),
    ),
    responses(
        (status = 200, description = "Requested data", body = ServeResponse<AddrBalance>),
        (status = 400, description = "Malformed query parameters"),
        (status = 500, description = "Internal server error"),
    )
)]
/// Balance by Address
///
/// Returns the native value received, sent and held by the address. Addresses never seen
/// on-chain have an all-zero balance.
pub async fn addresses_balance(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ServeError> {
    let address = parse_address(state.codec(), &address)?;

    let (storage, indexer_info) = state.start_reader()?;

    let balance = storage.get_or_default::<AddrBalanceKV>(&address)?;

    let out = ServeResponse {
        data: balance,
        indexer_info,
    };

    Ok((StatusCode::OK, Json(out)))
}
