use axum::extract::Path;
use axum::http::StatusCode;
use axum::{Json, extract::State, response::IntoResponse};

use crate::serve::AppState;
use crate::serve::error::ServeError;
use crate::serve::reader_wrapper::{ServeReaderHelper, parse_address};
use crate::serve::types::ServeResponse;
use crate::sync::stages::index::indexers::core::addr_contracts::{AddrContracts, AddrContractsKV};

#[utoipa::path(
    tag = "Addresses",
    get,
    path = "/addresses/{address}/contracts",
    params(
        ("address" = String, Path, description = "Hydra address or 40 hex character account"),
    ),
    responses(
        (status = 200, description = "Requested data", body = ServeResponse<AddrContracts>),
        (status = 400, description = "Malformed query parameters"),
        (status = 500, description = "Internal server error"),
    )
)]
/// Token Contracts by Address
///
/// Returns the HRC20 contracts the address has sent or received tokens through, in the order
/// they were first seen, with the number of transactions for each.
pub async fn addresses_contracts(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ServeError> {
    let address = parse_address(state.codec(), &address)?;

    let (storage, indexer_info) = state.start_reader()?;

    let contracts = storage.get_or_default::<AddrContractsKV>(&address)?;

    let out = ServeResponse {
        data: contracts,
        indexer_info,
    };

    Ok((StatusCode::OK, Json(out)))
}
