use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::{Json, extract::State, response::IntoResponse};

use crate::serve::AppState;
use crate::serve::error::ServeError;
use crate::serve::reader_wrapper::parse_address;
use crate::serve::types::{AddressTx, PaginationParam, ServeResponse};
use crate::storage::table::Table;
use crate::sync::stages::index::indexers::core::addr_txs::AddrTxsKV;

const DEFAULT_COUNT: usize = 100;
const MAX_COUNT: usize = 1000;

#[utoipa::path(
    tag = "Addresses",
    get,
    path = "/addresses/{address}/txs",
    params(
        ("address" = String, Path, description = "Hydra address or 40 hex character account"),
        PaginationParam,
    ),
    responses(
        (status = 200, description = "Requested data", body = ServeResponse<Vec<AddressTx>>),
        (status = 400, description = "Malformed query parameters"),
        (status = 500, description = "Internal server error"),
    )
)]
/// Transactions by Address
///
/// Returns the transactions the address takes part in, most recent first.
pub async fn addresses_txs(
    State(state): State<AppState>,
    Query(params): Query<PaginationParam>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ServeError> {
    let count = params.count.unwrap_or(DEFAULT_COUNT);

    if count == 0 || count > MAX_COUNT {
        return Err(ServeError::malformed_request(format!(
            "count must be between 1 and {MAX_COUNT}"
        )));
    }

    let address = parse_address(state.codec(), &address)?;

    let (storage, indexer_info) = state.start_reader()?;

    let range = AddrTxsKV::prefix_range(&address);

    let txs = storage
        .iter_kvs::<AddrTxsKV>(range, true)?
        .take(count)
        .map(|kv| {
            kv.map(|(key, indexes)| AddressTx {
                tx_hash: hex::encode(key.tx_hash),
                height: key.height,
                indexes,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let out = ServeResponse {
        data: txs,
        indexer_info,
    };

    Ok((StatusCode::OK, Json(out)))
}
