use axum::extract::Path;
use axum::http::StatusCode;
use axum::{Json, extract::State, response::IntoResponse};

use crate::serve::AppState;
use crate::serve::error::ServeError;
use crate::serve::reader_wrapper::parse_address;
use crate::serve::types::{AddressUtxo, ServeResponse};
use crate::storage::table::Table;
use crate::sync::stages::index::indexers::core::utxos_by_address::UtxosByAddressKV;

#[utoipa::path(
    tag = "Addresses",
    get,
    path = "/addresses/{address}/utxos",
    params(
        ("address" = String, Path, description = "Hydra address", example="HJ8ZJeuJ5pm2vh6nbXwvJT3VHXkCRp4HPS"),
    ),
    responses(
        (status = 200, description = "Requested data", body = ServeResponse<Vec<AddressUtxo>>),
        (status = 400, description = "Malformed query parameters"),
        (status = 500, description = "Internal server error"),
    )
)]
/// UTxOs by Address
///
/// Returns the unspent outputs controlled by the provided address.
pub async fn addresses_utxos(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ServeError> {
    let address = parse_address(state.codec(), &address)?;

    let (storage, indexer_info) = state.start_reader()?;

    let range = UtxosByAddressKV::prefix_range(&address);

    let mut utxos = Vec::new();

    for kv in storage.iter_kvs::<UtxosByAddressKV>(range, false)? {
        let (key, entry) = kv?;

        utxos.push(AddressUtxo {
            tx_hash: hex::encode(key.txo_ref.tx_hash),
            output_index: key.txo_ref.vout,
            height: entry.height,
            value: entry.value.to_string(),
        });
    }

    // oldest first
    utxos.sort_by_key(|utxo| utxo.height);

    let out = ServeResponse {
        data: utxos,
        indexer_info,
    };

    Ok((StatusCode::OK, Json(out)))
}
