pub mod balance;
pub mod contracts;
pub mod txs;
pub mod utxos;

use axum::{Router, routing::get};

use crate::serve::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{address}/balance", get(balance::addresses_balance))
        .route("/{address}/utxos", get(utxos::addresses_utxos))
        .route("/{address}/contracts", get(contracts::addresses_contracts))
        .route("/{address}/txs", get(txs::addresses_txs))
}
