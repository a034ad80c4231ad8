use crate::chain::address::HydraAddressCodec;
use crate::error::Error;
use crate::storage::kv_store::{Reader, StorageHandler};
use crate::sync::stages::index::indexers::core::hash_by_height::HashByHeightKV;
use axum::body::Body;
use axum::http::Request;
use axum::{
    Json, Router,
    extract::State,
    middleware::{self, Next},
    response::IntoResponse,
    routing::get,
};
use axum_server::Server;
use error::ServeError;
use serde::Deserialize;
use std::net::SocketAddr;
use tracing::{info, warn};
use types::{ChainTip, IndexerInfo};
use utoipa::OpenApi;

mod error;
mod openapi;
mod reader_wrapper;
mod routes;
mod types;

pub static DEFAULT_SERVE_ADDRESS: &str = "0.0.0.0:8080";

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ServerConfig {
    pub address: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    storage: StorageHandler,
    codec: HydraAddressCodec,
}

impl AppState {
    pub fn new(storage: StorageHandler, codec: HydraAddressCodec) -> Self {
        Self { storage, codec }
    }

    pub fn codec(&self) -> &HydraAddressCodec {
        &self.codec
    }

    /// Reader over the latest committed data, along with the tip it reflects.
    pub fn start_reader(&self) -> Result<(Reader, IndexerInfo), ServeError> {
        let reader = self.storage.reader();

        let chain_tip = HashByHeightKV::tip(&reader)?.map(|point| ChainTip {
            block_hash: point.hash.to_string(),
            block_height: point.height,
        });

        Ok((reader, IndexerInfo { chain_tip }))
    }
}

async fn auto_refresh(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> impl IntoResponse {
    // secondary rocksdb instances need to be manually told to catch up to the primary
    if let Err(e) = state.storage.try_refresh_read_only_data() {
        // continue with potentially stale data
        warn!("Failed to refresh read-only database: {}", e);
    }

    next.run(request).await
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/tip", get(tip))
        .route("/openapi.json", get(openapi_spec))
        .nest("/addresses", routes::addresses::router())
        .nest("/transactions", routes::transactions::router())
        .layer(middleware::from_fn_with_state(state.clone(), auto_refresh))
        .with_state(state)
}

pub async fn run(state: AppState, address: &str) -> Result<(), Error> {
    let app = router(state);

    let addr = address
        .parse::<SocketAddr>()
        .map_err(|e| Error::Custom(format!("invalid server address '{address}': {e}")))?;

    info!("api listening on {}...", addr);

    Server::bind(addr).serve(app.into_make_service()).await?;

    Ok(())
}

async fn root() -> &'static str {
    "Hydra Indexer API Server"
}

async fn openapi_spec() -> impl IntoResponse {
    Json(openapi::APIDoc::openapi())
}

#[utoipa::path(
    tag = "Chain",
    get,
    path = "/tip",
    responses(
        (status = 200, description = "Most recent indexed block", body = ChainTip),
        (status = 404, description = "Nothing indexed yet"),
        (status = 500, description = "Internal server error"),
    )
)]
/// Chain Tip
///
/// Returns the most recent block the index reflects.
pub async fn tip(State(state): State<AppState>) -> Result<impl IntoResponse, ServeError> {
    let (_, info) = state.start_reader()?;

    info.chain_tip.map(Json).ok_or(ServeError::NotFound)
}
