use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::sync::stages::index::indexers::core::addr_txs::AddrTxIndex;

// -- core types

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServeResponse<T> {
    pub data: T,
    pub indexer_info: IndexerInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IndexerInfo {
    /// Most recent indexed block, absent until the first block is indexed
    pub chain_tip: Option<ChainTip>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChainTip {
    /// The hash of the block
    pub block_hash: String,

    /// The height of the block in the blockchain
    pub block_height: u32,
}

#[derive(Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct PaginationParam {
    /// Max number of entries to return (default 100)
    pub count: Option<usize>,
}

// -- endpoint types

#[derive(Serialize, ToSchema)]
pub struct AddressUtxo {
    pub tx_hash: String,
    pub output_index: u32,
    pub height: u32,
    pub value: String,
}

#[derive(Serialize, ToSchema)]
pub struct AddressTx {
    pub tx_hash: String,
    pub height: u32,
    /// Inputs, outputs and token transfers through which the address takes part
    pub indexes: Vec<AddrTxIndex>,
}

#[derive(Serialize, ToSchema)]
pub struct TokenTransferView {
    /// Token contract, as 40 hex characters
    pub contract: String,
    pub from: String,
    pub to: String,
    /// Raw token units as a decimal string
    pub amount: String,
}

#[derive(Serialize, ToSchema)]
pub struct TransactionWithTransfers {
    pub height: u32,
    /// Block time as an RFC 3339 timestamp
    pub block_timestamp: Option<String>,
    pub tx: crate::chain::types::Tx,
    pub token_transfers: Vec<TokenTransferView>,
    /// Why the transfers of the receipt could not be decoded, if they could not
    pub token_transfers_error: Option<String>,
}
