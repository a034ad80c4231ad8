use hydra_indexer_macros::{Decode, Encode};
use serde::Serialize;

use crate::{
    chain::{address::AddressDescriptor, types::TxHash},
    define_core_table,
};

use super::IndexTable;

define_core_table! {
    name: AddrTxsKV,
    key_type: AddrTxKey,
    value_type: Vec<AddrTxIndex>,
    table: IndexTable::AddrTxs
}

/// Transactions of an address ordered by height.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq, Hash)]
pub struct AddrTxKey {
    pub address: AddressDescriptor,
    pub height: u32,
    pub tx_hash: TxHash,
}

/// Why an address appears in a transaction. Token entries hold the 1-based position of the
/// contract in the address's contract list.
#[derive(Encode, Decode, Clone, Copy, Debug, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AddrTxIndex {
    Output(u32),
    Input(u32),
    TokenReceived(u32),
    TokenSent(u32),
}
