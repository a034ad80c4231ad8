use hydra_indexer_macros::{Decode, Encode};
use serde::Serialize;

use crate::{
    chain::address::AddressDescriptor, define_core_table,
    sync::stages::index::indexers::types::TxoRef,
};

use super::IndexTable;

define_core_table! {
    name: UtxosByAddressKV,
    key_type: UtxosByAddressKey,
    value_type: UtxoEntry,
    table: IndexTable::UtxosByAddress
}

/// Unspent outputs by owning address. An entry is removed once its output is spent; the
/// spent history stays in `TxAddresses` through each output's `spent` flag.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct UtxosByAddressKey {
    pub address: AddressDescriptor,
    pub txo_ref: TxoRef,
}

#[derive(Encode, Decode, Clone, Copy, Debug, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct UtxoEntry {
    /// Height of the block which produced the output
    pub height: u32,
    pub value: u64,
}
