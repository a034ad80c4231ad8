use hydra_indexer_macros::{Decode, Encode};

use crate::{
    chain::{address::AddressDescriptor, hrc20::ContractId, types::TxHash},
    define_core_table,
};

use super::IndexTable;

define_core_table! {
    name: TxAddressesKV,
    key_type: TxHash,
    value_type: TxAddresses,
    table: IndexTable::TxAddresses
}

/// Addresses and values of a transaction's inputs and outputs, kept so later spends resolve
/// without the original transaction. Unassignable entries carry an empty descriptor.
#[derive(Encode, Decode, Clone, Debug, Default, PartialEq, Eq)]
pub struct TxAddresses {
    pub height: u32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub contracts: Vec<TouchedContract>,
}

#[derive(Encode, Decode, Clone, Debug, Default, PartialEq, Eq)]
pub struct TxInput {
    pub address: AddressDescriptor,
    pub value: u64,
}

#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct TxOutput {
    pub address: AddressDescriptor,
    pub value: u64,
    /// Set when a later input consumes the output
    pub spent: bool,
}

/// An (address, token contract) pair touched by a transfer in the transaction.
#[derive(Encode, Decode, Clone, Copy, Debug, PartialEq, Eq)]
pub struct TouchedContract {
    pub address: ContractId,
    pub contract: ContractId,
}
