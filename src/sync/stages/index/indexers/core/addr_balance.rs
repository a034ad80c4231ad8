use hydra_indexer_macros::{Decode, Encode};
use serde::Serialize;

use crate::{chain::address::AddressDescriptor, define_core_table};

use super::IndexTable;

define_core_table! {
    name: AddrBalanceKV,
    key_type: AddressDescriptor,
    value_type: AddrBalance,
    table: IndexTable::AddrBalance
}

/// Native value totals of an address, in the chain's smallest unit.
#[derive(Encode, Decode, Clone, Debug, Default, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct AddrBalance {
    pub total_received: u64,
    pub total_sent: u64,
    pub balance: u64,
    /// Transactions paying to or spending from the address
    pub tx_count: u64,
}

impl AddrBalance {
    pub fn credit(&mut self, value: u64) {
        self.total_received = self.total_received.saturating_add(value);
        self.balance = self.balance.saturating_add(value);
    }

    /// Debits `value`, returning `false` if the balance had to be clamped at zero.
    pub fn debit(&mut self, value: u64) -> bool {
        self.total_sent = self.total_sent.saturating_add(value);

        match self.balance.checked_sub(value) {
            Some(balance) => {
                self.balance = balance;
                true
            }
            None => {
                self.balance = 0;
                false
            }
        }
    }
}
