use serde::Serialize;

use crate::{
    chain::{address::AddressDescriptor, hrc20::ContractId},
    define_core_table,
    storage::encdec::{Decode, DecodingResult, Encode},
};

use super::IndexTable;

define_core_table! {
    name: AddrContractsKV,
    key_type: AddressDescriptor,
    value_type: AddrContracts,
    table: IndexTable::AddrContracts
}

/// Token contracts an address has sent or received through, in first-seen order.
///
/// Encoded as `total_tx_count`, `non_contract_tx_count` and then `(contract, tx_count)` pairs
/// until the end of the value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct AddrContracts {
    pub total_tx_count: u64,
    pub non_contract_tx_count: u64,
    pub contracts: Vec<AddrContract>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct AddrContract {
    #[serde(with = "hex::serde")]
    #[schema(value_type = String)]
    pub contract: ContractId,
    pub tx_count: u64,
}

impl AddrContracts {
    pub fn position(&self, contract: &ContractId) -> Option<usize> {
        self.contracts.iter().position(|c| &c.contract == contract)
    }

    /// Position of `contract` in the list, appending it if it was never seen.
    pub fn position_or_insert(&mut self, contract: &ContractId) -> usize {
        match self.position(contract) {
            Some(i) => i,
            None => {
                self.contracts.push(AddrContract {
                    contract: *contract,
                    tx_count: 0,
                });
                self.contracts.len() - 1
            }
        }
    }
}

impl Encode for AddrContracts {
    fn encode(&self) -> Vec<u8> {
        let mut out = self.total_tx_count.encode();
        out.extend(self.non_contract_tx_count.encode());

        for entry in &self.contracts {
            out.extend(entry.contract);
            out.extend(entry.tx_count.encode());
        }

        out
    }
}

impl Decode for AddrContracts {
    fn decode(bytes: &[u8]) -> DecodingResult<Self> {
        let (total_tx_count, rest) = u64::decode(bytes)?;
        let (non_contract_tx_count, mut rest) = u64::decode(rest)?;

        let mut contracts = vec![];

        while !rest.is_empty() {
            let (contract, r) = ContractId::decode(rest)?;
            let (tx_count, r) = u64::decode(r)?;

            contracts.push(AddrContract { contract, tx_count });
            rest = r;
        }

        Ok((
            Self {
                total_tx_count,
                non_contract_tx_count,
                contracts,
            },
            rest,
        ))
    }
}
