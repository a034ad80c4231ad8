use hydra_indexer_macros::{Decode, Encode};
use serde::Serialize;

use crate::chain::types::TxHash;

/// Reference to a transaction output.
#[derive(Encode, Decode, PartialEq, Hash, Eq, Clone, Copy, Debug, Serialize)]
pub struct TxoRef {
    #[serde(with = "hex::serde")]
    pub tx_hash: TxHash,
    pub vout: u32,
}
