use crate::{
    chain::{
        codec::{PackedTx, PackedTxId, unpack_tx},
        types::{Tx, TxHash},
    },
    define_core_table,
    error::Error,
    storage::{kv_store::Reader, table::Table},
};

use super::IndexTable;

define_core_table! {
    name: TransactionsKV,
    key_type: PackedTxId,
    value_type: PackedTx,
    table: IndexTable::Transactions
}

impl TransactionsKV {
    /// Looks a transaction up by hash alone, returning it with the height of its block.
    pub fn find(reader: &Reader, tx_hash: &TxHash) -> Result<Option<(Tx, u32)>, Error> {
        let mut iter = reader.iter_kvs::<Self>(Self::prefix_range(tx_hash), false)?;

        match iter.next().transpose()? {
            Some((_, PackedTx(bytes))) => Ok(Some(unpack_tx(&bytes)?)),
            None => Ok(None),
        }
    }
}
