use bitcoin::{BlockHash, hashes::Hash};

use crate::{
    define_core_table,
    error::Error,
    storage::{kv_store::Reader, table::Table},
    sync::stages::Point,
};

use super::IndexTable;

define_core_table! {
    name: HashByHeightKV,
    key_type: u32,
    value_type: [u8; 32],
    table: IndexTable::HashByHeight
}

impl HashByHeightKV {
    /// Highest indexed block, `None` for an empty index.
    pub fn tip(reader: &Reader) -> Result<Option<Point>, Error> {
        let mut iter = reader.iter_kvs::<Self>(Self::full_range(), true)?;

        iter.next()
            .transpose()
            .map(|entry| {
                entry.map(|(height, hash)| Point {
                    height,
                    hash: BlockHash::from_byte_array(hash),
                })
            })
    }
}
