use std::{marker::PhantomData, ops::Range};

use rocksdb::{DB, DBIteratorWithThreadMode};

use crate::error::Error;

use super::encdec::{Decode, Encode, EncodeBuilder, prefix_key_range};

const CORE_TABLE_TAG: u8 = b'C';

/// Length of the `[tag, table id]` prefix in front of every encoded key.
pub const TABLE_PREFIX_LEN: usize = 2;

/// Defines a CoreTable.
///
/// # Example
/// ```ignore
/// define_core_table! {
///     name: AddrBalanceKV,
///     key_type: AddressDescriptor,
///     value_type: AddrBalance,
///     table: IndexTable::AddrBalance
/// }
/// ```
#[macro_export]
macro_rules! define_core_table {
    {
        name: $name:ident,
        key_type: $key_type:ty,
        value_type: $value_type:ty,
        table: $table_id:expr
    } => {
        pub struct $name;

        impl $crate::storage::table::TableBase for $name {
            type Key = $key_type;
            type Value = $value_type;
        }

        impl $crate::storage::table::CoreTable for $name {
            const TABLE_ID: u8 = $table_id as u8;
        }
    };
}

/// Common trait with basic table requirements
pub trait TableBase {
    /// Key type for the table.
    type Key: Encode + Decode;

    /// Value type for the table.
    type Value: Encode + Decode;
}

/// A common trait for tables with a unique prefix and key-value types.
pub trait Table: TableBase {
    /// Prefix shared by every key of the table.
    fn prefix() -> [u8; TABLE_PREFIX_LEN];

    /// Encodes the full key by combining the table prefix and the encoded key.
    fn encode_key(key: &Self::Key) -> Vec<u8> {
        EncodeBuilder::new()
            .append(&Self::prefix())
            .append(key)
            .build()
    }

    /// Range covering every key of the table.
    fn full_range() -> Range<Vec<u8>> {
        prefix_key_range(&Self::prefix())
    }

    /// Range covering every key starting with the encoding of `partial`, e.g. all
    /// composite keys for one address.
    fn prefix_range<P: Encode>(partial: &P) -> Range<Vec<u8>> {
        let prefix = EncodeBuilder::new()
            .append(&Self::prefix())
            .append(partial)
            .build();

        prefix_key_range(&prefix)
    }
}

/// Represents a table in the core keyspace.
pub trait CoreTable: TableBase {
    /// Unique id of the table within the core keyspace.
    const TABLE_ID: u8;
}

impl<T: CoreTable> Table for T {
    fn prefix() -> [u8; TABLE_PREFIX_LEN] {
        [CORE_TABLE_TAG, T::TABLE_ID]
    }
}

/// Iterates over raw rocksdb entries, decoding them into the table's key and value types.
pub struct TableIterator<'a, T: Table> {
    inner: DBIteratorWithThreadMode<'a, DB>,
    _table: PhantomData<T>,
}

impl<'a, T: Table> TableIterator<'a, T> {
    pub fn new(inner: DBIteratorWithThreadMode<'a, DB>) -> Self {
        Self {
            inner,
            _table: PhantomData,
        }
    }
}

impl<T: Table> Iterator for TableIterator<'_, T> {
    type Item = Result<(T::Key, T::Value), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let res = self.inner.next()?;

        Some(res.map_err(Error::from).and_then(|(key, value)| {
            let raw_key = key.get(TABLE_PREFIX_LEN..).unwrap_or_default();

            Ok((T::Key::decode_exact(raw_key)?, T::Value::decode_all(&value)?))
        }))
    }
}
