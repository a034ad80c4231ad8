use std::{collections::HashMap, ops::Range, path::Path, sync::Arc};

use itertools::Itertools;
use rocksdb::{
    Cache, ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, ReadOptions,
    SliceTransform, WriteBatch,
};
use sysinfo::{Pid, System};
use tracing::{info, trace, warn};

use crate::error::Error;

use super::{
    encdec::{Decode, Encode},
    table::{TABLE_PREFIX_LEN, Table, TableIterator},
};

static INDEX_CF_NAME: &str = "hydra";

pub type RawKey = Vec<u8>;
pub type RawValue = Vec<u8>;

/// Result type for multi_get: a vector of (key, Option<value>) pairs.
pub type MultiGetResult<K, V> = Vec<(K, Option<V>)>;

/// Block-scoped write buffer over the index. Nothing reaches storage until the finalized task is
/// applied, so a block is either committed whole or not at all.
pub struct IndexingTask<'a> {
    db: &'a DB,
    cf_handle: &'a ColumnFamily,
    // when we write keys, we do not write to storage, we manipulate here until we flush via write batch
    // when we read, we first check for the key here and if we dont find it we read from storage
    write_buffer: HashMap<RawKey, StorageAction>,
}

impl<'a> IndexingTask<'a> {
    pub fn get<T>(&self, key: &T::Key) -> Result<Option<T::Value>, Error>
    where
        T: Table,
    {
        // Encode the key for the relevant table
        let encoded_key = T::encode_key(key);

        // Check the write buffer first
        if let Some(action) = self.write_buffer.get(&encoded_key) {
            trace!("fetching {} from writebuf", hex::encode(&encoded_key));

            return match action {
                StorageAction::Set(value) => Ok(Some(T::Value::decode_all(value)?)),
                StorageAction::Delete => Ok(None),
            };
        }

        trace!("fetching {} from storage", hex::encode(&encoded_key));

        self.db
            .get_cf(self.cf_handle, &encoded_key)?
            .map(|bytes| T::Value::decode_all(&bytes).map_err(Error::from))
            .transpose()
    }

    pub fn multi_get<T>(&self, keys: Vec<T::Key>) -> Result<MultiGetResult<T::Key, T::Value>, Error>
    where
        T: Table,
    {
        let mut out = Vec::with_capacity(keys.len());
        let mut to_fetch = Vec::with_capacity(keys.len());

        for key in keys {
            let encoded_key = T::encode_key(&key);

            // Check the write buffer first
            match self.write_buffer.get(&encoded_key) {
                Some(StorageAction::Set(value)) => out.push((key, Some(T::Value::decode_all(value)?))),
                Some(StorageAction::Delete) => out.push((key, None)),
                None => to_fetch.push((key, encoded_key)),
            }
        }

        let fetched = self
            .db
            .multi_get_cf(to_fetch.iter().map(|(_, enc_k)| (self.cf_handle, enc_k)));

        for ((key, _), value) in to_fetch.into_iter().zip_eq(fetched) {
            let value = match value? {
                Some(v) => Some(T::Value::decode_all(&v)?),
                None => None,
            };

            out.push((key, value));
        }

        Ok(out)
    }

    pub fn set<T>(&mut self, key: T::Key, value: T::Value) -> Result<(), Error>
    where
        T: Table,
    {
        let encoded_key = T::encode_key(&key);

        trace!("setting {}", hex::encode(&encoded_key));

        self.write_buffer
            .insert(encoded_key, StorageAction::Set(value.encode()));

        Ok(())
    }

    pub fn delete<T>(&mut self, key: T::Key) -> Result<(), Error>
    where
        T: Table,
    {
        let encoded_key = T::encode_key(&key);

        trace!("deleting {}", hex::encode(&encoded_key));

        self.write_buffer.insert(encoded_key, StorageAction::Delete);

        Ok(())
    }

    pub fn pending(&self) -> usize {
        self.write_buffer.len()
    }

    pub fn finalize(self) -> FinalizedTask {
        FinalizedTask {
            write_buffer: self.write_buffer,
        }
    }
}

pub struct FinalizedTask {
    pub write_buffer: HashMap<RawKey, StorageAction>,
}

#[derive(Clone)]
pub struct StorageHandler {
    pub db: Arc<DB>,
    read_only: bool,
}

impl StorageHandler {
    pub fn open(path: impl AsRef<Path>, read_only: bool, memory_budget: u64) -> Result<Self, Error> {
        let path = path.as_ref();

        info!("opening db at {}...", path.display());
        let mut db_opts = Options::default();
        db_opts.create_missing_column_families(true);
        db_opts.create_if_missing(true);

        // Enable RocksDB statistics for monitoring
        db_opts.enable_statistics();
        db_opts.set_report_bg_io_stats(true);

        info!(
            "using rocksdb memory budget: {:.2} GB ({} bytes)",
            memory_budget as f64 / 1024.0 / 1024.0 / 1024.0,
            memory_budget
        );

        let block_cache_budget = (memory_budget as f64 * 0.75) as usize;
        let memtable_budget = (memory_budget as f64 * 0.25) as usize;

        let cache = Cache::new_lru_cache(block_cache_budget);

        let sys = System::new_all();
        let cpus = sys.cpus().len() as u32;
        let background_jobs = std::cmp::max(2, cpus);
        db_opts.set_max_background_jobs(background_jobs.try_into().unwrap_or(i32::MAX));
        db_opts.set_max_subcompactions(cpus);

        let mut cf_opts = Options::default();

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_block_cache(&cache);
        cf_opts.set_block_based_table_factory(&block_opts);

        let per_memtable_cap = 512 * 1024 * 1024;
        cf_opts.set_write_buffer_size(std::cmp::min(memtable_budget / 2, per_memtable_cap));
        cf_opts.set_max_write_buffer_number(2);
        cf_opts.set_max_write_buffer_size_to_maintain(0);

        cf_opts.set_prefix_extractor(SliceTransform::create_fixed_prefix(TABLE_PREFIX_LEN));

        let cfs = vec![ColumnFamilyDescriptor::new(INDEX_CF_NAME, cf_opts)];

        let db = if read_only {
            let secondary_path = path.join("secondary");
            DB::open_cf_descriptors_as_secondary(&db_opts, path, &secondary_path, cfs)?
        } else {
            DB::open_cf_descriptors(&db_opts, path, cfs)?
        };

        Ok(Self {
            db: Arc::new(db),
            read_only,
        })
    }

    pub fn cf_handle(&self) -> &ColumnFamily {
        // created in `open`, so always present
        self.db.cf_handle(INDEX_CF_NAME).expect("cf missing")
    }

    pub fn begin_indexing_task(&self) -> IndexingTask<'_> {
        IndexingTask {
            db: &self.db,
            cf_handle: self.cf_handle(),
            write_buffer: HashMap::new(),
        }
    }

    /// Commit every pending action of the task in a single write batch
    pub fn apply_indexing_task(&self, task: FinalizedTask) -> Result<(), Error> {
        if self.read_only {
            return Err(Error::Custom("cannot apply indexing task to read-only db".into()));
        }

        let mut wb = WriteBatch::new();

        let cf = self.cf_handle();

        for (key, action) in task.write_buffer {
            match action {
                StorageAction::Set(value) => wb.put_cf(cf, key, value),
                StorageAction::Delete => wb.delete_cf(cf, key),
            }
        }

        self.db.write(wb)?;

        Ok(())
    }

    pub fn reader(&self) -> Reader {
        Reader {
            db: self.db.clone(),
        }
    }

    pub fn try_refresh_read_only_data(&self) -> Result<(), Error> {
        if self.read_only {
            self.db.try_catch_up_with_primary()?
        }

        Ok(())
    }

    pub fn flush(&self) -> Result<(), Error> {
        self.db.flush_cf(self.cf_handle())?;

        Ok(())
    }

    pub fn flush_and_compact(&self) -> Result<(), Error> {
        self.flush()?;
        self.db
            .compact_range_cf(self.cf_handle(), None::<Vec<u8>>, None::<Vec<u8>>);

        Ok(())
    }

    fn property(&self, name: &str) -> u64 {
        match self.db.property_int_value_cf(self.cf_handle(), name) {
            Ok(value) => value.unwrap_or(0),
            Err(e) => {
                warn!("failed to read rocksdb property {name}: {e}");
                0
            }
        }
    }

    pub fn log_perf_snapshot(&self) {
        let memtables = self.property("rocksdb.cur-size-all-mem-tables");
        let block_cache = self.property("rocksdb.block-cache-usage");
        let pending_compaction = self.property("rocksdb.estimate-pending-compaction-bytes");
        let running_compactions = self.property("rocksdb.num-running-compactions");

        let sys = System::new_all();
        let app_mem_mb = sys
            .process(Pid::from_u32(std::process::id()))
            .map(|process| process.memory() / 1024 / 1024)
            .unwrap_or(0);

        info!(
            app_mem_mb,
            memtables_mb = memtables / 1024 / 1024,
            block_cache_mb = block_cache / 1024 / 1024,
            pending_compaction_mb = pending_compaction / 1024 / 1024,
            running_compactions,
            free_mem_mb = sys.free_memory() / 1024 / 1024,
            total_mem_mb = sys.total_memory() / 1024 / 1024,
            "rocksdb performance stats"
        );
    }
}

/// Read handle used by queries, always reading the latest committed data
pub struct Reader {
    db: Arc<DB>,
}

impl Reader {
    fn cf_handle(&self) -> Result<&ColumnFamily, Error> {
        self.db
            .cf_handle(INDEX_CF_NAME)
            .ok_or_else(|| Error::Custom(format!("missing column family {INDEX_CF_NAME}")))
    }

    pub fn get<T>(&self, key: &T::Key) -> Result<Option<T::Value>, Error>
    where
        T: Table,
    {
        let res = self.db.get_cf(self.cf_handle()?, T::encode_key(key))?;

        match res {
            Some(bytes) => Ok(Some(<T>::Value::decode_all(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn iter_kvs<T: Table>(
        &self,
        range: Range<Vec<u8>>,
        reverse: bool,
    ) -> Result<TableIterator<'_, T>, Error> {
        let mut read_opts = ReadOptions::default();
        read_opts.set_iterate_range(range);

        let mode = if reverse {
            IteratorMode::End
        } else {
            IteratorMode::Start
        };

        let iter = self.db.iterator_cf_opt(self.cf_handle()?, read_opts, mode);

        Ok(TableIterator::<T>::new(iter))
    }
}

pub enum StorageAction {
    Set(RawValue),
    Delete,
}

#[cfg(test)]
mod tests {
    use hydra_indexer_macros::{Decode, Encode};

    use super::*;
    use crate::define_core_table;

    #[derive(Encode, Decode, Debug, PartialEq, Clone)]
    pub struct Pair {
        owner: Vec<u8>,
        n: u32,
    }

    define_core_table! {
        name: TestKV,
        key_type: Pair,
        value_type: u64,
        table: b't'
    }

    define_core_table! {
        name: OtherKV,
        key_type: u32,
        value_type: u64,
        table: b'u'
    }

    fn open() -> (tempfile::TempDir, StorageHandler) {
        let dir = tempfile::tempdir().unwrap();
        let db = StorageHandler::open(dir.path(), false, 64 * 1024 * 1024).unwrap();
        (dir, db)
    }

    #[test]
    fn task_reads_through_write_buffer() {
        let (_dir, db) = open();

        let key = Pair { owner: vec![1], n: 0 };

        let mut task = db.begin_indexing_task();
        task.set::<TestKV>(key.clone(), 10).unwrap();
        assert_eq!(task.get::<TestKV>(&key).unwrap(), Some(10));

        // nothing is visible in storage before the task is applied
        assert_eq!(db.reader().get::<TestKV>(&key).unwrap(), None);

        db.apply_indexing_task(task.finalize()).unwrap();
        assert_eq!(db.reader().get::<TestKV>(&key).unwrap(), Some(10));

        let mut task = db.begin_indexing_task();
        task.delete::<TestKV>(key.clone()).unwrap();
        assert_eq!(task.get::<TestKV>(&key).unwrap(), None);

        let res = task.multi_get::<TestKV>(vec![key.clone()]).unwrap();
        assert_eq!(res, vec![(key.clone(), None)]);

        // dropping the task discards its mutations
        drop(task);
        assert_eq!(db.reader().get::<TestKV>(&key).unwrap(), Some(10));
    }

    #[test]
    fn prefix_iteration_stays_within_owner_and_table() {
        let (_dir, db) = open();

        let mut task = db.begin_indexing_task();
        for (owner, n) in [(vec![1u8], 2u32), (vec![1], 1), (vec![1, 0], 0), (vec![2], 0)] {
            task.set::<TestKV>(Pair { owner, n }, n as u64).unwrap();
        }
        task.set::<OtherKV>(0, 99).unwrap();
        db.apply_indexing_task(task.finalize()).unwrap();

        let reader = db.reader();

        let owned: Vec<_> = reader
            .iter_kvs::<TestKV>(TestKV::prefix_range(&vec![1u8]), false)
            .unwrap()
            .map(|kv| kv.unwrap().0.n)
            .collect();
        assert_eq!(owned, vec![1, 2]);

        let all = reader
            .iter_kvs::<TestKV>(TestKV::full_range(), true)
            .unwrap()
            .count();
        assert_eq!(all, 4);
    }
}
