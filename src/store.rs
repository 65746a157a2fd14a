//! RocksDB-backed key/value store for imported archive data.
//!
//! One `Store` owns an optimistic-transaction database tuned for bulk
//! sequential writes: automatic compactions are off during import and a
//! single manual compaction runs once an import finishes. All writes go
//! through [`Store::transaction`] so an entry either commits in full or
//! leaves no trace.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use rocksdb::{
    BlockBasedOptions, Cache, DBCompressionType, Direction, ErrorKind, IteratorMode,
    OptimisticTransactionDB, Options, Transaction,
};

use crate::codec::{self, KeyFamily};
use crate::error::{Result, XvError};

const BLOCK_SIZE: usize = 8 * 1024;
const BLOCK_CACHE_BYTES: usize = 8 * 1024 * 1024;
const BLOOM_BITS_PER_KEY: f64 = 8.0;

/// Handle to an on-disk store.
pub struct Store {
    db: OptimisticTransactionDB,
    path: PathBuf,
}

impl Store {
    /// Opens (or creates) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path)
            .map_err(|e| XvError::path_error("create store directory", &path, e))?;

        let mut block = BlockBasedOptions::default();
        block.set_block_size(BLOCK_SIZE);
        block.set_block_cache(&Cache::new_lru_cache(BLOCK_CACHE_BYTES));
        block.set_bloom_filter(BLOOM_BITS_PER_KEY, false);
        block.set_cache_index_and_filter_blocks(true);
        block.set_pin_l0_filter_and_index_blocks_in_cache(true);

        let mut options = Options::default();
        options.create_if_missing(true);
        // Bulk import is a single sequential writer; `compact` runs once at
        // the end instead of automatic compactions along the way.
        options.set_disable_auto_compactions(true);
        options.set_num_levels(6);
        options.set_compression_per_level(&[
            DBCompressionType::None,
            DBCompressionType::None,
            DBCompressionType::Snappy,
            DBCompressionType::Snappy,
            DBCompressionType::Snappy,
            DBCompressionType::Snappy,
        ]);
        options.set_block_based_table_factory(&block);

        let db = OptimisticTransactionDB::open(&options, &path)?;
        Ok(Self { db, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Begins an optimistic transaction. Conflicts are detected at commit;
    /// see [`is_transaction_conflict`].
    pub fn transaction(&self) -> Transaction<'_, OptimisticTransactionDB> {
        self.db.transaction()
    }

    /// Point lookup outside any transaction.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get(key)?)
    }

    /// Loads every completed-entry marker as `archive name -> entry paths`.
    ///
    /// Markers use the highest key tag, so the scan starts at `[16]` and
    /// runs to the end of the keyspace.
    pub fn completed_entries(&self) -> Result<HashMap<String, HashSet<String>>> {
        let mut completed: HashMap<String, HashSet<String>> = HashMap::new();
        for kv in self.family_iter(KeyFamily::CompletedEntry) {
            let (key, _value) = kv?;
            let (archive, entry) = codec::parse_completed_entry_key(&key)?;
            completed.entry(archive).or_default().insert(entry);
        }
        Ok(completed)
    }

    /// Exact number of keys in one family. Walks the family's prefix, so
    /// cost is linear in the family size.
    pub fn count_family(&self, family: KeyFamily) -> Result<u64> {
        let mut count = 0u64;
        for kv in self.family_iter(family) {
            kv?;
            count += 1;
        }
        Ok(count)
    }

    /// Iterates one key family in key order.
    pub fn family_iter(
        &self,
        family: KeyFamily,
    ) -> impl Iterator<Item = Result<(Box<[u8]>, Box<[u8]>)>> + '_ {
        let tag = family.tag();
        self.db
            .iterator(IteratorMode::From(&[tag], Direction::Forward))
            .map(|kv| kv.map_err(XvError::from))
            .take_while(move |kv| match kv {
                Ok((key, _)) => key.first() == Some(&tag),
                Err(_) => true,
            })
    }

    /// RocksDB's own key-count estimate. Cheap but approximate; use
    /// [`Store::count_family`] when the answer has to be exact.
    pub fn estimated_keys(&self) -> Result<u64> {
        Ok(self
            .db
            .property_int_value("rocksdb.estimate-num-keys")?
            .unwrap_or(0))
    }

    /// Total size of live SST files in bytes.
    pub fn sst_bytes(&self) -> Result<u64> {
        Ok(self
            .db
            .property_int_value("rocksdb.total-sst-files-size")?
            .unwrap_or(0))
    }

    /// Full-range manual compaction. Run after a completed import to squash
    /// the uncompacted bulk-load levels.
    pub fn compact(&self) {
        self.db.compact_range(None::<&[u8]>, None::<&[u8]>);
    }
}

/// Whether a RocksDB error is an optimistic-transaction commit conflict.
///
/// The importer is the only writer, so a conflict means two imports ran
/// against the same store at once. The entry that hit it is retried on the
/// next run; the store itself is still consistent.
pub fn is_transaction_conflict(error: &rocksdb::Error) -> bool {
    matches!(error.kind(), ErrorKind::Busy | ErrorKind::TryAgain)
}
