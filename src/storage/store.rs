use crate::error::{LimoncelloError, Result};
use crate::storage::log::LogFile;
use crate::storage::record::LogRecord;
use crate::types::{Config, Pair, StoreStats};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Documents of one collection, ordered by raw key bytes
type Documents = BTreeMap<String, Vec<u8>>;

struct StoreState {
    collections: BTreeMap<String, Documents>,
    log: Option<LogFile>,
    /// Records in the log that a compaction would drop
    obsolete_records: usize,
}

impl StoreState {
    fn live_records(&self) -> usize {
        self.collections.len() + self.collections.values().map(|docs| docs.len()).sum::<usize>()
    }

    fn documents(&self, name: &str) -> Result<&Documents> {
        self.collections
            .get(name)
            .ok_or_else(|| LimoncelloError::CollectionNotFound(name.to_string()))
    }

    /// Apply a replayed or freshly committed record.
    ///
    /// Returns the number of earlier records this one makes obsolete.
    fn apply(&mut self, record: LogRecord) -> Result<usize> {
        match record {
            LogRecord::CreateCollection { name } => {
                if self.collections.contains_key(&name) {
                    return Ok(1);
                }
                self.collections.insert(name, Documents::new());
                Ok(0)
            }
            LogRecord::DropCollection { name } => {
                let docs = self
                    .collections
                    .remove(&name)
                    .ok_or(LimoncelloError::CollectionNotFound(name))?;
                // The drop itself, the create and every live put
                Ok(docs.len() + 2)
            }
            LogRecord::Put { collection, key, value } => {
                let docs = self
                    .collections
                    .get_mut(&collection)
                    .ok_or(LimoncelloError::CollectionNotFound(collection))?;
                Ok(docs.insert(key, value).map_or(0, |_| 1))
            }
            LogRecord::Delete { collection, key } => {
                let docs = self
                    .collections
                    .get_mut(&collection)
                    .ok_or(LimoncelloError::CollectionNotFound(collection))?;
                // The delete itself plus the put it removes
                Ok(docs.remove(&key).map_or(1, |_| 2))
            }
        }
    }

    /// Records that rebuild the current state from an empty store
    fn snapshot(&self) -> Vec<LogRecord> {
        let mut records = Vec::with_capacity(self.live_records());
        for (name, docs) in &self.collections {
            records.push(LogRecord::CreateCollection { name: name.clone() });
            for (key, value) in docs {
                records.push(LogRecord::Put {
                    collection: name.clone(),
                    key: key.clone(),
                    value: value.clone(),
                });
            }
        }
        records
    }
}

/// Durable key-value store partitioned into named collections.
///
/// One writer at a time holds the write guard while it appends to the log
/// and updates the in-memory map; readers share the read guard and never
/// see a half-applied write.
pub struct CollectionStore {
    state: RwLock<StoreState>,
    config: Config,
}

impl CollectionStore {
    /// Open the store at `path`, creating the file if it does not exist
    pub fn open<P: AsRef<Path>>(path: P, config: Config) -> Result<Self> {
        let path = path.as_ref();

        let mut state = StoreState {
            collections: BTreeMap::new(),
            log: None,
            obsolete_records: 0,
        };

        if path.exists() {
            let (log, records) = LogFile::open(path)?;
            let replayed = records.len();
            for record in records {
                let obsolete = state.apply(record).map_err(|e| {
                    LimoncelloError::InvalidFormat(format!("Inconsistent log record: {}", e))
                })?;
                state.obsolete_records += obsolete;
            }
            state.log = Some(log);
            info!(
                path = %path.display(),
                records = replayed,
                collections = state.collections.len(),
                "opened store"
            );
        } else {
            state.log = Some(LogFile::create(path)?);
            info!(path = %path.display(), "created store");
        }

        Ok(Self {
            state: RwLock::new(state),
            config,
        })
    }

    /// A store with no backing file; everything is lost on drop
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(StoreState {
                collections: BTreeMap::new(),
                log: None,
                obsolete_records: 0,
            }),
            config: Config::default(),
        }
    }

    /// Create a collection. Succeeds without writing if it already exists.
    pub fn create_collection(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(LimoncelloError::MalformedInput(
                "Collection name must not be empty".to_string(),
            ));
        }

        let mut state = self.state.write();
        if state.collections.contains_key(name) {
            return Ok(());
        }

        self.commit(&mut state, LogRecord::CreateCollection { name: name.to_string() })?;
        info!(collection = name, "created collection");
        Ok(())
    }

    /// Remove a collection and every document in it
    pub fn drop_collection(&self, name: &str) -> Result<()> {
        let mut state = self.state.write();
        state.documents(name)?;

        self.commit(&mut state, LogRecord::DropCollection { name: name.to_string() })?;
        info!(collection = name, "dropped collection");
        Ok(())
    }

    /// Insert or overwrite the value stored under `key`
    pub fn upsert(&self, collection: &str, key: &str, value: Vec<u8>) -> Result<()> {
        if key.is_empty() {
            return Err(LimoncelloError::MalformedInput(
                "Document key must not be empty".to_string(),
            ));
        }

        let mut state = self.state.write();
        state.documents(collection)?;

        self.commit(
            &mut state,
            LogRecord::Put {
                collection: collection.to_string(),
                key: key.to_string(),
                value,
            },
        )?;
        debug!(collection, key, "upserted document");
        Ok(())
    }

    /// Raw value stored under `key`, if any
    pub fn get(&self, collection: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let state = self.state.read();
        Ok(state.documents(collection)?.get(key).cloned())
    }

    /// Remove `key` from the collection. Returns whether a document existed.
    pub fn delete(&self, collection: &str, key: &str) -> Result<bool> {
        let mut state = self.state.write();
        if !state.documents(collection)?.contains_key(key) {
            return Ok(false);
        }

        self.commit(
            &mut state,
            LogRecord::Delete {
                collection: collection.to_string(),
                key: key.to_string(),
            },
        )?;
        debug!(collection, key, "deleted document");
        Ok(true)
    }

    /// Every document in the collection, in key byte order
    pub fn scan_one(&self, collection: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let state = self.state.read();
        let docs = state.documents(collection)?;
        Ok(docs.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    /// Documents of several collections, in the order the collections are
    /// given and key order within each.
    ///
    /// All collections are read under one guard. The first missing
    /// collection fails the whole scan.
    pub fn scan_many<S: AsRef<str>>(&self, collections: &[S]) -> Result<Vec<Pair>> {
        let state = self.state.read();
        let mut pairs = Vec::new();

        for name in collections {
            let name = name.as_ref();
            let docs = state.documents(name)?;
            pairs.extend(docs.iter().map(|(k, v)| Pair {
                collection: name.to_string(),
                key: k.clone(),
                value: v.clone(),
            }));
        }

        Ok(pairs)
    }

    pub fn contains_collection(&self, name: &str) -> bool {
        self.state.read().collections.contains_key(name)
    }

    /// Number of documents in a collection
    pub fn count(&self, collection: &str) -> Result<usize> {
        Ok(self.state.read().documents(collection)?.len())
    }

    /// All collections with their document counts, sorted by name
    pub fn list_collections(&self) -> Vec<(String, usize)> {
        self.state
            .read()
            .collections
            .iter()
            .map(|(name, docs)| (name.clone(), docs.len()))
            .collect()
    }

    pub fn stats(&self) -> StoreStats {
        let state = self.state.read();
        StoreStats {
            collections: state.collections.len(),
            documents: state.collections.values().map(|docs| docs.len()).sum(),
            live_records: state.live_records(),
            obsolete_records: state.obsolete_records,
            file_bytes: state.log.as_ref().map_or(0, |log| log.len()),
        }
    }

    /// Rewrite the log so it holds only live state
    pub fn compact(&self) -> Result<()> {
        let mut state = self.state.write();
        Self::compact_locked(&mut state)
    }

    /// fsync the data file
    pub fn sync(&self) -> Result<()> {
        if let Some(log) = self.state.write().log.as_mut() {
            log.sync()?;
        }
        Ok(())
    }

    /// Make a record durable, then apply it.
    ///
    /// Called with the write guard held and after the caller has checked the
    /// record applies cleanly, so a logged record is always applied.
    fn commit(&self, state: &mut StoreState, record: LogRecord) -> Result<()> {
        if let Some(log) = state.log.as_mut() {
            log.append(&record, self.config.sync_on_write)?;
        }
        let obsolete = state.apply(record)?;
        state.obsolete_records += obsolete;

        // The record is already durable and applied; a failed compaction
        // leaves the obsolete count in place to retry on the next write.
        let threshold = self.config.compaction_threshold;
        if state.log.is_some() && threshold > 0 && state.obsolete_records > threshold {
            if let Err(e) = Self::compact_locked(state) {
                warn!(
                    obsolete = state.obsolete_records,
                    error = %e,
                    "automatic compaction failed"
                );
            }
        }
        Ok(())
    }

    fn compact_locked(state: &mut StoreState) -> Result<()> {
        let snapshot = state.snapshot();
        let Some(log) = state.log.as_mut() else {
            state.obsolete_records = 0;
            return Ok(());
        };

        let before = log.len();
        log.rewrite(&snapshot)?;
        info!(
            path = %log.path().display(),
            dropped = state.obsolete_records,
            before_bytes = before,
            after_bytes = log.len(),
            "compacted store"
        );
        state.obsolete_records = 0;
        Ok(())
    }
}
