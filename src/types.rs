use serde::{Deserialize, Serialize};

/// Database configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// fsync the data file after every committed write
    pub sync_on_write: bool,
    /// Number of obsolete log records that triggers an automatic compaction.
    /// Zero disables automatic compaction.
    pub compaction_threshold: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sync_on_write: true,
            compaction_threshold: 1000,
        }
    }
}

impl Config {
    pub fn with_sync_on_write(mut self, sync: bool) -> Self {
        self.sync_on_write = sync;
        self
    }

    pub fn with_compaction_threshold(mut self, threshold: usize) -> Self {
        self.compaction_threshold = threshold;
        self
    }
}

/// A (key, encoded value) pair read out of a collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    pub collection: String,
    pub key: String,
    pub value: Vec<u8>,
}

/// Snapshot of store-wide counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub collections: usize,
    pub documents: usize,
    /// Records in the log that still describe live state
    pub live_records: usize,
    /// Records superseded by later writes, reclaimed by compaction
    pub obsolete_records: usize,
    pub file_bytes: u64,
}
