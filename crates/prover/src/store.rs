//! Tree persistence.
//!
//! A tree is persisted as its exported state plus bookkeeping, one record
//! per `(chainId, pool)`. The leaves are the source of truth; the stored
//! root is only a cached value and is recomputed on load.

use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use ark_bn254::Fr;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};

use swap_circuits::encoding::{serde_decimal, serde_decimal_vec};
use swap_circuits::{PoseidonHasher, SparseMerkleTree, TreeState};

/// Errors from a tree store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },
    #[error("Invalid tree id: {0:?}")]
    InvalidId(String),
    #[error("Store lock poisoned")]
    Poisoned,
}

/// Identifier of one pool's tree on one chain.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TreeId {
    chain_id: u64,
    pool: String,
}

impl TreeId {
    /// Build an id; the pool is lowercased and must be non-empty ASCII
    /// alphanumerics or `_`, so the id round-trips through its string form.
    pub fn new(chain_id: u64, pool: impl Into<String>) -> Result<Self, StoreError> {
        let pool = pool.into().to_lowercase();
        if pool.is_empty() || !pool.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(StoreError::InvalidId(format!("{}-{}", chain_id, pool)));
        }
        Ok(Self { chain_id, pool })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn pool(&self) -> &str {
        &self.pool
    }
}

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.chain_id, self.pool)
    }
}

impl FromStr for TreeId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (chain, pool) = s
            .split_once('-')
            .ok_or_else(|| StoreError::InvalidId(s.to_string()))?;
        let chain_id = chain
            .parse()
            .map_err(|_| StoreError::InvalidId(s.to_string()))?;
        Self::new(chain_id, pool)
    }
}

/// Persisted record of one tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTree {
    pub id: String,
    pub height: usize,
    #[serde(with = "serde_decimal_vec")]
    pub leaves: Vec<Fr>,
    pub last_synced_block: u64,
    /// Milliseconds since the Unix epoch
    pub last_updated: u64,
    /// Cached root; recomputed on load
    #[serde(with = "serde_decimal")]
    pub root: Fr,
}

impl StoredTree {
    /// Snapshot a tree.
    pub fn from_tree(id: &TreeId, tree: &mut SparseMerkleTree, last_synced_block: u64) -> Self {
        let root = tree.root();
        let state = tree.export_state();
        Self {
            id: id.to_string(),
            height: state.height,
            leaves: state.leaves,
            last_synced_block,
            last_updated: now_millis(),
            root,
        }
    }

    pub fn state(&self) -> TreeState {
        TreeState {
            height: self.height,
            leaves: self.leaves.clone(),
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Keyed store of tree records.
///
/// Writers to the same id are not coordinated; callers serialize their own
/// writes per id.
pub trait TreeStore: Send + Sync {
    fn save(&self, record: &StoredTree) -> Result<(), StoreError>;
    fn load(&self, id: &str) -> Result<Option<StoredTree>, StoreError>;
    fn delete(&self, id: &str) -> Result<(), StoreError>;
    fn clear_all(&self) -> Result<(), StoreError>;
}

/// Restore a tree from the store.
///
/// Any load failure is logged and reported as "no state", so the caller
/// rebuilds from chain data instead of trusting a broken record. A cached
/// root that disagrees with the leaves is logged; the leaves win.
pub fn load_tree(
    store: &dyn TreeStore,
    hasher: &PoseidonHasher,
    id: &TreeId,
) -> Option<(SparseMerkleTree, StoredTree)> {
    let key = id.to_string();
    let record = match store.load(&key) {
        Ok(Some(record)) => record,
        Ok(None) => {
            debug!(id = %key, "no stored tree");
            return None;
        }
        Err(e) => {
            warn!(id = %key, error = %e, "failed to load stored tree; treating as absent");
            return None;
        }
    };

    let mut tree = match SparseMerkleTree::from_state(hasher.clone(), &record.state()) {
        Ok(tree) => tree,
        Err(e) => {
            warn!(id = %key, error = %e, "stored tree is invalid; treating as absent");
            return None;
        }
    };

    let root = tree.root();
    if root != record.root {
        warn!(id = %key, leaves = record.leaves.len(), "stored root does not match recomputed root");
    }
    info!(id = %key, leaves = tree.leaf_count(), "restored tree");
    Some((tree, StoredTree { root, ..record }))
}

/// Volatile store for tests and short-lived processes.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, StoredTree>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TreeStore for MemoryStore {
    fn save(&self, record: &StoredTree) -> Result<(), StoreError> {
        let mut records = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn load(&self, id: &str) -> Result<Option<StoredTree>, StoreError> {
        let records = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(records.get(id).cloned())
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut records = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        records.remove(id);
        Ok(())
    }

    fn clear_all(&self) -> Result<(), StoreError> {
        let mut records = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        records.clear();
        Ok(())
    }
}

/// One JSON file per tree in a directory.
///
/// Writes go to a temporary file in the same directory which is then
/// renamed over the record, so a crash never leaves a partial leaf set.
pub struct FileStore {
    dir: PathBuf,
}

const RECORD_EXT: &str = "json";

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, StoreError> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidId(id.to_string()));
        }
        Ok(self.dir.join(format!("{}.{}", id, RECORD_EXT)))
    }
}

impl TreeStore for FileStore {
    fn save(&self, record: &StoredTree) -> Result<(), StoreError> {
        let path = self.path_for(&record.id)?;
        let bytes = serde_json::to_vec(record)?;

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;

        debug!(id = %record.id, leaves = record.leaves.len(), "saved tree");
        Ok(())
    }

    fn load(&self, id: &str) -> Result<Option<StoredTree>, StoreError> {
        let path = self.path_for(id)?;
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let record: StoredTree = serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
            id: id.to_string(),
            reason: e.to_string(),
        })?;
        if record.id != id {
            return Err(StoreError::Corrupt {
                id: id.to_string(),
                reason: format!("record is for {}", record.id),
            });
        }
        Ok(Some(record))
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        match std::fs::remove_file(self.path_for(id)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn clear_all(&self) -> Result<(), StoreError> {
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(RECORD_EXT) {
                std::fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}
