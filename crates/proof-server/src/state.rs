//! Shared server state: the prover, the tree cache and its backing store.
//!
//! Each tree sits behind its own lock, and all tree work (restoring,
//! hashing, saving) runs on the blocking pool.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use ark_bn254::Fr;
use tokio::sync::Mutex;
use tracing::{info, warn};

use swap_circuits::{MerkleProof, PoseidonHasher, SparseMerkleTree};
use swap_prover::{
    check_root, load_tree, RootHistory, RootStatus, SpendProver, StoredTree, TreeId, TreeStore,
};

use crate::error::ApiError;

/// A live tree and its sync bookkeeping.
struct TreeEntry {
    tree: SparseMerkleTree,
    last_synced_block: u64,
}

/// Lazily restored tree; `None` until first use.
type TreeSlot = Arc<Mutex<Option<TreeEntry>>>;

/// Summary of one tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeSummary {
    pub root: Fr,
    pub height: usize,
    pub leaf_count: u64,
    pub last_synced_block: u64,
}

/// Application state shared across handlers
pub struct AppState {
    pub hasher: PoseidonHasher,
    pub prover: SpendProver,
    tree_height: usize,
    store: Arc<dyn TreeStore>,
    roots: RootHistory,
    trees: Mutex<HashMap<TreeId, TreeSlot>>,
}

impl AppState {
    pub fn new(
        hasher: PoseidonHasher,
        prover: SpendProver,
        store: Arc<dyn TreeStore>,
        root_window: usize,
    ) -> Self {
        Self {
            tree_height: prover.depth(),
            hasher,
            prover,
            store,
            roots: RootHistory::new(root_window),
            trees: Mutex::new(HashMap::new()),
        }
    }

    pub fn tree_height(&self) -> usize {
        self.tree_height
    }

    /// Run `f` on the tree for `id` on the blocking pool, restoring it from
    /// the store or starting an empty one on first use.
    ///
    /// Calls on the same tree are serialized; other trees are not blocked.
    async fn with_tree<T, F>(self: &Arc<Self>, id: &TreeId, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&AppState, &TreeId, &mut TreeEntry) -> Result<T, ApiError> + Send + 'static,
    {
        let slot = {
            let mut trees = self.trees.lock().await;
            Arc::clone(trees.entry(id.clone()).or_default())
        };
        let mut guard = slot.lock_owned().await;

        let state = Arc::clone(self);
        let id = id.clone();
        tokio::task::spawn_blocking(move || {
            if guard.is_none() {
                *guard = Some(state.restore(&id)?);
            }
            match guard.as_mut() {
                Some(entry) => f(&*state, &id, entry),
                None => Err(ApiError::Internal(format!("tree {} was not restored", id))),
            }
        })
        .await
        .map_err(|e| ApiError::Internal(format!("tree task failed: {}", e)))?
    }

    fn restore(&self, id: &TreeId) -> Result<TreeEntry, ApiError> {
        if let Some((mut tree, record)) = load_tree(self.store.as_ref(), &self.hasher, id) {
            if tree.height() == self.tree_height {
                self.record_root(tree.root());
                return Ok(TreeEntry {
                    tree,
                    last_synced_block: record.last_synced_block,
                });
            }
            warn!(
                id = %id,
                stored = tree.height(),
                expected = self.tree_height,
                "stored tree height does not match; starting empty"
            );
        }
        info!(id = %id, height = self.tree_height, "starting empty tree");
        let tree = SparseMerkleTree::new(self.hasher.clone(), self.tree_height)?;
        Ok(TreeEntry {
            tree,
            last_synced_block: 0,
        })
    }

    fn record_root(&self, root: Fr) {
        if let Err(e) = self.roots.record(root) {
            warn!(error = %e, "could not record root");
        }
    }

    /// Append commitments and persist the tree.
    ///
    /// Returns the indices assigned to the new leaves and the new root. The
    /// served tree only changes once the record is saved, so a failed save
    /// can be retried without shifting any index.
    pub async fn insert(
        self: &Arc<Self>,
        id: &TreeId,
        commitments: Vec<Fr>,
        synced_block: Option<u64>,
    ) -> Result<(Range<u64>, Fr), ApiError> {
        self.with_tree(id, move |state, id, entry| {
            let mut tree = entry.tree.clone();
            let range = tree.insert_many(&commitments)?;
            let last_synced_block = synced_block
                .map_or(entry.last_synced_block, |block| entry.last_synced_block.max(block));

            let record = StoredTree::from_tree(id, &mut tree, last_synced_block);
            state.store.save(&record)?;

            entry.tree = tree;
            entry.last_synced_block = last_synced_block;
            state.record_root(record.root);
            info!(id = %id, inserted = commitments.len(), leaves = range.end, "tree updated");
            Ok((range, record.root))
        })
        .await
    }

    pub async fn summary(self: &Arc<Self>, id: &TreeId) -> Result<TreeSummary, ApiError> {
        self.with_tree(id, |_, _, entry| {
            Ok(TreeSummary {
                root: entry.tree.root(),
                height: entry.tree.height(),
                leaf_count: entry.tree.leaf_count(),
                last_synced_block: entry.last_synced_block,
            })
        })
        .await
    }

    pub async fn proof(self: &Arc<Self>, id: &TreeId, leaf_index: u64) -> Result<MerkleProof, ApiError> {
        self.with_tree(id, move |_, _, entry| Ok(entry.tree.proof(leaf_index)?))
            .await
    }

    /// Whether `root` is among the recent roots of the served trees.
    pub fn root_status(&self, root: &Fr) -> RootStatus {
        check_root(&self.roots, root)
    }
}
