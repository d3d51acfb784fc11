//! Advisory check of a Merkle root against the verifying contract.
//!
//! The contract keeps a window of recent roots and accepts proofs against
//! any of them, so an unknown root is a warning, not an error. The caller
//! decides whether to submit anyway.

use std::collections::VecDeque;
use std::sync::Mutex;

use ark_bn254::Fr;
use thiserror::Error;
use tracing::{debug, warn};

use swap_circuits::encoding::field_to_hex;

/// Errors from a root oracle.
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Root oracle unavailable: {0}")]
    Unavailable(String),
}

/// Source of truth for which roots the verifier currently accepts.
pub trait RootOracle: Send + Sync {
    fn is_known_root(&self, root: &Fr) -> Result<bool, OracleError>;
}

/// Outcome of [`check_root`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RootStatus {
    Known,
    Unknown,
    Unavailable,
}

impl RootStatus {
    pub fn is_known(self) -> bool {
        self == RootStatus::Known
    }
}

/// Ask the oracle about `root`, logging anything other than a known root.
///
/// Never fails: oracle errors become [`RootStatus::Unavailable`].
pub fn check_root(oracle: &dyn RootOracle, root: &Fr) -> RootStatus {
    match oracle.is_known_root(root) {
        Ok(true) => {
            debug!(root = %field_to_hex(root), "root is known to the verifier");
            RootStatus::Known
        }
        Ok(false) => {
            warn!(
                root = %field_to_hex(root),
                "root is not known to the verifier; the relayer may still accept a historical root"
            );
            RootStatus::Unknown
        }
        Err(e) => {
            warn!(root = %field_to_hex(root), error = %e, "could not check root");
            RootStatus::Unavailable
        }
    }
}

/// In-memory window of the most recent roots.
///
/// Mirrors the verifier's root history for local use and tests. The window
/// size belongs to the verifying contract, so it is a constructor argument.
pub struct RootHistory {
    window: usize,
    roots: Mutex<VecDeque<Fr>>,
}

impl RootHistory {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            roots: Mutex::new(VecDeque::with_capacity(window)),
        }
    }

    /// Record a new current root, evicting the oldest beyond the window.
    pub fn record(&self, root: Fr) -> Result<(), OracleError> {
        let mut roots = self
            .roots
            .lock()
            .map_err(|_| OracleError::Unavailable("root history lock poisoned".to_string()))?;
        if self.window == 0 {
            return Ok(());
        }
        if roots.back() == Some(&root) {
            return Ok(());
        }
        if roots.len() == self.window {
            roots.pop_front();
        }
        roots.push_back(root);
        Ok(())
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

impl RootOracle for RootHistory {
    fn is_known_root(&self, root: &Fr) -> Result<bool, OracleError> {
        let roots = self
            .roots
            .lock()
            .map_err(|_| OracleError::Unavailable("root history lock poisoned".to_string()))?;
        Ok(roots.contains(root))
    }
}
