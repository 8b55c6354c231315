//! In-memory storage backend.
//!
//! Stores the UTXO set, confirmed blocks, and the latest confirmed point in
//! RAM. Useful for tests and short-lived indexers that don't need persistence.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use utxoindex_core::error::IndexerError;
use utxoindex_core::store::{UtxoStore, WriteUnit};
use utxoindex_core::types::{BlockPoint, FullBlock, TxInput, TxInputOutput, TxOutput};

#[derive(Default)]
struct State {
    latest: Option<BlockPoint>,
    utxos: HashMap<TxInput, TxOutput>,
    blocks: Vec<FullBlock>,
}

/// In-memory UTXO store.
///
/// All data is lost when the process exits. A whole [`WriteUnit`] is applied
/// under one lock, so readers never observe half a confirmation.
#[derive(Default)]
pub struct InMemoryUtxoStore {
    state: Mutex<State>,
    fail_next_commit: AtomicBool,
    fail_lookups: AtomicBool,
}

impl InMemoryUtxoStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next `commit` fail without applying anything.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Make every `output_at` lookup fail until switched off again.
    pub fn fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    /// Seed an output directly (e.g. one created before the starting point).
    pub fn insert_output(&self, utxo: TxInputOutput) {
        self.state().utxos.insert(utxo.input, utxo.output);
    }

    /// Unspent outputs held by `address`, ordered by outpoint.
    pub fn outputs_by_address(&self, address: &str) -> Vec<TxInputOutput> {
        let mut utxos: Vec<_> = self
            .state()
            .utxos
            .iter()
            .filter(|(_, out)| out.address == address)
            .map(|(input, output)| TxInputOutput {
                input: input.clone(),
                output: output.clone(),
            })
            .collect();
        utxos.sort_by(|a, b| a.input.cmp(&b.input));
        utxos
    }

    /// Total number of tracked unspent outputs.
    pub fn utxo_count(&self) -> usize {
        self.state().utxos.len()
    }

    /// Confirmed blocks in confirmation order.
    pub fn confirmed_blocks(&self) -> Vec<FullBlock> {
        self.state().blocks.clone()
    }

    pub fn confirmed_block_count(&self) -> usize {
        self.state().blocks.len()
    }
}

#[async_trait]
impl UtxoStore for InMemoryUtxoStore {
    async fn latest_block_point(&self) -> Result<Option<BlockPoint>, IndexerError> {
        Ok(self.state().latest.clone())
    }

    async fn output_at(&self, input: &TxInput) -> Result<Option<TxOutput>, IndexerError> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(IndexerError::Storage(format!("lookup of {input} failed")));
        }
        Ok(self.state().utxos.get(input).cloned())
    }

    async fn commit(&self, unit: WriteUnit) -> Result<(), IndexerError> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(IndexerError::Storage("commit rejected".into()));
        }

        let mut state = self.state();
        let (added, removed) = (unit.outputs_to_add.len(), unit.outputs_to_remove.len());

        for utxo in unit.outputs_to_add {
            state.utxos.insert(utxo.input, utxo.output);
        }
        for input in &unit.outputs_to_remove {
            state.utxos.remove(input);
        }
        if let Some(block) = unit.confirmed_block {
            state.blocks.push(block);
        }
        if let Some(point) = unit.latest_block_point {
            debug!(slot = point.block_slot, number = point.block_number, added, removed, "unit committed");
            state.latest = Some(point);
        }
        Ok(())
    }
}
