//! Persistence contract for confirmed state.
//!
//! The indexer durably keeps two things: the set of tracked unspent outputs
//! and the latest confirmed block point. Everything staged for one confirmed
//! block goes into a single [`WriteUnit`] that the store applies atomically.

use async_trait::async_trait;

use crate::error::IndexerError;
use crate::types::{BlockPoint, FullBlock, TxInput, TxInputOutput, TxOutput};

/// Changes staged for one confirmation step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteUnit {
    pub confirmed_block: Option<FullBlock>,
    pub latest_block_point: Option<BlockPoint>,
    pub outputs_to_add: Vec<TxInputOutput>,
    pub outputs_to_remove: Vec<TxInput>,
}

impl WriteUnit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_confirmed_block(&mut self, block: FullBlock) -> &mut Self {
        self.confirmed_block = Some(block);
        self
    }

    pub fn set_latest_block_point(&mut self, point: BlockPoint) -> &mut Self {
        self.latest_block_point = Some(point);
        self
    }

    pub fn add_outputs(&mut self, outputs: Vec<TxInputOutput>) -> &mut Self {
        self.outputs_to_add.extend(outputs);
        self
    }

    pub fn remove_outputs(&mut self, inputs: Vec<TxInput>) -> &mut Self {
        self.outputs_to_remove.extend(inputs);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.confirmed_block.is_none()
            && self.latest_block_point.is_none()
            && self.outputs_to_add.is_empty()
            && self.outputs_to_remove.is_empty()
    }
}

/// Trait for the durable store behind the indexer.
///
/// Implementations live in `utxoindex-storage` (`InMemoryUtxoStore`,
/// `SqliteUtxoStore`).
#[async_trait]
pub trait UtxoStore: Send + Sync {
    /// Latest confirmed block point, if any block was ever confirmed.
    async fn latest_block_point(&self) -> Result<Option<BlockPoint>, IndexerError>;

    /// Look up a stored (unspent) output.
    async fn output_at(&self, input: &TxInput) -> Result<Option<TxOutput>, IndexerError>;

    /// Start staging a new set of changes.
    fn open_write_unit(&self) -> WriteUnit {
        WriteUnit::new()
    }

    /// Apply every staged change, or none of them.
    ///
    /// Outputs are added before removals are applied, so an output created
    /// and spent inside the same unit does not survive.
    async fn commit(&self, unit: WriteUnit) -> Result<(), IndexerError>;
}
