//! Handler traits at the two edges of the indexer.
//!
//! - [`BlockSyncerHandler`] is implemented by the indexer and driven by the
//!   chain-sync client.
//! - [`ConfirmedBlockHandler`] is implemented by the downstream consumer and
//!   called once per confirmed block that carries transactions of interest.

use async_trait::async_trait;

use crate::error::IndexerError;
use crate::types::{BlockHeader, BlockPoint, ChainTip, FullBlock};
use crate::window::TxFetcher;

/// Trait for consumers of confirmed blocks.
///
/// Delivery is at-most-once: the block is already committed when this is
/// called, and an error returned here is only logged.
#[async_trait]
pub trait ConfirmedBlockHandler: Send + Sync {
    async fn on_confirmed_block(&self, block: &FullBlock) -> Result<(), IndexerError>;
}

/// Consumer that ignores every confirmed block.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBlockHandler;

#[async_trait]
impl ConfirmedBlockHandler for NoopBlockHandler {
    async fn on_confirmed_block(&self, _block: &FullBlock) -> Result<(), IndexerError> {
        Ok(())
    }
}

/// Trait the chain-sync client drives, in strict chain order.
///
/// An error for which [`IndexerError::is_fatal`] holds must stop syncing;
/// any other error may be retried after reconnecting.
#[async_trait]
pub trait BlockSyncerHandler: Send {
    /// A new block extends the chain. `fetch` decodes its transactions on demand.
    async fn roll_forward(
        &mut self,
        header: BlockHeader,
        fetch: TxFetcher,
        tip: &ChainTip,
    ) -> Result<(), IndexerError>;

    /// The chain was rolled back to `point`.
    async fn roll_backward(&mut self, point: &BlockPoint, tip: &ChainTip)
        -> Result<(), IndexerError>;

    /// The confirmed position to intersect the upstream chain at.
    async fn sync_block_point(&mut self) -> Result<BlockPoint, IndexerError>;

    /// Number of the next block the driver should expect.
    ///
    /// Only meaningful once the confirmed position is known: call
    /// [`sync_block_point`](Self::sync_block_point) first. Until then an
    /// empty indexer answers 0 even if the store already holds a confirmed
    /// block.
    fn next_block_number(&self) -> u64;
}
