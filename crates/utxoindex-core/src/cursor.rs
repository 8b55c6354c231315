//! Sync cursor: tracks the latest confirmed position in the chain.

use tracing::info;

use crate::error::IndexerError;
use crate::store::UtxoStore;
use crate::types::BlockPoint;

/// Latest confirmed block point, resolved lazily.
///
/// On first use the cursor asks the store, then falls back to the configured
/// starting point, then to [`BlockPoint::origin`].
#[derive(Debug, Clone)]
pub struct SyncCursor {
    latest: Option<BlockPoint>,
    starting: Option<BlockPoint>,
}

impl SyncCursor {
    pub fn new(starting: Option<BlockPoint>) -> Self {
        Self {
            latest: None,
            starting,
        }
    }

    /// The cached position, if it was already resolved.
    pub fn latest(&self) -> Option<&BlockPoint> {
        self.latest.as_ref()
    }

    /// Resolve (once) and return the latest confirmed position.
    pub async fn sync_point(&mut self, store: &dyn UtxoStore) -> Result<BlockPoint, IndexerError> {
        if let Some(point) = &self.latest {
            return Ok(point.clone());
        }

        let (point, source) = match store.latest_block_point().await? {
            Some(point) => (point, "store"),
            None => match &self.starting {
                Some(point) => (point.clone(), "config"),
                None => (BlockPoint::origin(), "origin"),
            },
        };
        info!(
            slot = point.block_slot,
            number = point.block_number,
            hash = %point.hash_hex(),
            source,
            "Resolved sync point"
        );

        self.latest = Some(point.clone());
        Ok(point)
    }

    /// Move the cursor to a newly confirmed block.
    pub fn advance(&mut self, point: BlockPoint) {
        self.latest = Some(point);
    }

    /// Number of the block following the confirmed position.
    ///
    /// Before [`sync_point`](Self::sync_point) resolves the cursor this
    /// assumes nothing was confirmed yet and returns 0.
    pub fn next_block_number(&self) -> u64 {
        self.latest
            .as_ref()
            .map_or(0, BlockPoint::next_block_number)
    }
}
