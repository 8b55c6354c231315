//! Block confirmation pipeline.
//!
//! For one block leaving the confirmation window:
//! filter → UTXO delta → stage in one [`WriteUnit`](crate::store::WriteUnit) → commit.
//! Nothing in memory changes here; the caller advances its state only after
//! this returns `Ok`.

use std::sync::Arc;

use tracing::info;

use crate::error::IndexerError;
use crate::filter::AddressFilter;
use crate::store::UtxoStore;
use crate::types::{BlockHeader, BlockPoint, FullBlock, Tx};
use crate::utxo::{CaptureMode, UtxoDelta};

/// Result of a committed confirmation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    /// Present only when the block had transactions of interest.
    pub full_block: Option<FullBlock>,
    pub latest_block_point: BlockPoint,
}

pub struct ConfirmationPipeline {
    filter: AddressFilter,
    capture: CaptureMode,
    store: Arc<dyn UtxoStore>,
}

impl ConfirmationPipeline {
    pub fn new(filter: AddressFilter, capture: CaptureMode, store: Arc<dyn UtxoStore>) -> Self {
        Self {
            filter,
            capture,
            store,
        }
    }

    pub fn filter(&self) -> &AddressFilter {
        &self.filter
    }

    pub fn capture_mode(&self) -> CaptureMode {
        self.capture
    }

    /// Persist the confirmation of `header` with all of its transactions.
    ///
    /// Without a header nothing is confirmed: the store is not touched and
    /// `Ok(None)` means the latest confirmed position is unchanged.
    pub async fn process_confirmed_block(
        &self,
        header: Option<&BlockHeader>,
        all_txs: &[Tx],
    ) -> Result<Option<Confirmation>, IndexerError> {
        let Some(header) = header else {
            return Ok(None);
        };

        let txs_of_interest = self
            .filter
            .txs_of_interest(all_txs, self.store.as_ref())
            .await?;
        let delta = UtxoDelta::compute(self.capture, all_txs, &txs_of_interest, &self.filter);
        let (added, removed, matched) = (
            delta.to_add.len(),
            delta.to_remove.len(),
            txs_of_interest.len(),
        );

        let full_block =
            (!txs_of_interest.is_empty()).then(|| FullBlock::new(header, txs_of_interest));
        let latest_block_point = header.point();

        let mut unit = self.store.open_write_unit();
        if let Some(block) = &full_block {
            unit.add_confirmed_block(block.clone());
        }
        unit.set_latest_block_point(latest_block_point.clone())
            .add_outputs(delta.to_add)
            .remove_outputs(delta.to_remove);

        self.store.commit(unit).await?;

        info!(
            slot = header.block_slot,
            number = header.block_number,
            txs = all_txs.len(),
            of_interest = matched,
            utxos_added = added,
            utxos_removed = removed,
            "Block confirmed"
        );

        Ok(Some(Confirmation {
            full_block,
            latest_block_point,
        }))
    }
}
