//! The block indexer: driven by the chain-sync client.
//!
//! Forward extensions fill the [`ConfirmationWindow`]; once it is full each
//! new block confirms the oldest pending one through the
//! [`ConfirmationPipeline`]. Rollbacks cut the window, fall back to the last
//! confirmed block, or fail fatally when confirmed state would have to be
//! undone.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::cursor::SyncCursor;
use crate::error::IndexerError;
use crate::filter::AddressFilter;
use crate::handler::{BlockSyncerHandler, ConfirmedBlockHandler};
use crate::indexer::IndexerConfig;
use crate::pipeline::ConfirmationPipeline;
use crate::store::UtxoStore;
use crate::types::{BlockHeader, BlockPoint, ChainTip};
use crate::utxo::CaptureMode;
use crate::window::{ConfirmationWindow, PendingBlock, TxFetcher};

pub struct BlockIndexer {
    pipeline: ConfirmationPipeline,
    window: ConfirmationWindow,
    cursor: SyncCursor,
    store: Arc<dyn UtxoStore>,
    handler: Arc<dyn ConfirmedBlockHandler>,
}

impl BlockIndexer {
    /// Build an indexer for one sync session.
    ///
    /// Fails with [`IndexerError::Config`] if neither inputs nor outputs are
    /// checked or the confirmation depth is zero.
    pub fn new(
        config: IndexerConfig,
        store: Arc<dyn UtxoStore>,
        handler: Arc<dyn ConfirmedBlockHandler>,
    ) -> Result<Self, IndexerError> {
        config.validate()?;

        let depth = usize::try_from(config.confirmation_block_count)
            .map_err(|e| IndexerError::Config(e.to_string()))?;
        let filter = AddressFilter::new(config.addresses_of_interest, config.address_check)?;
        let capture = CaptureMode::from_keep_all(config.keep_all_tx_outputs_in_db);

        Ok(Self {
            pipeline: ConfirmationPipeline::new(filter, capture, store.clone()),
            window: ConfirmationWindow::new(depth),
            cursor: SyncCursor::new(config.starting_block_point),
            store,
            handler,
        })
    }

    /// Latest confirmed block point, if already resolved.
    pub fn latest_block_point(&self) -> Option<&BlockPoint> {
        self.cursor.latest()
    }

    /// Headers of the unconfirmed blocks, oldest first.
    pub fn unconfirmed(&self) -> impl Iterator<Item = &BlockHeader> {
        self.window.headers()
    }

    pub fn pipeline(&self) -> &ConfirmationPipeline {
        &self.pipeline
    }
}

#[async_trait]
impl BlockSyncerHandler for BlockIndexer {
    async fn roll_forward(
        &mut self,
        header: BlockHeader,
        fetch: TxFetcher,
        tip: &ChainTip,
    ) -> Result<(), IndexerError> {
        if !self.window.is_full() {
            // not enough children yet to confirm anything
            debug!(
                slot = header.block_slot,
                number = header.block_number,
                tip = tip.block_number,
                pending = self.window.len() + 1,
                "Block added to confirmation window"
            );
            self.window.push(PendingBlock::new(header, fetch));
            return Ok(());
        }

        let head = self
            .window
            .head_mut()
            .ok_or_else(|| IndexerError::Other("confirmation window is empty".into()))?;
        let confirmed_header = head.header.clone();
        let txs = head.materialize()?;

        let confirmation = self
            .pipeline
            .process_confirmed_block(Some(&confirmed_header), txs)
            .await?;

        // committed: only now advance in-memory state
        let full_block = match confirmation {
            Some(confirmation) => {
                self.cursor.advance(confirmation.latest_block_point);
                confirmation.full_block
            }
            None => None,
        };
        self.window.slide(PendingBlock::new(header, fetch));

        if let Some(block) = full_block {
            if let Err(err) = self.handler.on_confirmed_block(&block).await {
                warn!(
                    number = block.block_number,
                    error = %err,
                    "Confirmed block handler failed"
                );
            }
        }

        Ok(())
    }

    async fn roll_backward(
        &mut self,
        point: &BlockPoint,
        tip: &ChainTip,
    ) -> Result<(), IndexerError> {
        if let Some(dropped) = self.window.rollback_to(point) {
            debug!(
                slot = point.block_slot,
                dropped,
                tip = tip.block_number,
                "Rolled back unconfirmed blocks"
            );
            return Ok(());
        }

        let latest = self.cursor.sync_point(self.store.as_ref()).await?;
        if latest.is_at(point.block_slot, &point.block_hash) {
            // reverting to the latest confirmed block is fine
            let dropped = self.window.clear();
            info!(
                slot = point.block_slot,
                dropped,
                "Rolled back to latest confirmed block"
            );
            return Ok(());
        }

        warn!(
            slot = point.block_slot,
            hash = %point.hash_hex(),
            confirmed_slot = latest.block_slot,
            "Rollback target below confirmed block"
        );
        Err(IndexerError::RollbackTargetNotFound {
            slot: point.block_slot,
            hash: point.hash_hex(),
        })
    }

    async fn sync_block_point(&mut self) -> Result<BlockPoint, IndexerError> {
        self.cursor.sync_point(self.store.as_ref()).await
    }

    fn next_block_number(&self) -> u64 {
        match self.window.tip() {
            Some(tip) => tip.block_number + 1,
            None => self.cursor.next_block_number(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::AddressCheck;
    use crate::store::WriteUnit;
    use crate::types::{FullBlock, Tx, TxInput, TxOutput};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Mutex;

    // ─── Test doubles ─────────────────────────────────────────────────────────

    #[derive(Default)]
    struct FakeStore {
        latest: Mutex<Option<BlockPoint>>,
        utxos: Mutex<HashMap<TxInput, TxOutput>>,
        blocks: Mutex<Vec<FullBlock>>,
        commits: AtomicU32,
        fail_commit: AtomicBool,
    }

    #[async_trait]
    impl UtxoStore for FakeStore {
        async fn latest_block_point(&self) -> Result<Option<BlockPoint>, IndexerError> {
            Ok(self.latest.lock().unwrap().clone())
        }

        async fn output_at(&self, input: &TxInput) -> Result<Option<TxOutput>, IndexerError> {
            Ok(self.utxos.lock().unwrap().get(input).cloned())
        }

        async fn commit(&self, unit: WriteUnit) -> Result<(), IndexerError> {
            if self.fail_commit.load(Ordering::Relaxed) {
                return Err(IndexerError::Storage("commit failed".into()));
            }
            self.commits.fetch_add(1, Ordering::Relaxed);
            let mut utxos = self.utxos.lock().unwrap();
            for utxo in unit.outputs_to_add {
                utxos.insert(utxo.input, utxo.output);
            }
            for input in &unit.outputs_to_remove {
                utxos.remove(input);
            }
            if let Some(block) = unit.confirmed_block {
                self.blocks.lock().unwrap().push(block);
            }
            if let Some(point) = unit.latest_block_point {
                *self.latest.lock().unwrap() = Some(point);
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct Collector {
        blocks: Mutex<Vec<FullBlock>>,
        fail: bool,
    }

    #[async_trait]
    impl ConfirmedBlockHandler for Collector {
        async fn on_confirmed_block(&self, block: &FullBlock) -> Result<(), IndexerError> {
            self.blocks.lock().unwrap().push(block.clone());
            if self.fail {
                return Err(IndexerError::Handler {
                    reason: "consumer offline".into(),
                });
            }
            Ok(())
        }
    }

    fn header(number: u64) -> BlockHeader {
        BlockHeader::new(number * 20, vec![0xb0, number as u8], number)
    }

    fn tip() -> ChainTip {
        ChainTip {
            point: header(100).point(),
            block_number: 100,
        }
    }

    fn fetch(txs: Vec<Tx>) -> TxFetcher {
        Box::new(move || Ok(txs.clone()))
    }

    fn empty() -> TxFetcher {
        fetch(vec![])
    }

    fn config(depth: u64, addresses: &[&str], check: AddressCheck) -> IndexerConfig {
        IndexerConfig {
            confirmation_block_count: depth,
            addresses_of_interest: addresses.iter().map(|a| a.to_string()).collect(),
            address_check: check,
            ..Default::default()
        }
    }

    fn indexer(
        config: IndexerConfig,
        store: Arc<FakeStore>,
        handler: Arc<Collector>,
    ) -> BlockIndexer {
        BlockIndexer::new(config, store, handler).unwrap()
    }

    fn window_numbers(indexer: &BlockIndexer) -> Vec<u64> {
        indexer.unconfirmed().map(|h| h.block_number).collect()
    }

    // ─── Tests ────────────────────────────────────────────────────────────────

    #[test]
    fn misconfigured_check_is_rejected() {
        let result = BlockIndexer::new(
            config(2, &[], AddressCheck::NONE),
            Arc::new(FakeStore::default()),
            Arc::new(Collector::default()),
        );
        assert!(matches!(result, Err(IndexerError::Config(_))));
    }

    #[tokio::test]
    async fn confirms_only_after_depth_descendants() {
        let store = Arc::new(FakeStore::default());
        let mut idx = indexer(config(2, &[], AddressCheck::ALL), store.clone(), Arc::default());

        idx.roll_forward(header(1), empty(), &tip()).await.unwrap();
        idx.roll_forward(header(2), empty(), &tip()).await.unwrap();
        assert_eq!(window_numbers(&idx), vec![1, 2]);
        assert_eq!(store.commits.load(Ordering::Relaxed), 0);

        idx.roll_forward(header(3), empty(), &tip()).await.unwrap();
        assert_eq!(window_numbers(&idx), vec![2, 3]);
        assert_eq!(store.commits.load(Ordering::Relaxed), 1);
        assert_eq!(idx.latest_block_point(), Some(&header(1).point()));
    }

    #[tokio::test]
    async fn fetch_runs_only_on_promotion() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut idx = indexer(
            config(1, &[], AddressCheck::ALL),
            Arc::default(),
            Arc::default(),
        );

        let counter = calls.clone();
        let counted: TxFetcher = Box::new(move || {
            counter.fetch_add(1, Ordering::Relaxed);
            Ok(vec![])
        });
        idx.roll_forward(header(1), counted, &tip()).await.unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 0);

        idx.roll_forward(header(2), empty(), &tip()).await.unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn end_to_end_single_watched_output() {
        let store = Arc::new(FakeStore::default());
        let handler = Arc::new(Collector::default());
        let mut idx = indexer(
            config(1, &["addr1"], AddressCheck::OUTPUTS),
            store.clone(),
            handler.clone(),
        );

        let pay = Tx::new("tx1", vec![], vec![TxOutput::new("addr1", 1_000_000)]);
        idx.roll_forward(header(1), fetch(vec![pay.clone()]), &tip())
            .await
            .unwrap();
        idx.roll_forward(header(2), empty(), &tip()).await.unwrap();

        let delivered = handler.blocks.lock().unwrap().clone();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].txs, vec![pay]);
        assert_eq!(delivered[0].point(), header(1).point());
        assert_eq!(idx.latest_block_point(), Some(&header(1).point()));
        assert_eq!(window_numbers(&idx), vec![2]);
        assert_eq!(store.blocks.lock().unwrap().len(), 1);
        // outputs-only matching never reads an output back
        assert!(store.utxos.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn block_without_interest_is_not_delivered() {
        let store = Arc::new(FakeStore::default());
        let handler = Arc::new(Collector::default());
        let mut idx = indexer(
            config(1, &["addr1"], AddressCheck::ALL),
            store.clone(),
            handler.clone(),
        );

        let other = Tx::new("tx1", vec![], vec![TxOutput::new("someone", 5)]);
        idx.roll_forward(header(1), fetch(vec![other]), &tip())
            .await
            .unwrap();
        idx.roll_forward(header(2), empty(), &tip()).await.unwrap();

        assert!(handler.blocks.lock().unwrap().is_empty());
        assert!(store.blocks.lock().unwrap().is_empty());
        // position still advances
        assert_eq!(
            store.latest.lock().unwrap().clone(),
            Some(header(1).point())
        );
    }

    #[tokio::test]
    async fn spend_of_watched_output_is_tracked() {
        let store = Arc::new(FakeStore::default());
        let handler = Arc::new(Collector::default());
        let mut idx = indexer(
            config(1, &["addr1"], AddressCheck::ALL),
            store.clone(),
            handler.clone(),
        );

        let pay = Tx::new("tx1", vec![], vec![TxOutput::new("addr1", 50)]);
        let spend = Tx::new(
            "tx2",
            vec![TxInput::new("tx1", 0)],
            vec![TxOutput::new("shop", 50)],
        );
        idx.roll_forward(header(1), fetch(vec![pay]), &tip()).await.unwrap();
        idx.roll_forward(header(2), fetch(vec![spend]), &tip()).await.unwrap();
        idx.roll_forward(header(3), empty(), &tip()).await.unwrap();

        assert_eq!(handler.blocks.lock().unwrap().len(), 2);
        assert!(store.utxos.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn commit_failure_leaves_state_untouched() {
        let store = Arc::new(FakeStore::default());
        let handler = Arc::new(Collector::default());
        let mut idx = indexer(
            config(2, &[], AddressCheck::ALL),
            store.clone(),
            handler.clone(),
        );
        idx.sync_block_point().await.unwrap();

        let pay = Tx::new("tx1", vec![], vec![TxOutput::new("addr1", 1)]);
        idx.roll_forward(header(1), fetch(vec![pay]), &tip()).await.unwrap();
        idx.roll_forward(header(2), empty(), &tip()).await.unwrap();

        store.fail_commit.store(true, Ordering::Relaxed);
        let err = idx.roll_forward(header(3), empty(), &tip()).await.unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(window_numbers(&idx), vec![1, 2]);
        assert!(idx.latest_block_point().unwrap().is_origin());
        assert!(handler.blocks.lock().unwrap().is_empty());

        // retry succeeds
        store.fail_commit.store(false, Ordering::Relaxed);
        idx.roll_forward(header(3), empty(), &tip()).await.unwrap();
        assert_eq!(window_numbers(&idx), vec![2, 3]);
        assert_eq!(handler.blocks.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn fetch_failure_is_transient() {
        let mut idx = indexer(
            config(1, &[], AddressCheck::ALL),
            Arc::default(),
            Arc::default(),
        );
        let broken: TxFetcher = Box::new(|| Err(IndexerError::TxFetch("bad body".into())));
        idx.roll_forward(header(1), broken, &tip()).await.unwrap();

        let err = idx.roll_forward(header(2), empty(), &tip()).await.unwrap_err();
        assert!(matches!(err, IndexerError::TxFetch(_)));
        assert_eq!(window_numbers(&idx), vec![1]);
    }

    #[tokio::test]
    async fn handler_error_does_not_fail_confirmation() {
        let store = Arc::new(FakeStore::default());
        let handler = Arc::new(Collector {
            fail: true,
            ..Default::default()
        });
        let mut idx = indexer(config(1, &[], AddressCheck::ALL), store.clone(), handler.clone());

        let tx = Tx::new("tx1", vec![], vec![TxOutput::new("a", 1)]);
        idx.roll_forward(header(1), fetch(vec![tx]), &tip()).await.unwrap();
        idx.roll_forward(header(2), empty(), &tip()).await.unwrap();

        assert_eq!(handler.blocks.lock().unwrap().len(), 1);
        assert_eq!(store.commits.load(Ordering::Relaxed), 1);
        assert_eq!(idx.latest_block_point(), Some(&header(1).point()));
    }

    #[tokio::test]
    async fn rollback_into_window_truncates() {
        let mut idx = indexer(config(5, &[], AddressCheck::ALL), Arc::default(), Arc::default());
        for i in 1..=4 {
            idx.roll_forward(header(i), empty(), &tip()).await.unwrap();
        }

        idx.roll_backward(&header(2).point(), &tip()).await.unwrap();
        assert_eq!(window_numbers(&idx), vec![1, 2]);
        assert_eq!(idx.next_block_number(), 3);
    }

    #[tokio::test]
    async fn rollback_to_confirmed_clears_window() {
        let store = Arc::new(FakeStore::default());
        let mut idx = indexer(config(2, &[], AddressCheck::ALL), store, Arc::default());
        for i in 1..=4 {
            idx.roll_forward(header(i), empty(), &tip()).await.unwrap();
        }
        assert_eq!(idx.latest_block_point(), Some(&header(2).point()));

        idx.roll_backward(&header(2).point(), &tip()).await.unwrap();
        assert_eq!(idx.unconfirmed().count(), 0);
        assert_eq!(idx.next_block_number(), 3);
    }

    #[tokio::test]
    async fn rollback_below_confirmed_is_fatal() {
        let mut idx = indexer(config(1, &[], AddressCheck::ALL), Arc::default(), Arc::default());
        for i in 1..=3 {
            idx.roll_forward(header(i), empty(), &tip()).await.unwrap();
        }

        let err = idx
            .roll_backward(&header(1).point(), &tip())
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(window_numbers(&idx), vec![3]);
    }

    #[tokio::test]
    async fn initial_rollback_to_stored_point_before_any_confirmation() {
        let store = Arc::new(FakeStore::default());
        *store.latest.lock().unwrap() = Some(header(7).point());
        let mut idx = indexer(config(2, &[], AddressCheck::ALL), store, Arc::default());

        idx.roll_backward(&header(7).point(), &tip()).await.unwrap();
        assert_eq!(idx.next_block_number(), 8);
    }

    #[tokio::test]
    async fn next_block_number_from_origin() {
        let mut idx = indexer(config(2, &[], AddressCheck::ALL), Arc::default(), Arc::default());
        let point = idx.sync_block_point().await.unwrap();
        assert!(point.is_origin());
        assert_eq!(idx.next_block_number(), 0);

        idx.roll_forward(header(0), empty(), &tip()).await.unwrap();
        assert_eq!(idx.next_block_number(), 1);
    }

    #[tokio::test]
    async fn next_block_number_follows_stored_point_after_sync() {
        let store = Arc::new(FakeStore::default());
        *store.latest.lock().unwrap() = Some(header(7).point());
        let mut idx = indexer(config(2, &[], AddressCheck::ALL), store, Arc::default());

        // unresolved: the stored point is not consulted yet
        assert_eq!(idx.next_block_number(), 0);
        assert!(idx.latest_block_point().is_none());

        idx.sync_block_point().await.unwrap();
        assert_eq!(idx.next_block_number(), 8);
    }

    #[tokio::test]
    async fn no_header_is_a_no_op() {
        let store = Arc::new(FakeStore::default());
        let idx = indexer(config(1, &[], AddressCheck::ALL), store.clone(), Arc::default());
        let result = idx.pipeline().process_confirmed_block(None, &[]).await.unwrap();
        assert!(result.is_none());
        assert_eq!(store.commits.load(Ordering::Relaxed), 0);
        assert!(store.latest.lock().unwrap().is_none());
    }
}
