//! Confirmation window: the not-yet-final tail of the chain.
//!
//! Holds up to `depth` block headers (oldest first), each with a deferred
//! transaction fetch. The window fills up first; after that every new block
//! pushes the oldest one out, and that block is the one being confirmed.
//! Rollbacks only ever cut the tail of the window.

use crate::error::IndexerError;
use crate::types::{BlockHeader, BlockPoint, Tx};

/// Deferred transaction decoding for a pending block.
///
/// Called when the block is promoted; a successful result is kept, so the
/// fetch runs to completion at most once.
pub type TxFetcher = Box<dyn FnMut() -> Result<Vec<Tx>, IndexerError> + Send>;

/// Transactions of a pending block, decoded or not.
pub enum TxSource {
    Deferred(TxFetcher),
    Fetched(Vec<Tx>),
}

impl TxSource {
    pub fn fetched(&self) -> Option<&[Tx]> {
        match self {
            Self::Fetched(txs) => Some(txs),
            Self::Deferred(_) => None,
        }
    }
}

impl std::fmt::Debug for TxSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Deferred(_) => write!(f, "Deferred"),
            Self::Fetched(txs) => write!(f, "Fetched({} txs)", txs.len()),
        }
    }
}

/// A block header waiting for enough descendants to be confirmed.
#[derive(Debug)]
pub struct PendingBlock {
    pub header: BlockHeader,
    txs: TxSource,
}

impl PendingBlock {
    pub fn new(header: BlockHeader, fetch: TxFetcher) -> Self {
        Self {
            header,
            txs: TxSource::Deferred(fetch),
        }
    }

    /// Decode the block's transactions unless that already happened.
    pub fn materialize(&mut self) -> Result<&[Tx], IndexerError> {
        if let TxSource::Deferred(fetch) = &mut self.txs {
            let txs = fetch()?;
            self.txs = TxSource::Fetched(txs);
        }
        Ok(self.txs.fetched().unwrap_or_default())
    }

    pub fn is_fetched(&self) -> bool {
        self.txs.fetched().is_some()
    }
}

/// Sliding window of unconfirmed blocks.
#[derive(Debug)]
pub struct ConfirmationWindow {
    /// Oldest first.
    entries: Vec<PendingBlock>,
    depth: usize,
}

impl ConfirmationWindow {
    /// Create a window that confirms a block once `depth` blocks sit on top of it.
    pub fn new(depth: usize) -> Self {
        Self {
            entries: Vec::with_capacity(depth),
            depth,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `true` once the next forward extension confirms the head.
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.depth
    }

    /// Most recent unconfirmed block.
    pub fn tip(&self) -> Option<&BlockHeader> {
        self.entries.last().map(|b| &b.header)
    }

    /// The block next in line for confirmation.
    pub fn head_mut(&mut self) -> Option<&mut PendingBlock> {
        self.entries.first_mut()
    }

    pub fn headers(&self) -> impl Iterator<Item = &BlockHeader> {
        self.entries.iter().map(|b| &b.header)
    }

    /// Append a block while the window is still filling.
    pub fn push(&mut self, block: PendingBlock) {
        self.entries.push(block);
    }

    /// Drop the head and append `block`, returning the dropped head.
    ///
    /// The remaining entries are moved into a fresh allocation so nothing
    /// keeps the discarded entry's slot alive.
    pub fn slide(&mut self, block: PendingBlock) -> Option<PendingBlock> {
        let mut old = std::mem::take(&mut self.entries).into_iter();
        let confirmed = old.next();

        let mut entries = Vec::with_capacity(self.depth.max(old.len() + 1));
        entries.extend(old);
        entries.push(block);
        self.entries = entries;

        confirmed
    }

    /// Cut the window back so the block at `point` becomes its tip.
    ///
    /// Returns the number of dropped blocks, or `None` if `point` is not in
    /// the window (the window is left untouched).
    pub fn rollback_to(&mut self, point: &BlockPoint) -> Option<usize> {
        // linear is fine, the window never holds more than `depth` blocks
        let i = self.entries.iter().rposition(|b| b.header.is_at(point))?;
        let dropped = self.entries.len() - (i + 1);
        self.entries.truncate(i + 1);
        Some(dropped)
    }

    /// Drop every unconfirmed block, returning how many there were.
    pub fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries = Vec::with_capacity(self.depth);
        dropped
    }
}
