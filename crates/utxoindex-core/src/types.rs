//! Shared types for the indexing pipeline.

use serde::{Deserialize, Serialize};

// ─── BlockPoint ───────────────────────────────────────────────────────────────

/// Identity of a chain position.
///
/// Chain continuity is decided by `(slot, hash)`; `number` is carried along
/// for sequencing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockPoint {
    pub block_slot: u64,
    #[serde(with = "hex::serde")]
    pub block_hash: Vec<u8>,
    pub block_number: u64,
}

impl BlockPoint {
    pub fn new(block_slot: u64, block_hash: impl Into<Vec<u8>>, block_number: u64) -> Self {
        Self {
            block_slot,
            block_hash: block_hash.into(),
            block_number,
        }
    }

    /// The "before genesis" marker used when nothing was ever confirmed.
    pub fn origin() -> Self {
        Self {
            block_slot: 0,
            block_hash: Vec::new(),
            block_number: u64::MAX,
        }
    }

    pub fn is_origin(&self) -> bool {
        self.block_slot == 0 && self.block_hash.is_empty() && self.block_number == u64::MAX
    }

    /// Returns `true` if this point sits at `(slot, hash)`.
    pub fn is_at(&self, slot: u64, hash: &[u8]) -> bool {
        self.block_slot == slot && self.block_hash == hash
    }

    /// Number of the block that follows this point. The origin is followed by block 0.
    pub fn next_block_number(&self) -> u64 {
        if self.is_origin() {
            0
        } else {
            self.block_number + 1
        }
    }

    /// Hex-encoded block hash, for logs and error messages.
    pub fn hash_hex(&self) -> String {
        hex::encode(&self.block_hash)
    }
}

// ─── BlockHeader / ChainTip ──────────────────────────────────────────────────

/// Header of a block observed on a forward extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    pub block_slot: u64,
    #[serde(with = "hex::serde")]
    pub block_hash: Vec<u8>,
    pub block_number: u64,
}

impl BlockHeader {
    pub fn new(block_slot: u64, block_hash: impl Into<Vec<u8>>, block_number: u64) -> Self {
        Self {
            block_slot,
            block_hash: block_hash.into(),
            block_number,
        }
    }

    pub fn point(&self) -> BlockPoint {
        BlockPoint::new(self.block_slot, self.block_hash.clone(), self.block_number)
    }

    /// Returns `true` if this header is the block at `point`.
    pub fn is_at(&self, point: &BlockPoint) -> bool {
        self.block_slot == point.block_slot && self.block_hash == point.block_hash
    }
}

/// Tip of the upstream chain as reported alongside each sync event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainTip {
    pub point: BlockPoint,
    pub block_number: u64,
}

// ─── Transactions ─────────────────────────────────────────────────────────────

/// Reference to a previously created output: `(tx hash, output index)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxInput {
    pub hash: String,
    pub index: u32,
}

impl TxInput {
    pub fn new(hash: impl Into<String>, index: u32) -> Self {
        Self {
            hash: hash.into(),
            index,
        }
    }
}

impl std::fmt::Display for TxInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.hash, self.index)
    }
}

/// Value locked at an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub address: String,
    pub amount: u64,
}

impl TxOutput {
    pub fn new(address: impl Into<String>, amount: u64) -> Self {
        Self {
            address: address.into(),
            amount,
        }
    }
}

/// An unspent output together with the outpoint that created it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInputOutput {
    pub input: TxInput,
    pub output: TxOutput,
}

/// Transaction view used by the indexer, decoupled from the ledger encoding.
///
/// `outputs` keeps the ledger order: the position of an output is its index
/// in the outpoint that later spends it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tx {
    pub hash: String,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl Tx {
    pub fn new(hash: impl Into<String>, inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        Self {
            hash: hash.into(),
            inputs,
            outputs,
        }
    }

    /// Outputs paired with the outpoints they create.
    pub fn utxos(&self) -> impl Iterator<Item = TxInputOutput> + '_ {
        self.outputs.iter().enumerate().map(|(ind, out)| TxInputOutput {
            input: TxInput::new(self.hash.clone(), ind as u32),
            output: out.clone(),
        })
    }
}

// ─── FullBlock ────────────────────────────────────────────────────────────────

/// A confirmed block with its transactions of interest; delivered downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullBlock {
    pub block_slot: u64,
    #[serde(with = "hex::serde")]
    pub block_hash: Vec<u8>,
    pub block_number: u64,
    pub txs: Vec<Tx>,
}

impl FullBlock {
    pub fn new(header: &BlockHeader, txs: Vec<Tx>) -> Self {
        Self {
            block_slot: header.block_slot,
            block_hash: header.block_hash.clone(),
            block_number: header.block_number,
            txs,
        }
    }

    pub fn point(&self) -> BlockPoint {
        BlockPoint::new(self.block_slot, self.block_hash.clone(), self.block_number)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
