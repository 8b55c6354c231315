//! UTXO delta: which outputs a confirmed block adds to the store and which
//! it spends.

use serde::{Deserialize, Serialize};

use crate::filter::AddressFilter;
use crate::types::{Tx, TxInput, TxInputOutput};

/// How much of each confirmed block ends up in the UTXO store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureMode {
    /// Every output is stored and every input is removed, watched or not.
    AllOutputs,
    /// Only outputs paying watched addresses are stored.
    Interest,
}

impl CaptureMode {
    pub fn from_keep_all(keep_all_tx_outputs: bool) -> Self {
        if keep_all_tx_outputs {
            Self::AllOutputs
        } else {
            Self::Interest
        }
    }
}

/// Outputs to persist and outpoints to remove for one confirmed block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UtxoDelta {
    pub to_add: Vec<TxInputOutput>,
    pub to_remove: Vec<TxInput>,
}

impl UtxoDelta {
    /// Compute the delta under `mode`.
    ///
    /// `all_txs` is the whole block; `txs_of_interest` the filtered subset.
    pub fn compute(
        mode: CaptureMode,
        all_txs: &[Tx],
        txs_of_interest: &[Tx],
        filter: &AddressFilter,
    ) -> Self {
        match mode {
            CaptureMode::AllOutputs => Self::all(all_txs),
            CaptureMode::Interest => Self::of_interest(txs_of_interest, filter),
        }
    }

    /// Every output created and every input spent by `txs`.
    pub fn all(txs: &[Tx]) -> Self {
        Self {
            to_add: txs.iter().flat_map(|tx| tx.utxos()).collect(),
            to_remove: txs.iter().flat_map(|tx| tx.inputs.iter().cloned()).collect(),
        }
    }

    /// Outputs paying watched addresses and every input of the transactions
    /// of interest.
    ///
    /// Stored outputs are only ever read back to match spends, so without
    /// input checking the delta is empty.
    pub fn of_interest(txs: &[Tx], filter: &AddressFilter) -> Self {
        if !filter.check().inputs() {
            return Self::default();
        }

        Self {
            to_add: txs
                .iter()
                .flat_map(|tx| tx.utxos())
                .filter(|utxo| filter.is_watched(&utxo.output.address))
                .collect(),
            to_remove: txs.iter().flat_map(|tx| tx.inputs.iter().cloned()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}
