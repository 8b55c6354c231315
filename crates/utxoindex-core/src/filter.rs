//! Address filter: decides which transactions are of interest.
//!
//! A transaction is of interest when one of its outputs pays a watched
//! address, or one of its inputs spends a stored output that belonged to a
//! watched address. Which side is checked is set by [`AddressCheck`].
//! An empty watch list matches everything.

use std::collections::HashSet;

use crate::error::IndexerError;
use crate::indexer::AddressCheck;
use crate::store::UtxoStore;
use crate::types::Tx;

#[derive(Debug, Clone)]
pub struct AddressFilter {
    addresses: HashSet<String>,
    check: AddressCheck,
}

impl AddressFilter {
    pub fn new<I, A>(addresses: I, check: AddressCheck) -> Result<Self, IndexerError>
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        if !check.inputs() && !check.outputs() {
            return Err(IndexerError::Config(
                "block indexer must at least check outputs or inputs".into(),
            ));
        }
        Ok(Self {
            addresses: addresses.into_iter().map(Into::into).collect(),
            check,
        })
    }

    pub fn check(&self) -> AddressCheck {
        self.check
    }

    /// `true` if no address is watched, i.e. every transaction matches.
    pub fn is_wildcard(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn is_watched(&self, address: &str) -> bool {
        self.addresses.contains(address)
    }

    /// Any output pays a watched address (only when outputs are checked).
    pub fn outputs_match(&self, tx: &Tx) -> bool {
        self.check.outputs() && tx.outputs.iter().any(|out| self.is_watched(&out.address))
    }

    /// Any input spends a stored output of a watched address (only when inputs are checked).
    ///
    /// One store lookup per input; the first lookup error aborts.
    pub async fn inputs_match(&self, tx: &Tx, store: &dyn UtxoStore) -> Result<bool, IndexerError> {
        if !self.check.inputs() {
            return Ok(false);
        }
        for input in &tx.inputs {
            if let Some(output) = store.output_at(input).await? {
                if self.is_watched(&output.address) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Transactions of interest, in block order.
    pub async fn txs_of_interest(
        &self,
        txs: &[Tx],
        store: &dyn UtxoStore,
    ) -> Result<Vec<Tx>, IndexerError> {
        if self.is_wildcard() {
            return Ok(txs.to_vec());
        }

        let mut result = Vec::new();
        for tx in txs {
            if self.outputs_match(tx) || self.inputs_match(tx, store).await? {
                result.push(tx.clone());
            }
        }
        Ok(result)
    }
}
