//! Indexer configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::IndexerError;
use crate::types::BlockPoint;

/// Which side of a transaction is checked against the watched addresses.
///
/// Serialized as the raw bitmask: `1` inputs, `2` outputs, `3` both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressCheck(u8);

impl AddressCheck {
    pub const NONE: Self = Self(0);
    pub const INPUTS: Self = Self(1 << 0);
    pub const OUTPUTS: Self = Self(1 << 1);
    pub const ALL: Self = Self(Self::INPUTS.0 | Self::OUTPUTS.0);

    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn inputs(self) -> bool {
        self.0 & Self::INPUTS.0 != 0
    }

    pub fn outputs(self) -> bool {
        self.0 & Self::OUTPUTS.0 != 0
    }
}

impl Default for AddressCheck {
    fn default() -> Self {
        Self::ALL
    }
}

impl std::ops::BitOr for AddressCheck {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::fmt::Display for AddressCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.inputs(), self.outputs()) {
            (true, true) => write!(f, "inputs+outputs"),
            (true, false) => write!(f, "inputs"),
            (false, true) => write!(f, "outputs"),
            (false, false) => write!(f, "none"),
        }
    }
}

/// Configuration for a block indexer instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexerConfig {
    /// Where to start when the store holds no confirmed position yet.
    pub starting_block_point: Option<BlockPoint>,
    /// How many child blocks are needed for a block to be considered final.
    pub confirmation_block_count: u64,
    /// Watched addresses. Empty = every transaction is of interest.
    pub addresses_of_interest: Vec<String>,
    /// Persist every output of every confirmed block, not just watched ones.
    pub keep_all_tx_outputs_in_db: bool,
    pub address_check: AddressCheck,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            starting_block_point: None,
            confirmation_block_count: 10,
            addresses_of_interest: Vec::new(),
            keep_all_tx_outputs_in_db: false,
            address_check: AddressCheck::ALL,
        }
    }
}

impl IndexerConfig {
    /// Reject configurations the indexer cannot run with.
    pub fn validate(&self) -> Result<(), IndexerError> {
        if !self.address_check.inputs() && !self.address_check.outputs() {
            return Err(IndexerError::Config(
                "block indexer must at least check outputs or inputs".into(),
            ));
        }
        if self.confirmation_block_count == 0 {
            return Err(IndexerError::Config(
                "confirmationBlockCount must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, IndexerError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| IndexerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, IndexerError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| IndexerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }
}
