//! utxoindex-core: confirmation-aware, reorg-safe UTXO indexing.
//!
//! # Architecture
//!
//! ```text
//! chain-sync client ──roll_forward / roll_backward──▶ BlockIndexer
//!                                                       ├── ConfirmationWindow   (unconfirmed tail, lazy tx fetch)
//!                                                       ├── ConfirmationPipeline (filter → UTXO delta → atomic commit)
//!                                                       │     ├── AddressFilter  (watched addresses, input/output policy)
//!                                                       │     └── UtxoDelta      (full capture / interest only)
//!                                                       ├── SyncCursor           (latest confirmed point)
//!                                                       ├── UtxoStore            (memory / SQLite)
//!                                                       └── ConfirmedBlockHandler (downstream consumer)
//! ```

pub mod block_indexer;
pub mod cursor;
pub mod error;
pub mod filter;
pub mod handler;
pub mod indexer;
pub mod pipeline;
pub mod store;
pub mod types;
pub mod utxo;
pub mod window;

pub use block_indexer::BlockIndexer;
pub use cursor::SyncCursor;
pub use error::IndexerError;
pub use filter::AddressFilter;
pub use handler::{BlockSyncerHandler, ConfirmedBlockHandler, NoopBlockHandler};
pub use indexer::{AddressCheck, IndexerConfig};
pub use pipeline::{Confirmation, ConfirmationPipeline};
pub use store::{UtxoStore, WriteUnit};
pub use types::{BlockHeader, BlockPoint, ChainTip, FullBlock, Tx, TxInput, TxInputOutput, TxOutput};
pub use utxo::{CaptureMode, UtxoDelta};
pub use window::{ConfirmationWindow, PendingBlock, TxFetcher, TxSource};
