//! Write-Ahead Log (WAL)
//!
//! Durability protocol: the record for a write is appended to the WAL
//! before that write is considered durable. This module speaks only the
//! on-disk record format and truncation-tolerant replay; batching, fsync
//! cadence, and the producer queue belong to [`crate::batcher`].
//!
//! ## Wire format
//! ```text
//! op(u8) ‖ klen(u32 LE) ‖ [vlen(u32 LE)] ‖ key ‖ [value]
//! ```
//! `vlen` and `value` are present only when `op == SET` (`0x01`); a `DEL`
//! record (`0x02`) is exactly `op ‖ klen ‖ key`.

mod record;
mod writer;
mod reader;
mod recovery;

pub use record::{Operation, OP_DEL, OP_SET};
pub use writer::WalWriter;
pub use reader::{WalIterator, WalReader};
pub use recovery::replay_into;
