//! The storage engine: an append-only data file with free-space reuse, a
//! crash-recoverable write-ahead log in front of it, and secondary indices
//! over arbitrary fields. Built on the record reflection traits from
//! `fieldstore-core`; this crate adds everything that touches bytes on
//! disk.

pub mod fam;
mod format;
pub mod index;
pub mod io;
mod ops;
mod record_codec;
pub mod wal;

pub use fam::{FileAllocationManager, NO_GAP};
pub use index::{FieldIndex, IndexSet, StorageLocation};
pub use io::{BoundedBufferIo, FileIo, GrowableBufferIo, OpenMode, StorageIo};
pub use ops::{AppendPayload, CompletionMarker, OpCodec, OpId, OpStatus, Operation};
pub use record_codec::RecordCodec;
pub use wal::{Wal, WalConfig, WalMetrics};
