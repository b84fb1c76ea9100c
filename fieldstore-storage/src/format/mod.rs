//! Checksum verification shared by the on-disk formats in this crate.
//!
//! The FAM and secondary index files both end with a truncated SHA3-256
//! hash over everything that precedes it; the WAL block format ends with a
//! CRC32 over everything but the checksum field itself. Both follow the
//! same "calculate, compare, report a `Corruption` error" shape.

use fieldstore_core::{Error, Result};

/// Verifies a calculated checksum against the one stored on disk.
///
/// `what` names the file format in the error message (e.g. `"FAM"`,
/// `"index"`, `"WAL block"`).
pub fn verify_checksum(what: &str, calculated: u64, stored: u64) -> Result<()> {
    if calculated == stored {
        Ok(())
    } else {
        Err(Error::Corruption(format!(
            "{what} checksum mismatch: expected {stored:#x}, got {calculated:#x}"
        )))
    }
}
