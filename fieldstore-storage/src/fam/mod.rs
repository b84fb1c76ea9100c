//! File allocation manager — gap tracking for the primary data file.
//!
//! Grounded line-for-line on `FileAllocationManager` (`fileallocationmanager.hpp`):
//! a dual-indexed set of free-space gaps (one index keyed by offset, for
//! coalescing adjacent gaps; one keyed by length, for suitable-fit search),
//! automatic consolidation once 1000 insertions have occurred since the
//! last one, and SHA3-based persistence.

use crate::format::verify_checksum;
use crate::io::{FileIo, OpenMode, StorageIo};
use fieldstore_core::Result;
use sha3::{Digest, Sha3_256};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Sentinel returned by [`FileAllocationManager::take_suitable_gap`] when no
/// gap large enough exists.
pub const NO_GAP: u64 = u64::MAX;

const CONSOLIDATION_THRESHOLD: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Gap {
    location: u64,
    length: u64,
}

impl Gap {
    fn end_offset(&self) -> u64 {
        self.location + self.length
    }
}

/// Tracks free byte ranges ("gaps") in a backing data file so deleted
/// record space can be reused by future inserts.
#[derive(Debug, Default)]
pub struct FileAllocationManager {
    /// offset -> length, ordered by offset for adjacency checks during
    /// consolidation.
    by_offset: BTreeMap<u64, u64>,
    /// length -> set of offsets with that length, for suitable-fit search.
    by_length: BTreeMap<u64, BTreeSet<u64>>,
    insertions_since_last_consolidation: u64,
}

impl FileAllocationManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_gap(&mut self, offset: u64, length: u64) {
        if length == 0 {
            return;
        }
        self.by_offset.insert(offset, length);
        self.by_length.entry(length).or_default().insert(offset);
        self.insertions_since_last_consolidation += 1;
    }

    fn remove_gap(&mut self, offset: u64, length: u64) {
        self.by_offset.remove(&offset);
        if let Some(offsets) = self.by_length.get_mut(&length) {
            offsets.remove(&offset);
            if offsets.is_empty() {
                self.by_length.remove(&length);
            }
        }
    }

    /// Finds and removes a gap at least `requested_length` bytes long,
    /// splitting off and re-registering any remainder. Returns [`NO_GAP`]
    /// if none is available even after an automatic consolidation pass.
    pub fn take_suitable_gap(&mut self, requested_length: u64) -> u64 {
        debug_assert!(requested_length > 0);

        let found = self
            .by_length
            .range(requested_length..)
            .next()
            .and_then(|(&length, offsets)| offsets.iter().next().map(|&offset| (offset, length)));

        let (offset, length) = match found {
            Some(found) => found,
            None => {
                if self.insertions_since_last_consolidation < CONSOLIDATION_THRESHOLD {
                    return NO_GAP;
                }
                self.consolidate_gaps();
                return self.take_suitable_gap(requested_length);
            }
        };

        self.remove_gap(offset, length);
        if length != requested_length {
            debug_assert!(length > requested_length);
            self.register_gap(offset + requested_length, length - requested_length);
        }

        offset
    }

    /// Merges adjacent gaps (`gap.end_offset() == next_gap.location`) into
    /// single larger gaps, walking the offset-ordered index once.
    pub fn consolidate_gaps(&mut self) {
        if self.by_offset.len() < 2 {
            self.insertions_since_last_consolidation = 0;
            return;
        }

        let gaps: Vec<Gap> = self
            .by_offset
            .iter()
            .map(|(&location, &length)| Gap { location, length })
            .collect();

        let mut merged = Vec::with_capacity(gaps.len());
        let mut current = gaps[0];
        for next in &gaps[1..] {
            debug_assert!(current.end_offset() <= next.location, "overlapping gaps");
            if current.end_offset() == next.location {
                current.length += next.length;
            } else {
                merged.push(current);
                current = *next;
            }
        }
        merged.push(current);

        self.by_offset.clear();
        self.by_length.clear();
        for gap in merged {
            self.by_offset.insert(gap.location, gap.length);
            self.by_length
                .entry(gap.length)
                .or_default()
                .insert(gap.location);
        }

        self.insertions_since_last_consolidation = 0;
    }

    pub fn size(&self) -> usize {
        self.by_offset.len()
    }

    pub fn clear(&mut self) {
        self.by_offset.clear();
        self.by_length.clear();
        self.insertions_since_last_consolidation = 0;
    }

    /// Persists the gap set as `count, (length, offset)*, truncated-SHA3-256
    /// hash` — the exact layout `FileAllocationManager::saveToFile` writes.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut io = FileIo::open(path, OpenMode::Write)?;
        io.write_u64(self.by_offset.len() as u64)?;

        let mut hasher = Sha3_256::new();
        for (&location, &length) in &self.by_offset {
            hasher.update(length.to_le_bytes());
            hasher.update(location.to_le_bytes());
            io.write_u64(length)?;
            io.write_u64(location)?;
        }

        let hash = truncated_hash(hasher);
        io.write_u64(hash)?;
        io.flush()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut fam = Self::new();
        let mut io = FileIo::open(path, OpenMode::Read)?;

        let count = io.read_u64()?;
        let mut hasher = Sha3_256::new();
        for _ in 0..count {
            let length = io.read_u64()?;
            let location = io.read_u64()?;
            hasher.update(length.to_le_bytes());
            hasher.update(location.to_le_bytes());
            fam.register_gap(location, length);
        }

        let stored_hash = io.read_u64()?;
        verify_checksum("FAM", truncated_hash(hasher), stored_hash)?;
        Ok(fam)
    }
}

fn truncated_hash(hasher: Sha3_256) -> u64 {
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn take_suitable_gap_returns_no_gap_when_empty() {
        let mut fam = FileAllocationManager::new();
        assert_eq!(fam.take_suitable_gap(10), NO_GAP);
    }

    #[test]
    fn take_suitable_gap_splits_remainder_back_into_the_set() {
        let mut fam = FileAllocationManager::new();
        fam.register_gap(0, 100);
        let offset = fam.take_suitable_gap(40);
        assert_eq!(offset, 0);
        assert_eq!(fam.size(), 1);
        assert_eq!(fam.take_suitable_gap(60), 40);
        assert_eq!(fam.size(), 0);
    }

    #[test]
    fn take_suitable_gap_picks_the_smallest_sufficient_gap() {
        let mut fam = FileAllocationManager::new();
        fam.register_gap(0, 50);
        fam.register_gap(100, 200);
        assert_eq!(fam.take_suitable_gap(80), 100);
    }

    #[test]
    fn consolidate_merges_adjacent_gaps() {
        let mut fam = FileAllocationManager::new();
        fam.register_gap(0, 10);
        fam.register_gap(10, 20);
        fam.register_gap(50, 5);
        fam.consolidate_gaps();
        assert_eq!(fam.size(), 2);
        assert_eq!(fam.take_suitable_gap(30), 0);
    }

    #[test]
    fn consolidation_triggers_automatically_after_threshold_misses() {
        let mut fam = FileAllocationManager::new();
        for i in 0..1000u64 {
            fam.register_gap(i * 10, 5);
        }
        fam.register_gap(9990, 5);
        fam.register_gap(9995, 5);
        // Adjacent gaps now form a contiguous run; a direct search for a
        // larger-than-5 gap will miss until consolidation runs.
        assert_ne!(fam.take_suitable_gap(10), NO_GAP);
    }

    #[test]
    fn save_and_load_round_trip_with_valid_checksum() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fam.dat");

        let mut fam = FileAllocationManager::new();
        fam.register_gap(0, 10);
        fam.register_gap(100, 20);
        fam.save(&path).unwrap();

        let loaded = FileAllocationManager::load(&path).unwrap();
        assert_eq!(loaded.size(), 2);
    }

    #[test]
    fn load_rejects_corrupted_file() {
        use std::io::Write;

        let dir = tempdir().unwrap();
        let path = dir.path().join("fam.dat");

        let mut fam = FileAllocationManager::new();
        fam.register_gap(0, 10);
        fam.save(&path).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let mut file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.write_all(&bytes).unwrap();

        assert!(FileAllocationManager::load(&path).is_err());
    }
}
