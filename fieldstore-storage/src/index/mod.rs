//! Secondary index set.
//!
//! Grounded on `DbIndex<IndexedField>` (`dbindex.hpp`), `Indices<...>`
//! (`dbindices.hpp`), and the persistence format in `index_persistence.hpp`.
//! Each indexed field gets one ordered multimap from field value to
//! storage location; duplicate values keep insertion order, matching
//! `std::multimap`'s stable-insert behavior.

use crate::format::verify_checksum;
use crate::io::{FileIo, OpenMode, StorageIo};
use crate::record_codec::{read_scalar, write_scalar};
use fieldstore_core::{FieldDescriptor, FieldValue, Result, ScalarType};
use sha3::{Digest, Sha3_256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub type StorageLocation = u64;

/// One field's ordered multimap from value to storage location.
#[derive(Debug, Default)]
pub struct FieldIndex {
    entries: BTreeMap<FieldValue, Vec<StorageLocation>>,
}

impl FieldIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, value: &FieldValue) -> &[StorageLocation] {
        self.entries.get(value).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Inserts `(value, location)`, rejecting it if the exact pair is
    /// already present. Returns whether the pair was actually inserted.
    pub fn add(&mut self, value: FieldValue, location: StorageLocation) -> bool {
        let locations = self.entries.entry(value).or_default();
        if locations.contains(&location) {
            return false;
        }
        locations.push(location);
        true
    }

    /// Removes one occurrence of `(value, location)`. Returns whether a
    /// matching entry was found.
    pub fn remove_one(&mut self, value: &FieldValue, location: StorageLocation) -> bool {
        let Some(locations) = self.entries.get_mut(value) else {
            return false;
        };
        if let Some(pos) = locations.iter().position(|&l| l == location) {
            locations.remove(pos);
            if locations.is_empty() {
                self.entries.remove(value);
            }
            true
        } else {
            false
        }
    }

    /// Removes every location registered for `value`, returning how many
    /// were removed.
    pub fn remove_all(&mut self, value: &FieldValue) -> usize {
        self.entries.remove(value).map(|v| v.len()).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldValue, StorageLocation)> {
        self.entries
            .iter()
            .flat_map(|(v, locs)| locs.iter().map(move |&l| (v, l)))
    }

    fn save(&self, path: impl AsRef<Path>, _element_type: ScalarType) -> Result<()> {
        let mut io = FileIo::open(path, OpenMode::Write)?;
        io.write_u64(self.len() as u64)?;

        let mut hasher = Sha3_256::new();
        for (value, location) in self.iter() {
            let mut scratch = crate::io::GrowableBufferIo::new();
            write_scalar(&mut scratch, value)?;
            hasher.update(scratch.as_slice());
            io.write_all(scratch.as_slice())?;

            hasher.update(location.to_le_bytes());
            io.write_u64(location)?;
        }

        let hash = truncated_hash(hasher);
        io.write_u64(hash)?;
        io.flush()
    }

    fn load(path: impl AsRef<Path>, element_type: ScalarType) -> Result<Self> {
        let mut index = Self::new();
        let mut io = FileIo::open(path, OpenMode::Read)?;

        let count = io.read_u64()?;
        let mut hasher = Sha3_256::new();
        for _ in 0..count {
            let value = read_scalar(&mut io, element_type)?;
            let mut scratch = crate::io::GrowableBufferIo::new();
            write_scalar(&mut scratch, &value)?;
            hasher.update(scratch.as_slice());

            let location = io.read_u64()?;
            hasher.update(location.to_le_bytes());

            index.add(value, location);
        }

        let stored_hash = io.read_u64()?;
        verify_checksum("index", truncated_hash(hasher), stored_hash)?;
        Ok(index)
    }
}

fn truncated_hash(hasher: Sha3_256) -> u64 {
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

/// Maps from the field's name to a filesystem-safe index file name,
/// mirroring `Index::detail::normalizedFileName`: alphanumerics, spaces,
/// commas and underscores pass through; `<`/`>` become `[`/`]`; everything
/// else becomes `-`.
fn normalized_file_name(name: &str) -> String {
    name.chars()
        .map(|ch| {
            if ch.is_alphanumeric() || ch == ' ' || ch == ',' || ch == '_' {
                ch
            } else if ch == '<' {
                '['
            } else if ch == '>' {
                ']'
            } else {
                '-'
            }
        })
        .collect()
}

/// Composes one [`FieldIndex`] per indexed field.
#[derive(Default)]
pub struct IndexSet {
    indices: BTreeMap<u8, (FieldDescriptor, FieldIndex)>,
}

impl IndexSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_field(&mut self, descriptor: FieldDescriptor) {
        self.indices
            .entry(descriptor.id)
            .or_insert_with(|| (descriptor, FieldIndex::new()));
    }

    pub fn has_index(&self, field_id: u8) -> bool {
        self.indices.contains_key(&field_id)
    }

    pub fn index(&self, field_id: u8) -> Option<&FieldIndex> {
        self.indices.get(&field_id).map(|(_, idx)| idx)
    }

    pub fn index_mut(&mut self, field_id: u8) -> Option<&mut FieldIndex> {
        self.indices.get_mut(&field_id).map(|(_, idx)| idx)
    }

    fn file_path(dir: &Path, descriptor: &FieldDescriptor) -> PathBuf {
        dir.join(format!("{}.index", normalized_file_name(descriptor.name)))
    }

    pub fn save_all(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        for (descriptor, index) in self.indices.values() {
            index.save(Self::file_path(dir, descriptor), descriptor.element_type)?;
        }
        Ok(())
    }

    pub fn load_all(&mut self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        for (descriptor, index) in self.indices.values_mut() {
            *index = FieldIndex::load(Self::file_path(dir, descriptor), descriptor.element_type)?;
        }
        Ok(())
    }
}
