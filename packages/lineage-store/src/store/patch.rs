//! Patch overlay
//!
//! Each record kind has one [`PatchTable`]: a next-free-index counter plus
//! a map from index to the replacement record. A base keeps two sets of
//! tables, the committed ones persisted in the `patches` file and the
//! pending ones that only live in memory until `commit_patches`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use tracing::warn;

use super::header::{strip_magic, PATCHES_MAGIC};
use crate::codec::{self, FromValue, ToValue, Value};
use crate::domain::{Ascend, Couple, Descend, Family, Ifam, Iper, Person, Record, Union};
use crate::error::{Result, StorageError};

#[derive(Debug, Clone, PartialEq)]
pub struct PatchTable<T> {
    next: usize,
    entries: BTreeMap<usize, T>,
}

impl<T> Default for PatchTable<T> {
    fn default() -> Self {
        Self {
            next: 0,
            entries: BTreeMap::new(),
        }
    }
}

impl<T: Record> PatchTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, i: usize) -> Option<&T> {
        self.entries.get(&i)
    }

    pub fn insert(&mut self, i: usize, record: T) {
        self.reserve(i + 1);
        self.entries.insert(i, record);
    }

    /// Next index not yet claimed by this table.
    pub fn next(&self) -> usize {
        self.next
    }

    /// Claim every index below `n`.
    pub fn reserve(&mut self, n: usize) {
        self.next = self.next.max(n);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.entries.iter().map(|(i, r)| (*i, r))
    }

    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.keys().copied()
    }

    /// Move every entry of `other` into this table, `other` winning.
    pub fn absorb(&mut self, other: PatchTable<T>) {
        self.reserve(other.next);
        self.entries.extend(other.entries);
    }

    pub fn clear(&mut self) {
        self.next = 0;
        self.entries.clear();
    }
}

impl<T: Record> ToValue for PatchTable<T> {
    fn to_value(&self) -> Value {
        let entries = self
            .entries
            .iter()
            .map(|(i, r)| Value::block(0, vec![Value::Int(*i as i64), r.to_value()]))
            .collect();
        Value::block(0, vec![Value::Int(self.next as i64), Value::seq(entries)])
    }
}

impl<T: Record> FromValue for PatchTable<T> {
    fn from_value(value: &Value) -> Result<Self> {
        let f = value.as_record(0, 2)?;
        let next = u32::from_value(&f[0])? as usize;
        let mut entries = BTreeMap::new();
        for entry in f[1].as_seq()? {
            let pair = entry.as_record(0, 2)?;
            let index = u32::from_value(&pair[0])? as usize;
            entries.insert(index, T::from_value(&pair[1])?);
        }
        Ok(Self { next, entries })
    }
}

/// One patch table per record kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patches {
    pub persons: PatchTable<Person>,
    pub ascends: PatchTable<Ascend>,
    pub unions: PatchTable<Union>,
    pub families: PatchTable<Family>,
    pub couples: PatchTable<Couple>,
    pub descends: PatchTable<Descend>,
    pub strings: PatchTable<String>,
}

impl Patches {
    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
            && self.ascends.is_empty()
            && self.unions.is_empty()
            && self.families.is_empty()
            && self.couples.is_empty()
            && self.descends.is_empty()
            && self.strings.is_empty()
    }

    pub fn person_count(&self) -> usize {
        self.persons
            .next()
            .max(self.ascends.next())
            .max(self.unions.next())
    }

    pub fn family_count(&self) -> usize {
        self.families
            .next()
            .max(self.couples.next())
            .max(self.descends.next())
    }

    pub fn string_count(&self) -> usize {
        self.strings.next()
    }

    /// Persons with any patched person-indexed record.
    pub fn touched_persons(&self) -> BTreeSet<Iper> {
        self.persons
            .indices()
            .chain(self.ascends.indices())
            .chain(self.unions.indices())
            .map(|i| Iper(i as u32))
            .collect()
    }

    pub fn touched_families(&self) -> BTreeSet<Ifam> {
        self.families
            .indices()
            .chain(self.couples.indices())
            .chain(self.descends.indices())
            .map(|i| Ifam(i as u32))
            .collect()
    }

    pub fn absorb(&mut self, other: Patches) {
        self.persons.absorb(other.persons);
        self.ascends.absorb(other.ascends);
        self.unions.absorb(other.unions);
        self.families.absorb(other.families);
        self.couples.absorb(other.couples);
        self.descends.absorb(other.descends);
        self.strings.absorb(other.strings);
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = PATCHES_MAGIC.to_vec();
        codec::try_encode(&self.to_value(), &mut buf)?;
        Ok(buf)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let body = strip_magic(bytes, PATCHES_MAGIC)?;
        let (value, _) = codec::decode(body)?;
        Self::from_value(&value)
    }

    /// Read the committed patches file. A missing file, or one with a
    /// foreign magic, reads as no patches.
    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let bytes = std::fs::read(path)?;
        match Self::from_bytes(&bytes) {
            Err(e) if e.is_format_not_recognized() => {
                warn!(path = %path.display(), "Ignoring patches file with unknown format");
                Ok(Self::default())
            }
            other => other,
        }
    }
}

impl ToValue for Patches {
    fn to_value(&self) -> Value {
        Value::block(
            0,
            vec![
                self.persons.to_value(),
                self.ascends.to_value(),
                self.unions.to_value(),
                self.families.to_value(),
                self.couples.to_value(),
                self.descends.to_value(),
                self.strings.to_value(),
            ],
        )
    }
}

impl FromValue for Patches {
    fn from_value(value: &Value) -> Result<Self> {
        let f = value.as_record(0, 7).map_err(|e| {
            StorageError::corrupted(format!("Malformed patches file: {}", e.message))
        })?;
        Ok(Patches {
            persons: PatchTable::from_value(&f[0])?,
            ascends: PatchTable::from_value(&f[1])?,
            unions: PatchTable::from_value(&f[2])?,
            families: PatchTable::from_value(&f[3])?,
            couples: PatchTable::from_value(&f[4])?,
            descends: PatchTable::from_value(&f[5])?,
            strings: PatchTable::from_value(&f[6])?,
        })
    }
}
