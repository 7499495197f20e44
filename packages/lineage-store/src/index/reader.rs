//! Read side of the index files

use byteorder::{BigEndian, ByteOrder};
use rustc_hash::FxHashMap;
use std::path::Path;

use super::builder::{INX_HEADER_LEN, NO_LINK};
use super::collation::{collation_key, Particles};
use super::name::NAME_TABLE_SIZE;
use crate::codec::{self, FromValue};
use crate::domain::{Iper, Istr};
use crate::error::{Result, StorageError};
use crate::store::blob::Blob;

fn read_u32(bytes: &[u8], pos: usize, what: &str) -> Result<u32> {
    bytes
        .get(pos..pos + 4)
        .map(BigEndian::read_u32)
        .ok_or_else(|| StorageError::corrupted(format!("{} truncated at byte {}", what, pos)))
}

// ═══════════════════════════════════════════════════════════════════════════
// Name Hash Table
// ═══════════════════════════════════════════════════════════════════════════

/// `names.inx` + `names.acc`
#[derive(Debug)]
pub struct NameIndex {
    inx: Blob,
    acc: Blob,
}

impl NameIndex {
    pub(crate) fn open(inx: &Path, acc: &Path) -> Result<Self> {
        Ok(Self {
            inx: Blob::open_optional(inx)?,
            acc: Blob::open_optional(acc)?,
        })
    }

    /// Persons filed under `bucket`, ascending.
    pub fn bucket(&self, bucket: usize) -> Result<Vec<Iper>> {
        if self.inx.is_empty() || bucket >= NAME_TABLE_SIZE {
            return Ok(Vec::new());
        }
        let pos = read_u32(&self.acc, bucket * 4, "names.acc")? as usize;
        let value = codec::decode_at(&self.inx, pos)?;
        Vec::<Iper>::from_value(&value)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Sorted Indices
// ═══════════════════════════════════════════════════════════════════════════

/// `snames.inx`/`snames.dat` or `fnames.inx`/`fnames.dat`
#[derive(Debug)]
pub struct SortedIndex {
    entries: Vec<(Istr, u32)>,
    positions: FxHashMap<Istr, usize>,
    dat: Blob,
}

impl SortedIndex {
    pub(crate) fn open(inx: &Path, dat: &Path) -> Result<Self> {
        let inx_blob = Blob::open_optional(inx)?;
        let mut entries = Vec::new();
        if !inx_blob.is_empty() {
            let count = read_u32(&inx_blob, 0, "sorted index header")? as usize;
            let start = read_u32(&inx_blob, 4, "sorted index header")?;
            if start < INX_HEADER_LEN {
                return Err(StorageError::corrupted(format!(
                    "Sorted index data starts at {}",
                    start
                )));
            }
            let list = codec::decode_at(&inx_blob, start as usize)?;
            for entry in list.as_seq()? {
                let pair = entry.as_record(0, 2)?;
                entries.push((Istr::from_value(&pair[0])?, u32::from_value(&pair[1])?));
            }
            if entries.len() != count {
                return Err(StorageError::corrupted(format!(
                    "Sorted index lists {} entries, header says {}",
                    entries.len(),
                    count
                )));
            }
        }
        let positions = entries
            .iter()
            .enumerate()
            .map(|(i, (istr, _))| (*istr, i))
            .collect();
        Ok(Self {
            entries,
            positions,
            dat: Blob::open_optional(dat)?,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, istr: Istr) -> bool {
        self.positions.contains_key(&istr)
    }

    /// Strings in collation order.
    pub fn istrs(&self) -> impl Iterator<Item = Istr> + '_ {
        self.entries.iter().map(|(istr, _)| *istr)
    }

    pub fn first(&self) -> Option<Istr> {
        self.entries.first().map(|(istr, _)| *istr)
    }

    /// The entry after `istr` in collation order.
    pub fn next(&self, istr: Istr) -> Option<Istr> {
        let pos = *self.positions.get(&istr)?;
        self.entries.get(pos + 1).map(|(istr, _)| *istr)
    }

    /// Persons filed under `istr` at the last rebuild.
    pub fn persons_of(&self, istr: Istr) -> Result<Vec<Iper>> {
        let Some(pos) = self.positions.get(&istr) else {
            return Ok(Vec::new());
        };
        let offset = self.entries[*pos].1 as usize;
        let count = read_u32(&self.dat, offset, "sorted index data")? as usize;
        (0..count)
            .map(|k| read_u32(&self.dat, offset + 4 + 4 * k, "sorted index data").map(Iper))
            .collect()
    }

    /// Index of the first entry whose collation key is not below `key`.
    pub fn lower_bound<F>(&self, key: &str, particles: &Particles, string: F) -> Result<usize>
    where
        F: Fn(Istr) -> Result<String>,
    {
        let (mut lo, mut hi) = (0, self.entries.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let mid_key = collation_key(&string(self.entries[mid].0)?, particles);
            if mid_key.as_str() < key {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }

    pub fn istr_at(&self, pos: usize) -> Option<Istr> {
        self.entries.get(pos).map(|(istr, _)| *istr)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// String Hash Table
// ═══════════════════════════════════════════════════════════════════════════

/// `strings.inx`
#[derive(Debug)]
pub struct StringTable {
    blob: Blob,
    size: usize,
}

impl StringTable {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let blob = Blob::open_optional(path)?;
        let size = if blob.is_empty() {
            0
        } else {
            read_u32(&blob, 0, "strings.inx")? as usize
        };
        Ok(Self { blob, size })
    }

    pub fn table_size(&self) -> usize {
        self.size
    }

    /// Strings whose hash lands in the bucket of `hash`, most recent first.
    pub fn chain(&self, hash: u32) -> Result<Vec<Istr>> {
        if self.size == 0 {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        let mut cursor = read_u32(&self.blob, 4 + 4 * (hash as usize % self.size), "strings.inx")?;
        while cursor != NO_LINK {
            if out.len() > self.blob.len() / 4 {
                return Err(StorageError::corrupted("Cycle in strings.inx chain"));
            }
            out.push(Istr(cursor));
            cursor = read_u32(
                &self.blob,
                4 + 4 * (self.size + cursor as usize),
                "strings.inx",
            )?;
        }
        Ok(out)
    }
}
