//! Rebuild of every index file from a full snapshot of the records
//!
//! The output depends only on the input records, so rebuilding an
//! unchanged base yields byte-identical files.

use byteorder::{BigEndian, WriteBytesExt};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tracing::debug;

use super::collation::{CollationEntry, Particles};
use super::name::{legacy_hash, misc_names, NAME_TABLE_SIZE};
use crate::codec::{self, ToValue, Value};
use crate::domain::{Istr, Person, Record};
use crate::error::{Result, StorageError};
use crate::store::files;

/// "No entry" marker in `strings.inx`
pub const NO_LINK: u32 = u32::MAX;

/// Byte size of the `[count][data start]` header of `.inx` files
pub const INX_HEADER_LEN: u32 = 8;

/// Everything the index builder reads
#[derive(Debug, Clone, Copy)]
pub struct IndexInput<'a> {
    pub persons: &'a [Person],
    pub strings: &'a [String],
    pub particles: &'a Particles,
    pub string_table_factor: u32,
}

/// Contents of the index files of one generation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexFiles {
    pub names_inx: Vec<u8>,
    pub names_acc: Vec<u8>,
    pub snames_inx: Vec<u8>,
    pub snames_dat: Vec<u8>,
    pub fnames_inx: Vec<u8>,
    pub fnames_dat: Vec<u8>,
    pub strings_inx: Vec<u8>,
}

impl IndexFiles {
    /// (file name, contents) pairs
    pub fn files(&self) -> [(&'static str, &[u8]); 7] {
        [
            (files::NAMES_INX, self.names_inx.as_slice()),
            (files::NAMES_ACC, self.names_acc.as_slice()),
            (files::SNAMES_INX, self.snames_inx.as_slice()),
            (files::SNAMES_DAT, self.snames_dat.as_slice()),
            (files::FNAMES_INX, self.fnames_inx.as_slice()),
            (files::FNAMES_DAT, self.fnames_dat.as_slice()),
            (files::STRINGS_INX, self.strings_inx.as_slice()),
        ]
    }
}

pub fn build_indexes(input: IndexInput<'_>) -> Result<IndexFiles> {
    let lookup = |istr: Istr| -> Result<String> { string_at(input.strings, istr) };

    let (names_inx, names_acc) = build_name_table(input.persons, &lookup)?;
    let (snames_inx, snames_dat) = build_sorted_index(input, |p| {
        std::iter::once(p.surname)
            .chain(p.surnames_aliases.iter().copied())
            .collect()
    })?;
    let (fnames_inx, fnames_dat) = build_sorted_index(input, |p| {
        std::iter::once(p.first_name)
            .chain(p.first_names_aliases.iter().copied())
            .collect()
    })?;
    let strings_inx = build_string_table(input.strings, input.string_table_factor);

    debug!(
        persons = input.persons.len(),
        strings = input.strings.len(),
        "Built name, surname, first-name and string indices"
    );

    Ok(IndexFiles {
        names_inx,
        names_acc,
        snames_inx,
        snames_dat,
        fnames_inx,
        fnames_dat,
        strings_inx,
    })
}

fn string_at(strings: &[String], istr: Istr) -> Result<String> {
    strings.get(istr.index()).cloned().ok_or_else(|| {
        StorageError::corrupted(format!(
            "{} out of range ({} strings)",
            istr,
            strings.len()
        ))
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// Name Hash Table
// ═══════════════════════════════════════════════════════════════════════════

fn build_name_table<F>(persons: &[Person], lookup: &F) -> Result<(Vec<u8>, Vec<u8>)>
where
    F: Fn(Istr) -> Result<String> + Sync,
{
    let per_person: Vec<Vec<usize>> = persons
        .par_iter()
        .map(|p| {
            let mut buckets: Vec<usize> = misc_names(p, lookup)?
                .iter()
                .map(|n| legacy_hash(n.as_bytes()) as usize % NAME_TABLE_SIZE)
                .collect();
            buckets.sort_unstable();
            buckets.dedup();
            Ok(buckets)
        })
        .collect::<Result<_>>()?;

    // persons are visited in ascending order, so each bucket ends up sorted
    let mut table: Vec<Vec<u32>> = vec![Vec::new(); NAME_TABLE_SIZE];
    for (ip, buckets) in per_person.iter().enumerate() {
        for b in buckets {
            table[*b].push(ip as u32);
        }
    }

    let mut inx = Vec::new();
    inx.write_u32::<BigEndian>(NAME_TABLE_SIZE as u32)?;
    inx.write_u32::<BigEndian>(INX_HEADER_LEN)?;
    codec::write_block_header(&mut inx, 0, NAME_TABLE_SIZE)?;

    let mut acc = Vec::with_capacity(NAME_TABLE_SIZE * 4);
    for bucket in &table {
        acc.write_u32::<BigEndian>(inx.len() as u32)?;
        codec::encode(&bucket.to_value(), &mut inx);
    }
    Ok((inx, acc))
}

// ═══════════════════════════════════════════════════════════════════════════
// Sorted Surname / First-name Indices
// ═══════════════════════════════════════════════════════════════════════════

fn build_sorted_index<K>(input: IndexInput<'_>, keys: K) -> Result<(Vec<u8>, Vec<u8>)>
where
    K: Fn(&Person) -> Vec<Istr>,
{
    let mut by_istr: FxHashMap<Istr, Vec<u32>> = FxHashMap::default();
    for (ip, person) in input.persons.iter().enumerate() {
        if person.is_tombstone() {
            continue;
        }
        let mut istrs = keys(person);
        istrs.retain(|s| !s.is_empty_string());
        istrs.sort_unstable();
        istrs.dedup();
        for istr in istrs {
            by_istr.entry(istr).or_default().push(ip as u32);
        }
    }

    let mut entries: Vec<CollationEntry> = by_istr
        .keys()
        .copied()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|istr| {
            Ok(CollationEntry::new(
                istr,
                string_at(input.strings, istr)?,
                input.particles,
            ))
        })
        .collect::<Result<_>>()?;
    entries.par_sort();

    let mut dat = Vec::new();
    let mut list = Vec::with_capacity(entries.len());
    for entry in &entries {
        list.push(Value::block(
            0,
            vec![entry.istr.to_value(), Value::Int(dat.len() as i64)],
        ));
        let ipers = by_istr.get(&entry.istr).map(Vec::as_slice).unwrap_or(&[]);
        dat.write_u32::<BigEndian>(ipers.len() as u32)?;
        for ip in ipers {
            dat.write_u32::<BigEndian>(*ip)?;
        }
    }

    let mut inx = Vec::new();
    inx.write_u32::<BigEndian>(entries.len() as u32)?;
    inx.write_u32::<BigEndian>(INX_HEADER_LEN)?;
    codec::encode(&Value::seq(list), &mut inx);
    Ok((inx, dat))
}

// ═══════════════════════════════════════════════════════════════════════════
// String Hash Table
// ═══════════════════════════════════════════════════════════════════════════

pub fn string_table_size(nb_strings: usize, factor: u32) -> usize {
    (nb_strings * factor as usize).max(1)
}

fn build_string_table(strings: &[String], factor: u32) -> Vec<u8> {
    let size = string_table_size(strings.len(), factor);
    let mut heads = vec![NO_LINK; size];
    let mut next = vec![NO_LINK; strings.len()];
    for (i, s) in strings.iter().enumerate() {
        let b = legacy_hash(s.as_bytes()) as usize % size;
        next[i] = heads[b];
        heads[b] = i as u32;
    }

    let mut out = Vec::with_capacity(4 * (1 + size + strings.len()));
    out.extend_from_slice(&(size as u32).to_be_bytes());
    for h in heads.iter().chain(next.iter()) {
        out.extend_from_slice(&h.to_be_bytes());
    }
    out
}
