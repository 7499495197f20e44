//! Name normalisation, the legacy string hash, and per-person name variants

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::domain::{Istr, Person, Record, TitleName};
use crate::error::Result;

/// Buckets in `names.inx`
pub const NAME_TABLE_SIZE: usize = 0x3fff;

/// Fold a name to its lookup form.
///
/// Diacritics are stripped, letters lowercased, and every run of
/// non-alphanumeric characters becomes a single space.
pub fn normalize_name(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_space = false;
    for c in s.nfd().filter(|c| !is_combining_mark(*c)) {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(c.to_lowercase());
        } else {
            pending_space = true;
        }
    }
    out
}

#[inline]
fn mix(mut h: u32, mut d: u32) -> u32 {
    d = d.wrapping_mul(0xcc9e_2d51);
    d = d.rotate_left(15);
    d = d.wrapping_mul(0x1b87_3593);
    h ^= d;
    h = h.rotate_left(13);
    h.wrapping_mul(5).wrapping_add(0xe654_6b64)
}

#[inline]
fn final_mix(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^ (h >> 16)
}

/// String hash of the legacy format (MurmurHash3 mixing, seed 0, 30-bit
/// result). Bucket numbers in `names.inx` and `strings.inx` depend on it.
pub fn legacy_hash(bytes: &[u8]) -> u32 {
    let mut h = 0u32;
    let mut chunks = bytes.chunks_exact(4);
    for chunk in &mut chunks {
        let w = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        h = mix(h, w);
    }
    let tail = chunks.remainder();
    if !tail.is_empty() {
        let w = tail
            .iter()
            .enumerate()
            .fold(0u32, |w, (i, b)| w | (u32::from(*b) << (8 * i)));
        h = mix(h, w);
    }
    h ^= bytes.len() as u32;
    final_mix(h) & 0x3FFF_FFFF
}

/// Bucket of a raw name in `names.inx`.
pub fn name_bucket(name: &str) -> usize {
    legacy_hash(normalize_name(name).as_bytes()) as usize % NAME_TABLE_SIZE
}

/// Every name under which `person` can be found, normalised and
/// deduplicated, in first-seen order.
pub fn misc_names<F>(person: &Person, string: F) -> Result<Vec<String>>
where
    F: Fn(Istr) -> Result<String>,
{
    if person.is_tombstone() {
        return Ok(Vec::new());
    }

    let text = |istr: Istr| -> Result<Option<String>> {
        if istr.is_empty_string() {
            return Ok(None);
        }
        let s = string(istr)?;
        Ok(if s.is_empty() { None } else { Some(s) })
    };

    let mut first_names = Vec::new();
    for istr in std::iter::once(person.first_name).chain(person.first_names_aliases.iter().copied())
    {
        first_names.extend(text(istr)?);
    }
    let mut surnames = Vec::new();
    for istr in std::iter::once(person.surname).chain(person.surnames_aliases.iter().copied()) {
        surnames.extend(text(istr)?);
    }
    let public_name = text(person.public_name)?;

    let mut raw = Vec::new();
    for f in first_names.iter().chain(public_name.iter()) {
        for s in &surnames {
            raw.push(format!("{} {}", f, s));
        }
    }
    for istr in &person.qualifiers {
        if let Some(q) = text(*istr)? {
            for f in first_names.iter().take(1).chain(public_name.iter()) {
                raw.push(format!("{} {}", f, q));
            }
        }
    }
    for istr in &person.aliases {
        raw.extend(text(*istr)?);
    }
    if let Some(first) = first_names.first() {
        for title in &person.titles {
            let place = text(title.place)?;
            if let TitleName::Name(name) = title.name {
                if let Some(name) = text(name)? {
                    raw.push(format!("{} {}", first, name));
                }
            }
            if let Some(place) = &place {
                raw.push(format!("{} {}", first, place));
                if let Some(ident) = text(title.ident)? {
                    raw.push(format!("{} {}", ident, place));
                }
            }
        }
    }

    let mut names: Vec<String> = Vec::with_capacity(raw.len());
    for name in raw.iter().map(|n| normalize_name(n)) {
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
    }
    Ok(names)
}
