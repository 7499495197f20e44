//! Sort order of the surname and first-name indices

use std::cmp::Ordering;

use once_cell::sync::Lazy;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::domain::Istr;

static DEFAULT_PARTICLES: Lazy<Vec<String>> = Lazy::new(|| {
    [
        "af ", "d'", "d’", "dal ", "de ", "de la ", "de las ", "de los ", "del ", "della ",
        "der ", "des ", "di ", "du ", "la ", "le ", "les ", "van ", "van de ", "van den ",
        "van der ", "von ", "von der ", "zu ",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
});

/// Name prefixes ignored when sorting surnames ("de", "van der", ...)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Particles {
    /// Lowercase, longest first
    list: Vec<String>,
}

impl Default for Particles {
    fn default() -> Self {
        Self::new(DEFAULT_PARTICLES.iter().cloned())
    }
}

impl Particles {
    pub fn new(list: impl IntoIterator<Item = String>) -> Self {
        let mut list: Vec<String> = list
            .into_iter()
            .map(|p| p.to_lowercase())
            .filter(|p| !p.trim().is_empty())
            .collect();
        list.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        list.dedup();
        Self { list }
    }

    /// Parse `particles.txt`: one particle per line, `_` standing for a
    /// trailing space.
    pub fn parse(text: &str) -> Self {
        Self::new(
            text.lines()
                .map(|l| l.trim_end_matches(['\r', '\n']))
                .filter(|l| !l.is_empty())
                .map(|l| l.replace('_', " ")),
        )
    }

    /// Inverse of [`Particles::parse`].
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for p in &self.list {
            out.push_str(&p.replace(' ', "_"));
            out.push('\n');
        }
        out
    }

    pub fn as_slice(&self) -> &[String] {
        &self.list
    }

    /// Length in bytes of the particle `name` starts with, if any.
    pub fn leading(&self, name: &str) -> Option<usize> {
        self.list
            .iter()
            .filter_map(|p| folded_prefix_len(name, p))
            .find(|n| *n < name.len())
    }

    /// `name` without its leading particle.
    pub fn strip<'a>(&self, name: &'a str) -> &'a str {
        match self.leading(name) {
            Some(n) => &name[n..],
            None => name,
        }
    }
}

/// Byte length of the prefix of `name` whose lowercase form is `particle`.
/// Always a char boundary of `name`.
fn folded_prefix_len(name: &str, particle: &str) -> Option<usize> {
    let mut expected = particle;
    for (i, c) in name.char_indices() {
        for lower in c.to_lowercase() {
            expected = expected.strip_prefix(lower)?;
        }
        if expected.is_empty() {
            return Some(i + c.len_utf8());
        }
    }
    None
}

/// Case- and accent-folded sort key of a name.
pub fn collation_key(name: &str, particles: &Particles) -> String {
    particles
        .strip(name)
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// One sorted-index entry before it is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollationEntry {
    pub key: String,
    pub raw: String,
    pub istr: Istr,
}

impl CollationEntry {
    pub fn new(istr: Istr, raw: String, particles: &Particles) -> Self {
        Self {
            key: collation_key(&raw, particles),
            raw,
            istr,
        }
    }
}

impl Ord for CollationEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then_with(|| self.raw.cmp(&other.raw))
            .then_with(|| self.istr.cmp(&other.istr))
    }
}

impl PartialOrd for CollationEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
