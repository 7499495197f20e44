//! Commit markers
//!
//! Every `commit_patches` and every rebuild appends one entry. A reader
//! that remembers the log length at open can tell when its cached view is
//! stale.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::Utc;
use tracing::warn;

use super::header::{strip_magic, SYNCHRO_MAGIC};
use crate::codec::{self, FromValue, ToValue, Value};
use crate::commit::atomic_write;
use crate::domain::{Ifam, Iper};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynchroEntry {
    /// Unix seconds, as text
    pub timestamp: String,
    pub persons: Vec<Iper>,
    pub families: Vec<Ifam>,
}

impl SynchroEntry {
    pub fn now(persons: &BTreeSet<Iper>, families: &BTreeSet<Ifam>) -> Self {
        Self {
            timestamp: Utc::now().timestamp().to_string(),
            persons: persons.iter().copied().collect(),
            families: families.iter().copied().collect(),
        }
    }
}

impl ToValue for SynchroEntry {
    fn to_value(&self) -> Value {
        Value::block(
            0,
            vec![
                self.timestamp.to_value(),
                self.persons.to_value(),
                self.families.to_value(),
            ],
        )
    }
}

impl FromValue for SynchroEntry {
    fn from_value(value: &Value) -> Result<Self> {
        let f = value.as_record(0, 3)?;
        Ok(Self {
            timestamp: String::from_value(&f[0])?,
            persons: Vec::from_value(&f[1])?,
            families: Vec::from_value(&f[2])?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynchroLog {
    pub entries: Vec<SynchroEntry>,
}

impl SynchroLog {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = SYNCHRO_MAGIC.to_vec();
        codec::encode(&self.entries.to_value(), &mut buf);
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let body = strip_magic(bytes, SYNCHRO_MAGIC)?;
        let (value, _) = codec::decode(body)?;
        Ok(Self {
            entries: Vec::from_value(&value)?,
        })
    }

    /// Missing file or foreign magic reads as an empty log.
    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let bytes = std::fs::read(path)?;
        match Self::from_bytes(&bytes) {
            Err(e) if e.is_format_not_recognized() => {
                warn!(path = %path.display(), "Ignoring synchro file with unknown format");
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Append `entry` and rewrite the log atomically. Returns the new length.
    pub fn append(path: &Path, entry: SynchroEntry) -> Result<usize> {
        let mut log = Self::read(path)?;
        log.entries.push(entry);
        atomic_write(path, &log.to_bytes())?;
        Ok(log.len())
    }
}
