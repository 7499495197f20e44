//! One record array of the `base` file

use byteorder::{BigEndian, ByteOrder};
use std::io::Cursor;
use std::sync::Arc;

use tracing::debug;

use super::blob::Blob;
use super::header::BaseHeader;
use crate::codec::{decode_at, FromValue, ValueReader};
use crate::domain::Record;
use crate::error::{Result, StorageError};

/// Positional access to the records of one kind
///
/// Records are decoded on demand through `base.acc`, or from an in-memory
/// copy after [`RecordArray::load`].
#[derive(Debug)]
pub struct RecordArray<T> {
    data: Arc<Blob>,
    acc: Arc<Blob>,
    start: usize,
    acc_start: usize,
    len: usize,
    cache: Option<Vec<T>>,
}

impl<T: Record> RecordArray<T> {
    pub(crate) fn new(data: Arc<Blob>, acc: Arc<Blob>, header: &BaseHeader) -> Self {
        let kind = T::KIND;
        Self {
            data,
            acc,
            start: header.offsets[kind.ordinal()] as usize,
            acc_start: header.acc_start(kind),
            len: header.array_len(kind),
            cache: None,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_loaded(&self) -> bool {
        self.cache.is_some()
    }

    /// Absolute position of record `i` in the base file.
    pub fn offset(&self, i: usize) -> Result<usize> {
        let pos = self.acc_start + 4 * i;
        let bytes = self.acc.get(pos..pos + 4).ok_or_else(|| {
            StorageError::corrupted(format!(
                "{} offset index truncated at entry {}",
                T::KIND,
                i
            ))
        })?;
        Ok(BigEndian::read_u32(bytes) as usize)
    }

    pub fn get(&self, i: usize) -> Result<T> {
        if i >= self.len {
            return Err(StorageError::not_found(format!(
                "{} index {} (array length {})",
                T::KIND,
                i,
                self.len
            )));
        }
        if let Some(cache) = &self.cache {
            return Ok(cache[i].clone());
        }
        let value = decode_at(&self.data, self.offset(i)?)?;
        T::from_value(&value)
    }

    /// Decode the whole array sequentially and keep it in memory.
    pub fn load(&mut self) -> Result<&[T]> {
        if self.cache.is_none() {
            let records = self.read_all()?;
            debug!(kind = %T::KIND, count = records.len(), "Loaded record array");
            self.cache = Some(records);
        }
        Ok(self.cache.as_deref().unwrap_or(&[]))
    }

    pub fn unload(&mut self) {
        if self.cache.take().is_some() {
            debug!(kind = %T::KIND, "Unloaded record array");
        }
    }

    fn read_all(&self) -> Result<Vec<T>> {
        let tail = self.data.get(self.start..).ok_or_else(|| {
            StorageError::corrupted(format!("{} array starts past end of base", T::KIND))
        })?;
        let mut reader = ValueReader::new(Cursor::new(tail));
        let count = reader.read_seq_header()?;
        if count != self.len {
            return Err(StorageError::corrupted(format!(
                "{} array holds {} records, header says {}",
                T::KIND,
                count,
                self.len
            )));
        }
        (0..count).map(|_| reader.read_typed::<T>()).collect()
    }
}
