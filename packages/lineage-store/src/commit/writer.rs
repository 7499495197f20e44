//! `base` / `base.acc` writer
//!
//! Arrays are streamed after a provisional header; each record's offset is
//! the running sum of encoded sizes, so `base.acc` is produced alongside
//! without querying the file position. The header is rewritten last with
//! the final array offsets.

use byteorder::{BigEndian, WriteBytesExt};
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use crate::codec::{self, ToValue};
use crate::domain::{Ascend, Couple, Descend, Family, Person, Record, Union};
use crate::error::{Result, StorageError};
use crate::store::header::BaseHeader;

/// Logical content of every array, patches applied
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub persons: Vec<Person>,
    pub ascends: Vec<Ascend>,
    pub unions: Vec<Union>,
    pub families: Vec<Family>,
    pub couples: Vec<Couple>,
    pub descends: Vec<Descend>,
    pub strings: Vec<String>,
}

impl Snapshot {
    fn check_lengths(&self) -> Result<()> {
        let persons = self.persons.len();
        let families = self.families.len();
        if self.ascends.len() != persons
            || self.unions.len() != persons
            || self.couples.len() != families
            || self.descends.len() != families
        {
            return Err(StorageError::commit(format!(
                "Inconsistent array lengths: persons {}/{}/{}, families {}/{}/{}",
                persons,
                self.ascends.len(),
                self.unions.len(),
                families,
                self.couples.len(),
                self.descends.len()
            )));
        }
        Ok(())
    }
}

struct ArrayWriter<W> {
    out: W,
    pos: usize,
    acc: Vec<u8>,
    scratch: Vec<u8>,
}

impl<W: Write> ArrayWriter<W> {
    fn write_array<T: Record>(&mut self, records: &[T]) -> Result<u32> {
        let start = self.position()?;
        codec::write_block_header(&mut self.out, 0, records.len())?;
        self.pos += codec::block_header_size(0, records.len());

        for record in records {
            let value = record.to_value();
            let offset = self.position()?;
            self.acc.write_u32::<BigEndian>(offset)?;

            self.scratch.clear();
            codec::try_encode(&value, &mut self.scratch)?;
            self.out.write_all(&self.scratch)?;
            self.pos += codec::size(&value);
        }
        Ok(start)
    }

    fn position(&self) -> Result<u32> {
        u32::try_from(self.pos).map_err(|_| {
            StorageError::commit("Base file exceeds the 4 GiB offset range".to_string())
        })
    }
}

/// Write `snapshot` to `base_path` and its offset index to `acc_path`.
pub fn write_base(
    snapshot: &Snapshot,
    origin: &str,
    base_path: &Path,
    acc_path: &Path,
) -> Result<BaseHeader> {
    snapshot.check_lengths()?;

    let mut header = BaseHeader::new(
        snapshot.persons.len(),
        snapshot.families.len(),
        snapshot.strings.len(),
        origin,
    );
    let file = File::create(base_path)?;
    let mut out = BufWriter::new(file);
    header.write(&mut out)?;

    let mut writer = ArrayWriter {
        out,
        pos: header.encoded_len(),
        acc: Vec::with_capacity(
            4 * (3 * snapshot.persons.len() + 3 * snapshot.families.len() + snapshot.strings.len()),
        ),
        scratch: Vec::new(),
    };
    header.offsets = [
        writer.write_array(&snapshot.persons)?,
        writer.write_array(&snapshot.ascends)?,
        writer.write_array(&snapshot.unions)?,
        writer.write_array(&snapshot.families)?,
        writer.write_array(&snapshot.couples)?,
        writer.write_array(&snapshot.descends)?,
        writer.write_array(&snapshot.strings)?,
    ];

    let mut file = writer
        .out
        .into_inner()
        .map_err(|e| StorageError::io("Cannot flush base file").with_source(e.into_error()))?;
    file.seek(SeekFrom::Start(0))?;
    header.write(&mut file)?;
    file.sync_all()?;

    super::swap::write_synced(acc_path, &writer.acc)?;
    Ok(header)
}
