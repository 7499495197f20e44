//! Magic numbers and the `base` file header
//!
//! ```text
//! "GnWb0024"
//! u32 persons · u32 families · u32 strings
//! u32 × 7      absolute start of each array, in RecordKind order
//! string       origin file name (codec string)
//! ```

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::codec::{self, ValueReader, Value};
use crate::domain::RecordKind;
use crate::error::{Result, StorageError};

pub const MAGIC_LEN: usize = 8;
pub const BASE_MAGIC: &[u8; MAGIC_LEN] = b"GnWb0024";
pub const PATCHES_MAGIC: &[u8; MAGIC_LEN] = b"GnPa0001";
pub const SYNCHRO_MAGIC: &[u8; MAGIC_LEN] = b"GnSy0001";

/// Consume `magic` from the stream.
///
/// On mismatch (or a stream too short to hold it) the position is restored
/// and a `FormatNotRecognized` error returned.
pub fn check_magic<R: Read + Seek>(r: &mut R, magic: &[u8; MAGIC_LEN]) -> Result<()> {
    let start = r.stream_position()?;
    let mut found = [0u8; MAGIC_LEN];
    let mut filled = 0;
    while filled < MAGIC_LEN {
        match r.read(&mut found[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    if filled == MAGIC_LEN && &found == magic {
        return Ok(());
    }
    r.seek(SeekFrom::Start(start))?;
    Err(StorageError::format_not_recognized(&found[..filled], magic))
}

/// Slice variant of [`check_magic`]: returns the bytes after the magic.
pub fn strip_magic<'a>(bytes: &'a [u8], magic: &[u8; MAGIC_LEN]) -> Result<&'a [u8]> {
    match bytes.strip_prefix(&magic[..]) {
        Some(rest) => Ok(rest),
        None => Err(StorageError::format_not_recognized(
            &bytes[..bytes.len().min(MAGIC_LEN)],
            magic,
        )),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseHeader {
    pub persons: u32,
    pub families: u32,
    pub strings: u32,
    pub offsets: [u32; 7],
    pub origin: String,
}

impl BaseHeader {
    pub fn new(persons: usize, families: usize, strings: usize, origin: &str) -> Self {
        Self {
            persons: persons as u32,
            families: families as u32,
            strings: strings as u32,
            offsets: [0; 7],
            origin: origin.to_string(),
        }
    }

    /// Element count of the array of `kind`.
    pub fn array_len(&self, kind: RecordKind) -> usize {
        let n = if kind.is_person_indexed() {
            self.persons
        } else if kind.is_family_indexed() {
            self.families
        } else {
            self.strings
        };
        n as usize
    }

    /// Byte position of the first offset of `kind` in `base.acc`.
    pub fn acc_start(&self, kind: RecordKind) -> usize {
        RecordKind::ALL[..kind.ordinal()]
            .iter()
            .map(|k| self.array_len(*k) * 4)
            .sum()
    }

    pub fn encoded_len(&self) -> usize {
        MAGIC_LEN + 4 * 3 + 4 * 7 + codec::size(&Value::string(&self.origin))
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(BASE_MAGIC)?;
        w.write_u32::<BigEndian>(self.persons)?;
        w.write_u32::<BigEndian>(self.families)?;
        w.write_u32::<BigEndian>(self.strings)?;
        for offset in &self.offsets {
            w.write_u32::<BigEndian>(*offset)?;
        }
        codec::write_value(w, &Value::string(&self.origin))
    }

    pub fn read<R: Read + Seek>(r: &mut R) -> Result<Self> {
        check_magic(r, BASE_MAGIC)?;
        let persons = r.read_u32::<BigEndian>()?;
        let families = r.read_u32::<BigEndian>()?;
        let strings = r.read_u32::<BigEndian>()?;
        let mut offsets = [0u32; 7];
        for offset in offsets.iter_mut() {
            *offset = r.read_u32::<BigEndian>()?;
        }
        let origin = ValueReader::new(r).read_typed::<String>()?;
        Ok(Self {
            persons,
            families,
            strings,
            offsets,
            origin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Cursor;

    #[test]
    fn test_header_roundtrip_and_length() {
        let mut header = BaseHeader::new(3, 1, 5, "demo.gw");
        header.offsets = [60, 70, 80, 90, 100, 110, 120];
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        assert_eq!(buf.len(), header.encoded_len());

        let parsed = BaseHeader::read(&mut Cursor::new(buf)).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_acc_start_follows_counts() {
        let header = BaseHeader::new(3, 2, 5, "");
        assert_eq!(header.acc_start(RecordKind::Persons), 0);
        assert_eq!(header.acc_start(RecordKind::Families), 3 * 3 * 4);
        assert_eq!(header.acc_start(RecordKind::Strings), (9 + 6) * 4);
    }

    #[test]
    fn test_foreign_magic_restores_position() {
        let mut cursor = Cursor::new(b"XXXXXXXXrest".to_vec());
        let err = check_magic(&mut cursor, BASE_MAGIC).unwrap_err();
        assert_eq!(err.kind, ErrorKind::FormatNotRecognized);
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_short_stream_is_not_recognized() {
        let mut cursor = Cursor::new(b"GnWb".to_vec());
        let err = check_magic(&mut cursor, BASE_MAGIC).unwrap_err();
        assert!(err.is_format_not_recognized());
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_matching_magic_is_consumed() {
        let mut cursor = Cursor::new(b"GnPa0001\x40".to_vec());
        check_magic(&mut cursor, PATCHES_MAGIC).unwrap();
        assert_eq!(cursor.position(), 8);
        assert!(strip_magic(b"GnSy0001", SYNCHRO_MAGIC).unwrap().is_empty());
        assert!(strip_magic(b"Gn", SYNCHRO_MAGIC).is_err());
    }
}
