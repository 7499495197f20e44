//! Value decoder

use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use super::value::{FromValue, Value};
use super::{
    CODE_BLOCK32, CODE_BLOCK64, CODE_INT16, CODE_INT32, CODE_INT64, CODE_INT8, CODE_STRING32,
    CODE_STRING8, MAX_DEPTH, PREFIX_SMALL_BLOCK, PREFIX_SMALL_INT, PREFIX_SMALL_STRING,
};
use crate::error::{Result, StorageError};

/// Upper bound on the capacity reserved up front for a block's fields.
/// Larger blocks still decode, they just grow as fields arrive.
const PREALLOC_FIELDS: usize = 4096;

/// Decode one value from the start of `bytes`, returning it with the number
/// of bytes consumed.
pub fn decode(bytes: &[u8]) -> Result<(Value, usize)> {
    let mut cursor = Cursor::new(bytes);
    let value = read_value(&mut cursor)?;
    Ok((value, cursor.position() as usize))
}

/// Decode the value starting at `offset`.
pub fn decode_at(bytes: &[u8], offset: usize) -> Result<Value> {
    let tail = bytes.get(offset..).ok_or_else(|| {
        StorageError::corrupted(format!(
            "Offset {} beyond end of data ({} bytes)",
            offset,
            bytes.len()
        ))
    })?;
    decode(tail).map(|(value, _)| value)
}

pub fn read_value<R: Read>(r: &mut R) -> Result<Value> {
    read_nested(r, 0)
}

fn read_nested<R: Read>(r: &mut R, depth: usize) -> Result<Value> {
    if depth > MAX_DEPTH {
        return Err(StorageError::codec(format!(
            "Nesting deeper than {} levels",
            MAX_DEPTH
        )));
    }

    let code = r.read_u8()?;
    match code {
        c if c >= PREFIX_SMALL_BLOCK => {
            let tag = c & 0x0F;
            let size = ((c >> 4) & 0x07) as usize;
            read_fields(r, tag, size, depth)
        }
        c if c >= PREFIX_SMALL_INT => Ok(Value::Int(i64::from(c - PREFIX_SMALL_INT))),
        c if c >= PREFIX_SMALL_STRING => read_string(r, (c - PREFIX_SMALL_STRING) as usize),
        CODE_INT8 => Ok(Value::Int(i64::from(r.read_i8()?))),
        CODE_INT16 => Ok(Value::Int(i64::from(r.read_i16::<BigEndian>()?))),
        CODE_INT32 => Ok(Value::Int(i64::from(r.read_i32::<BigEndian>()?))),
        CODE_INT64 => Ok(Value::Int(r.read_i64::<BigEndian>()?)),
        CODE_STRING8 => {
            let len = r.read_u8()? as usize;
            read_string(r, len)
        }
        CODE_STRING32 => {
            let len = r.read_u32::<BigEndian>()? as usize;
            read_string(r, len)
        }
        CODE_BLOCK32 => {
            let header = r.read_u32::<BigEndian>()?;
            read_fields(r, (header & 0xFF) as u8, (header >> 10) as usize, depth)
        }
        CODE_BLOCK64 => {
            let header = r.read_u64::<BigEndian>()?;
            let size = usize::try_from(header >> 10)
                .map_err(|_| StorageError::codec("Block size exceeds address space"))?;
            read_fields(r, (header & 0xFF) as u8, size, depth)
        }
        other => Err(StorageError::codec(format!(
            "Unknown value code 0x{:02X}",
            other
        ))),
    }
}

fn read_string<R: Read>(r: &mut R, len: usize) -> Result<Value> {
    let mut bytes = Vec::with_capacity(len.min(1 << 16));
    let read = r.take(len as u64).read_to_end(&mut bytes)?;
    if read != len {
        return Err(StorageError::codec(format!(
            "Truncated string: expected {} bytes, got {}",
            len, read
        )));
    }
    Ok(Value::Bytes(bytes))
}

fn read_fields<R: Read>(r: &mut R, tag: u8, size: usize, depth: usize) -> Result<Value> {
    let mut fields = Vec::with_capacity(size.min(PREALLOC_FIELDS));
    for _ in 0..size {
        fields.push(read_nested(r, depth + 1)?);
    }
    Ok(Value::Block { tag, fields })
}

/// Sequential value reader over any byte source
pub struct ValueReader<R> {
    inner: R,
}

impl<R: Read> ValueReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn read(&mut self) -> Result<Value> {
        read_value(&mut self.inner)
    }

    pub fn read_typed<T: FromValue>(&mut self) -> Result<T> {
        T::from_value(&self.read()?)
    }

    /// Read a sequence header without its elements, returning the element
    /// count. Elements can then be pulled one by one with [`Self::read`].
    pub fn read_seq_header(&mut self) -> Result<usize> {
        let code = self.inner.read_u8()?;
        match code {
            c if c >= PREFIX_SMALL_BLOCK && c & 0x0F == 0 => Ok(((c >> 4) & 0x07) as usize),
            CODE_BLOCK32 => {
                let header = self.inner.read_u32::<BigEndian>()?;
                if header & 0xFF != 0 {
                    return Err(StorageError::codec(format!(
                        "Expected sequence, found block tag {}",
                        header & 0xFF
                    )));
                }
                Ok((header >> 10) as usize)
            }
            CODE_BLOCK64 => {
                let header = self.inner.read_u64::<BigEndian>()?;
                if header & 0xFF != 0 {
                    return Err(StorageError::codec(format!(
                        "Expected sequence, found block tag {}",
                        header & 0xFF
                    )));
                }
                usize::try_from(header >> 10)
                    .map_err(|_| StorageError::codec("Sequence length exceeds address space"))
            }
            other => Err(StorageError::codec(format!(
                "Expected sequence header, found code 0x{:02X}",
                other
            ))),
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode_to_vec, size, write_block_header};
    use crate::error::ErrorKind;

    fn roundtrip(value: Value) {
        let bytes = encode_to_vec(&value);
        let (decoded, used) = decode(&bytes).unwrap();
        assert_eq!(decoded, value);
        assert_eq!(used, bytes.len());
        assert_eq!(used, size(&value));
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Round-trip Boundary Tests
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_integer_boundaries() {
        for n in [
            0,
            63,
            64,
            127,
            128,
            -1,
            -128,
            -129,
            i64::from(i16::MIN),
            i64::from(i16::MAX) + 1,
            i64::from(i32::MIN),
            i64::from(i32::MAX),
            i64::from(i32::MAX) + 1,
            i64::MIN,
            i64::MAX,
        ] {
            roundtrip(Value::Int(n));
        }
    }

    #[test]
    fn test_string_boundaries() {
        for len in [0usize, 1, 31, 32, 255, 256, 70_000] {
            roundtrip(Value::Bytes(vec![b'a'; len]));
        }
    }

    #[test]
    fn test_nested_blocks() {
        roundtrip(Value::block(
            5,
            vec![
                Value::seq(vec![]),
                Value::seq((0..20).map(Value::Int).collect()),
                Value::block(200, vec![Value::string("x")]),
                Value::block(0, vec![Value::block(0, vec![Value::Int(0)])]),
            ],
        ));
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Error Tests
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_unknown_code_is_codec_error() {
        let err = decode(&[0x17]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Codec);
        assert!(err.message.contains("0x17"));
    }

    #[test]
    fn test_truncated_input_is_codec_error() {
        let bytes = encode_to_vec(&Value::Int(1_000_000));
        let err = decode(&bytes[..3]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Codec);

        let bytes = encode_to_vec(&Value::Bytes(vec![b'z'; 40]));
        let err = decode(&bytes[..10]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Codec);

        assert_eq!(decode(&[]).unwrap_err().kind, ErrorKind::Codec);
    }

    #[test]
    fn test_decode_at_out_of_range() {
        let err = decode_at(&[0x40], 5).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Corrupted);
    }

    #[test]
    fn test_excessive_nesting_is_rejected() {
        let bytes = vec![0x90u8; MAX_DEPTH + 2];
        assert_eq!(decode(&bytes).unwrap_err().kind, ErrorKind::Codec);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // ValueReader Tests
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_streaming_sequence() {
        let mut buf = Vec::new();
        write_block_header(&mut buf, 0, 10).unwrap();
        for i in 0..10i64 {
            buf.extend(encode_to_vec(&Value::Int(i * 100)));
        }

        let mut reader = ValueReader::new(Cursor::new(buf));
        let n = reader.read_seq_header().unwrap();
        assert_eq!(n, 10);
        let values: Vec<i64> = (0..n).map(|_| reader.read_typed().unwrap()).collect();
        assert_eq!(values[9], 900);
    }

    #[test]
    fn test_seq_header_rejects_tagged_block() {
        let bytes = encode_to_vec(&Value::block(3, vec![]));
        let mut reader = ValueReader::new(Cursor::new(bytes));
        assert!(reader.read_seq_header().is_err());
    }
}
