//! Value encoder
//!
//! Integers always take the shortest form that represents them, so the
//! output is canonical: equal values encode to equal bytes.

use byteorder::{BigEndian, WriteBytesExt};
use std::io::{self, Write};

use super::value::Value;
use super::{
    CODE_BLOCK32, CODE_BLOCK64, CODE_INT16, CODE_INT32, CODE_INT64, CODE_INT8, CODE_STRING32,
    CODE_STRING8, MAX_BLOCK32_SIZE, PREFIX_SMALL_BLOCK, PREFIX_SMALL_INT, PREFIX_SMALL_STRING,
};
use crate::error::{Result, StorageError};

/// Largest string the 32-bit length prefix can carry.
pub const MAX_STRING_LEN: usize = u32::MAX as usize;

/// Append the encoding of `value` to `buf`.
///
/// Strings are limited to [`MAX_STRING_LEN`] bytes; a longer one ends the
/// output at the offending string. Use [`try_encode`] where lengths come
/// from user data.
pub fn encode(value: &Value, buf: &mut Vec<u8>) {
    let result = write_value(buf, value);
    debug_assert!(result.is_ok(), "encoding overflow: {:?}", result);
}

pub fn encode_to_vec(value: &Value) -> Vec<u8> {
    let mut buf = Vec::with_capacity(size(value));
    encode(value, &mut buf);
    buf
}

/// Append the encoding of `value` to `buf`, failing on an oversized string.
pub fn try_encode(value: &Value, buf: &mut Vec<u8>) -> Result<()> {
    buf.reserve(size(value));
    write_value(buf, value).map_err(|e| StorageError::codec(e.to_string()))
}

/// Stream the encoding of `value` into any writer.
pub fn write_value<W: Write>(w: &mut W, value: &Value) -> io::Result<()> {
    match value {
        Value::Int(n) => write_int(w, *n),
        Value::Bytes(bytes) => write_bytes(w, bytes),
        Value::Block { tag, fields } => {
            write_block_header(w, *tag, fields.len())?;
            for field in fields {
                write_value(w, field)?;
            }
            Ok(())
        }
    }
}

fn write_int<W: Write>(w: &mut W, n: i64) -> io::Result<()> {
    if (0..=0x3F).contains(&n) {
        w.write_u8(PREFIX_SMALL_INT + n as u8)
    } else if let Ok(v) = i8::try_from(n) {
        w.write_u8(CODE_INT8)?;
        w.write_i8(v)
    } else if let Ok(v) = i16::try_from(n) {
        w.write_u8(CODE_INT16)?;
        w.write_i16::<BigEndian>(v)
    } else if let Ok(v) = i32::try_from(n) {
        w.write_u8(CODE_INT32)?;
        w.write_i32::<BigEndian>(v)
    } else {
        w.write_u8(CODE_INT64)?;
        w.write_i64::<BigEndian>(n)
    }
}

fn write_bytes<W: Write>(w: &mut W, bytes: &[u8]) -> io::Result<()> {
    let len = bytes.len();
    if len <= 0x1F {
        w.write_u8(PREFIX_SMALL_STRING + len as u8)?;
    } else if len <= 0xFF {
        w.write_u8(CODE_STRING8)?;
        w.write_u8(len as u8)?;
    } else {
        let len = long_string_len(len)?;
        w.write_u8(CODE_STRING32)?;
        w.write_u32::<BigEndian>(len)?;
    }
    w.write_all(bytes)
}

fn long_string_len(len: usize) -> io::Result<u32> {
    u32::try_from(len).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("string of {} bytes exceeds the 32-bit length prefix", len),
        )
    })
}

/// Write only the header of a block of `size` fields.
///
/// Used by array writers that stream elements one by one after the header.
pub fn write_block_header<W: Write>(w: &mut W, tag: u8, size: usize) -> io::Result<()> {
    if tag < 16 && size < 8 {
        w.write_u8(PREFIX_SMALL_BLOCK + tag + ((size as u8) << 4))
    } else if size <= MAX_BLOCK32_SIZE {
        w.write_u8(CODE_BLOCK32)?;
        w.write_u32::<BigEndian>(((size as u32) << 10) | u32::from(tag))
    } else {
        w.write_u8(CODE_BLOCK64)?;
        w.write_u64::<BigEndian>(((size as u64) << 10) | u64::from(tag))
    }
}

pub fn block_header_size(tag: u8, size: usize) -> usize {
    if tag < 16 && size < 8 {
        1
    } else if size <= MAX_BLOCK32_SIZE {
        5
    } else {
        9
    }
}

/// Exact encoded length of `value`.
pub fn size(value: &Value) -> usize {
    match value {
        Value::Int(n) => int_size(*n),
        Value::Bytes(bytes) => {
            let len = bytes.len();
            let prefix = if len <= 0x1F {
                1
            } else if len <= 0xFF {
                2
            } else {
                5
            };
            prefix + len
        }
        Value::Block { tag, fields } => {
            block_header_size(*tag, fields.len()) + fields.iter().map(size).sum::<usize>()
        }
    }
}

fn int_size(n: i64) -> usize {
    if (0..=0x3F).contains(&n) {
        1
    } else if i8::try_from(n).is_ok() {
        2
    } else if i16::try_from(n).is_ok() {
        3
    } else if i32::try_from(n).is_ok() {
        5
    } else {
        9
    }
}
