//! Legacy variable-length value codec
//!
//! Every file of a base is built from four value shapes:
//!
//! ```text
//! int      0x40+n (0..=63) | 0x00 i8 | 0x01 i16 | 0x02 i32 | 0x03 i64
//! string   0x20+len (len<=31) | 0x09 u8-len | 0x0A u32-len, then bytes
//! block    0x80+tag+(size<<4) (tag<16, size<8) | 0x08 u32-hd | 0x13 u64-hd
//!          with hd = (size << 10) | tag, then `size` fields
//! sequence block with tag 0, one field per element
//! ```
//!
//! All multi-byte quantities are big-endian. [`size`] returns the exact
//! encoded length so writers can precompute offsets before writing.

mod reader;
mod value;
mod writer;

pub use reader::{decode, decode_at, read_value, ValueReader};
pub use value::{FromValue, ToValue, Value};
pub use writer::{
    block_header_size, encode, encode_to_vec, size, try_encode, write_block_header, write_value,
    MAX_STRING_LEN,
};

pub(crate) const PREFIX_SMALL_BLOCK: u8 = 0x80;
pub(crate) const PREFIX_SMALL_INT: u8 = 0x40;
pub(crate) const PREFIX_SMALL_STRING: u8 = 0x20;
pub(crate) const CODE_INT8: u8 = 0x00;
pub(crate) const CODE_INT16: u8 = 0x01;
pub(crate) const CODE_INT32: u8 = 0x02;
pub(crate) const CODE_INT64: u8 = 0x03;
pub(crate) const CODE_BLOCK32: u8 = 0x08;
pub(crate) const CODE_STRING8: u8 = 0x09;
pub(crate) const CODE_STRING32: u8 = 0x0A;
pub(crate) const CODE_BLOCK64: u8 = 0x13;

/// Largest block size a 32-bit header can carry (22 bits).
pub(crate) const MAX_BLOCK32_SIZE: usize = (1 << 22) - 1;

/// Nesting limit for decoding; legacy records are a handful of levels deep.
pub(crate) const MAX_DEPTH: usize = 256;
