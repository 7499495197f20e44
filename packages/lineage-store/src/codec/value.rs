//! Structured values and the typed conversion traits

use crate::error::{Result, StorageError};

/// A decoded value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// Signed integer
    Int(i64),
    /// Byte string
    Bytes(Vec<u8>),
    /// Tagged block of heterogeneous fields; sequences use tag 0
    Block { tag: u8, fields: Vec<Value> },
}

impl Value {
    pub fn string(s: &str) -> Self {
        Value::Bytes(s.as_bytes().to_vec())
    }

    pub fn block(tag: u8, fields: Vec<Value>) -> Self {
        Value::Block { tag, fields }
    }

    /// Homogeneous sequence (tag 0 block, one field per element)
    pub fn seq(items: Vec<Value>) -> Self {
        Value::Block {
            tag: 0,
            fields: items,
        }
    }

    pub fn as_int(&self) -> Result<i64> {
        match self {
            Value::Int(n) => Ok(*n),
            other => Err(shape_error("int", other)),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8]> {
        match self {
            Value::Bytes(b) => Ok(b),
            other => Err(shape_error("string", other)),
        }
    }

    /// Fields of a block with the given tag and exact arity.
    pub fn as_record(&self, tag: u8, arity: usize) -> Result<&[Value]> {
        match self {
            Value::Block { tag: t, fields } if *t == tag && fields.len() == arity => Ok(fields),
            Value::Block { tag: t, fields } => Err(StorageError::corrupted(format!(
                "Expected block tag {} with {} fields, found tag {} with {} fields",
                tag,
                arity,
                t,
                fields.len()
            ))),
            other => Err(shape_error("block", other)),
        }
    }

    /// Elements of a sequence
    pub fn as_seq(&self) -> Result<&[Value]> {
        match self {
            Value::Block { tag: 0, fields } => Ok(fields),
            // an empty sequence may come out of older writers as the int 0
            Value::Int(0) => Ok(&[]),
            other => Err(shape_error("sequence", other)),
        }
    }

    fn shape_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Bytes(_) => "string",
            Value::Block { .. } => "block",
        }
    }
}

fn shape_error(expected: &str, found: &Value) -> StorageError {
    StorageError::corrupted(format!(
        "Expected {}, found {}",
        expected,
        found.shape_name()
    ))
}

/// Conversion into a [`Value`]
pub trait ToValue {
    fn to_value(&self) -> Value;
}

/// Conversion out of a [`Value`]
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl ToValue for i64 {
    fn to_value(&self) -> Value {
        Value::Int(*self)
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_int()
    }
}

impl ToValue for i32 {
    fn to_value(&self) -> Value {
        Value::Int(*self as i64)
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self> {
        let n = value.as_int()?;
        i32::try_from(n).map_err(|_| StorageError::corrupted(format!("{} overflows i32", n)))
    }
}

impl ToValue for u32 {
    fn to_value(&self) -> Value {
        Value::Int(*self as i64)
    }
}

impl FromValue for u32 {
    fn from_value(value: &Value) -> Result<Self> {
        let n = value.as_int()?;
        u32::try_from(n).map_err(|_| StorageError::corrupted(format!("{} is not a u32", n)))
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Int(i64::from(*self))
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        match value.as_int()? {
            0 => Ok(false),
            1 => Ok(true),
            n => Err(StorageError::corrupted(format!("{} is not a boolean", n))),
        }
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::string(self)
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        let bytes = value.as_bytes()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| StorageError::corrupted(format!("Invalid UTF-8 string: {}", e)))
    }
}

impl<T: ToValue> ToValue for Vec<T> {
    fn to_value(&self) -> Value {
        Value::seq(self.iter().map(ToValue::to_value).collect())
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_seq()?.iter().map(T::from_value).collect()
    }
}

/// `None` is the int 0, `Some(x)` a one-field tag-0 block.
impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            None => Value::Int(0),
            Some(x) => Value::block(0, vec![x.to_value()]),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Int(0) => Ok(None),
            Value::Block { tag: 0, fields } if fields.len() == 1 => {
                Ok(Some(T::from_value(&fields[0])?))
            }
            other => Err(shape_error("option", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_shapes() {
        assert_eq!(None::<i64>.to_value(), Value::Int(0));
        assert_eq!(
            Some(5i64).to_value(),
            Value::block(0, vec![Value::Int(5)])
        );
        assert_eq!(
            Option::<i64>::from_value(&Value::block(0, vec![Value::Int(5)])).unwrap(),
            Some(5)
        );
    }

    #[test]
    fn test_as_record_checks_arity() {
        let v = Value::block(2, vec![Value::Int(1), Value::Int(2)]);
        assert!(v.as_record(2, 2).is_ok());
        assert!(v.as_record(2, 3).is_err());
        assert!(v.as_record(1, 2).is_err());
        assert!(Value::Int(3).as_record(0, 0).is_err());
    }

    #[test]
    fn test_empty_sequence_accepts_atom_zero() {
        assert!(Vec::<i64>::from_value(&Value::Int(0)).unwrap().is_empty());
        assert!(Vec::<i64>::from_value(&Value::seq(vec![])).unwrap().is_empty());
    }

    #[test]
    fn test_integer_conversions_reject_overflow() {
        assert!(u32::from_value(&Value::Int(-1)).is_err());
        assert!(i32::from_value(&Value::Int(i64::from(i32::MAX) + 1)).is_err());
        assert!(bool::from_value(&Value::Int(2)).is_err());
    }

    #[test]
    fn test_invalid_utf8_is_corrupted() {
        let err = String::from_value(&Value::Bytes(vec![0xff, 0xfe])).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Corrupted);
    }
}
