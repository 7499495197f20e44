//! Typed record indices and the fixed-point consanguinity value

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::codec::{FromValue, ToValue, Value};
use crate::collection::Key;
use crate::error::{Result, StorageError};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Default,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            Serialize,
            Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            /// Placeholder index, stored as `-1`
            pub const DUMMY: $name = $name(u32::MAX);

            pub const fn new(index: u32) -> Self {
                $name(index)
            }

            pub fn index(self) -> usize {
                self.0 as usize
            }

            pub fn is_dummy(self) -> bool {
                self == Self::DUMMY
            }
        }

        impl Key for $name {
            fn from_index(index: usize) -> Self {
                $name(index as u32)
            }

            fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_dummy() {
                    write!(f, "{}#dummy", $label)
                } else {
                    write!(f, "{}#{}", $label, self.0)
                }
            }
        }

        impl ToValue for $name {
            fn to_value(&self) -> Value {
                if self.is_dummy() {
                    Value::Int(-1)
                } else {
                    Value::Int(i64::from(self.0))
                }
            }
        }

        impl FromValue for $name {
            fn from_value(value: &Value) -> Result<Self> {
                match value.as_int()? {
                    -1 => Ok(Self::DUMMY),
                    n => u32::try_from(n).map($name).map_err(|_| {
                        StorageError::corrupted(format!("Invalid {} index {}", $label, n))
                    }),
                }
            }
        }
    };
}

define_id!(
    /// Person index
    Iper,
    "iper"
);
define_id!(
    /// Family index
    Ifam,
    "ifam"
);
define_id!(
    /// String index
    Istr,
    "istr"
);

impl Istr {
    /// The empty string, present in every base at index 0
    pub const EMPTY: Istr = Istr(0);
    /// The unknown-name marker `"?"`, present in every base at index 1
    pub const QUEST: Istr = Istr(1);

    pub fn is_empty_string(self) -> bool {
        self == Self::EMPTY
    }

    pub fn is_quest(self) -> bool {
        self == Self::QUEST
    }
}

/// Fixed-point consanguinity coefficient, `round(x * 1e6)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fix(pub i32);

impl Fix {
    const SCALE: f64 = 1_000_000.0;

    /// Not computed yet
    pub const NO_CONSANG: Fix = Fix(-1);
    pub const ZERO: Fix = Fix(0);

    pub fn from_f64(x: f64) -> Self {
        Fix((x * Self::SCALE).round() as i32)
    }

    /// Value as a float. [`Fix::NO_CONSANG`] reads as 0.
    pub fn to_f64(self) -> f64 {
        if self == Self::NO_CONSANG {
            0.0
        } else {
            f64::from(self.0) / Self::SCALE
        }
    }

    pub fn is_computed(self) -> bool {
        self != Self::NO_CONSANG
    }
}

impl Default for Fix {
    fn default() -> Self {
        Fix::NO_CONSANG
    }
}

impl fmt::Display for Fix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_computed() {
            write!(f, "{:.6}", self.to_f64())
        } else {
            write!(f, "-")
        }
    }
}

impl ToValue for Fix {
    fn to_value(&self) -> Value {
        Value::Int(i64::from(self.0))
    }
}

impl FromValue for Fix {
    fn from_value(value: &Value) -> Result<Self> {
        i32::from_value(value).map(Fix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dummy_encodes_as_minus_one() {
        assert_eq!(Ifam::DUMMY.to_value(), Value::Int(-1));
        assert_eq!(Ifam::from_value(&Value::Int(-1)).unwrap(), Ifam::DUMMY);
        assert_eq!(Iper::from_value(&Value::Int(12)).unwrap(), Iper(12));
        assert!(Istr::from_value(&Value::Int(-7)).is_err());
    }

    #[test]
    fn test_fix_rounding() {
        assert_eq!(Fix::from_f64(0.25), Fix(250_000));
        assert_eq!(Fix::from_f64(1.0 / 3.0), Fix(333_333));
        assert_eq!(Fix::from_f64(0.0625).to_f64(), 0.0625);
        assert_eq!(Fix::NO_CONSANG.to_f64(), 0.0);
        assert!(!Fix::default().is_computed());
    }

    #[test]
    fn test_display() {
        assert_eq!(Iper(3).to_string(), "iper#3");
        assert_eq!(Ifam::DUMMY.to_string(), "ifam#dummy");
        assert_eq!(Fix(125_000).to_string(), "0.125000");
    }
}
