use serde::{Deserialize, Serialize};
use std::fmt;

/// The seven record arrays of a base, in on-disk order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Persons,
    Ascends,
    Unions,
    Families,
    Couples,
    Descends,
    Strings,
}

impl RecordKind {
    pub const ALL: [RecordKind; 7] = [
        RecordKind::Persons,
        RecordKind::Ascends,
        RecordKind::Unions,
        RecordKind::Families,
        RecordKind::Couples,
        RecordKind::Descends,
        RecordKind::Strings,
    ];

    /// Position of this kind in the header offset table and in `base.acc`.
    pub fn ordinal(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Persons => "persons",
            RecordKind::Ascends => "ascends",
            RecordKind::Unions => "unions",
            RecordKind::Families => "families",
            RecordKind::Couples => "couples",
            RecordKind::Descends => "descends",
            RecordKind::Strings => "strings",
        }
    }

    /// Kinds indexed by person; the others are indexed by family, except strings.
    pub fn is_person_indexed(self) -> bool {
        matches!(
            self,
            RecordKind::Persons | RecordKind::Ascends | RecordKind::Unions
        )
    }

    pub fn is_family_indexed(self) -> bool {
        matches!(
            self,
            RecordKind::Families | RecordKind::Couples | RecordKind::Descends
        )
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinals_follow_file_order() {
        for (i, kind) in RecordKind::ALL.iter().enumerate() {
            assert_eq!(kind.ordinal(), i);
        }
        assert!(RecordKind::Unions.is_person_indexed());
        assert!(RecordKind::Couples.is_family_indexed());
        assert!(!RecordKind::Strings.is_person_indexed());
        assert!(!RecordKind::Strings.is_family_indexed());
    }
}
