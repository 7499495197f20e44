//! Person and family record types with their legacy value layout
//!
//! Every record is a tag-0 block whose fields follow the declaration order
//! below. Constant enum variants are ints numbered in declaration order,
//! variants carrying data are blocks tagged in declaration order.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use super::ids::{Fix, Ifam, Iper, Istr};
use super::kind::RecordKind;
use crate::codec::{FromValue, ToValue, Value};
use crate::error::{Result, StorageError};

/// A record stored in one of the seven arrays
pub trait Record: ToValue + FromValue + Clone + Debug + Send + Sync + 'static {
    const KIND: RecordKind;

    /// Value patched in place of a deleted record at `index`.
    fn tombstone(index: usize) -> Self;

    fn is_tombstone(&self) -> bool;
}

fn field<T: FromValue>(fields: &[Value], i: usize) -> Result<T> {
    T::from_value(&fields[i])
}

fn constant_enum(value: &Value, what: &str, max: i64) -> Result<i64> {
    let n = value.as_int()?;
    if (0..=max).contains(&n) {
        Ok(n)
    } else {
        Err(StorageError::corrupted(format!("Invalid {} {}", what, n)))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Enumerations
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
    #[default]
    Neuter,
}

impl ToValue for Sex {
    fn to_value(&self) -> Value {
        Value::Int(*self as i64)
    }
}

impl FromValue for Sex {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(match constant_enum(value, "sex", 2)? {
            0 => Sex::Male,
            1 => Sex::Female,
            _ => Sex::Neuter,
        })
    }
}

/// Visibility of a person
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Access {
    #[default]
    IfTitles,
    Public,
    Private,
}

impl ToValue for Access {
    fn to_value(&self) -> Value {
        Value::Int(*self as i64)
    }
}

impl FromValue for Access {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(match constant_enum(value, "access", 2)? {
            0 => Access::IfTitles,
            1 => Access::Public,
            _ => Access::Private,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RelationKind {
    #[default]
    Married,
    NotMarried,
    Engaged,
    NoSexesCheckNotMarried,
    NoMention,
    NoSexesCheckMarried,
}

impl ToValue for RelationKind {
    fn to_value(&self) -> Value {
        Value::Int(*self as i64)
    }
}

impl FromValue for RelationKind {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(match constant_enum(value, "relation kind", 5)? {
            0 => RelationKind::Married,
            1 => RelationKind::NotMarried,
            2 => RelationKind::Engaged,
            3 => RelationKind::NoSexesCheckNotMarried,
            4 => RelationKind::NoMention,
            _ => RelationKind::NoSexesCheckMarried,
        })
    }
}

/// Divorce status; the date is kept as opaque text
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Divorce {
    #[default]
    NotDivorced,
    Divorced(String),
    Separated,
}

impl ToValue for Divorce {
    fn to_value(&self) -> Value {
        match self {
            Divorce::NotDivorced => Value::Int(0),
            Divorce::Separated => Value::Int(1),
            Divorce::Divorced(date) => Value::block(0, vec![date.to_value()]),
        }
    }
}

impl FromValue for Divorce {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Int(_) => Ok(match constant_enum(value, "divorce", 1)? {
                0 => Divorce::NotDivorced,
                _ => Divorce::Separated,
            }),
            _ => {
                let fields = value.as_record(0, 1)?;
                Ok(Divorce::Divorced(field(fields, 0)?))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TitleName {
    /// The person's main title
    Main,
    Name(Istr),
    #[default]
    None,
}

impl ToValue for TitleName {
    fn to_value(&self) -> Value {
        match self {
            TitleName::Main => Value::Int(0),
            TitleName::None => Value::Int(1),
            TitleName::Name(s) => Value::block(0, vec![s.to_value()]),
        }
    }
}

impl FromValue for TitleName {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Int(_) => Ok(match constant_enum(value, "title name", 1)? {
                0 => TitleName::Main,
                _ => TitleName::None,
            }),
            _ => {
                let fields = value.as_record(0, 1)?;
                Ok(TitleName::Name(field(fields, 0)?))
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Records
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Title {
    pub name: TitleName,
    pub ident: Istr,
    pub place: Istr,
}

impl ToValue for Title {
    fn to_value(&self) -> Value {
        Value::block(
            0,
            vec![
                self.name.to_value(),
                self.ident.to_value(),
                self.place.to_value(),
            ],
        )
    }
}

impl FromValue for Title {
    fn from_value(value: &Value) -> Result<Self> {
        let f = value.as_record(0, 3)?;
        Ok(Title {
            name: field(f, 0)?,
            ident: field(f, 1)?,
            place: field(f, 2)?,
        })
    }
}

/// Person record
///
/// Dates are opaque strings; an empty string means "unknown".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Person {
    pub first_name: Istr,
    pub surname: Istr,
    /// Disambiguation number among homonyms
    pub occ: i32,
    pub image: Istr,
    pub public_name: Istr,
    pub qualifiers: Vec<Istr>,
    pub aliases: Vec<Istr>,
    pub first_names_aliases: Vec<Istr>,
    pub surnames_aliases: Vec<Istr>,
    pub titles: Vec<Title>,
    pub sex: Sex,
    pub access: Access,
    pub occupation: Istr,
    pub birth: String,
    pub birth_place: Istr,
    pub death: String,
    pub death_place: Istr,
    pub notes: Istr,
    pub psources: Istr,
    pub key_index: Iper,
}

const PERSON_ARITY: usize = 20;

impl Person {
    /// A person named "? ?" at `key_index`.
    pub fn unknown(key_index: Iper) -> Self {
        Person {
            first_name: Istr::QUEST,
            surname: Istr::QUEST,
            key_index,
            ..Person::default()
        }
    }
}

impl ToValue for Person {
    fn to_value(&self) -> Value {
        Value::block(
            0,
            vec![
                self.first_name.to_value(),
                self.surname.to_value(),
                self.occ.to_value(),
                self.image.to_value(),
                self.public_name.to_value(),
                self.qualifiers.to_value(),
                self.aliases.to_value(),
                self.first_names_aliases.to_value(),
                self.surnames_aliases.to_value(),
                self.titles.to_value(),
                self.sex.to_value(),
                self.access.to_value(),
                self.occupation.to_value(),
                self.birth.to_value(),
                self.birth_place.to_value(),
                self.death.to_value(),
                self.death_place.to_value(),
                self.notes.to_value(),
                self.psources.to_value(),
                self.key_index.to_value(),
            ],
        )
    }
}

impl FromValue for Person {
    fn from_value(value: &Value) -> Result<Self> {
        let f = value.as_record(0, PERSON_ARITY)?;
        Ok(Person {
            first_name: field(f, 0)?,
            surname: field(f, 1)?,
            occ: field(f, 2)?,
            image: field(f, 3)?,
            public_name: field(f, 4)?,
            qualifiers: field(f, 5)?,
            aliases: field(f, 6)?,
            first_names_aliases: field(f, 7)?,
            surnames_aliases: field(f, 8)?,
            titles: field(f, 9)?,
            sex: field(f, 10)?,
            access: field(f, 11)?,
            occupation: field(f, 12)?,
            birth: field(f, 13)?,
            birth_place: field(f, 14)?,
            death: field(f, 15)?,
            death_place: field(f, 16)?,
            notes: field(f, 17)?,
            psources: field(f, 18)?,
            key_index: field(f, 19)?,
        })
    }
}

impl Record for Person {
    const KIND: RecordKind = RecordKind::Persons;

    fn tombstone(index: usize) -> Self {
        Person {
            key_index: Iper(index as u32),
            ..Person::default()
        }
    }

    fn is_tombstone(&self) -> bool {
        self.first_name.is_empty_string() && self.surname.is_empty_string()
    }
}

/// Parents and consanguinity of a person
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ascend {
    pub parents: Option<Ifam>,
    pub consang: Fix,
}

impl ToValue for Ascend {
    fn to_value(&self) -> Value {
        Value::block(0, vec![self.parents.to_value(), self.consang.to_value()])
    }
}

impl FromValue for Ascend {
    fn from_value(value: &Value) -> Result<Self> {
        let f = value.as_record(0, 2)?;
        Ok(Ascend {
            parents: field(f, 0)?,
            consang: field(f, 1)?,
        })
    }
}

impl Record for Ascend {
    const KIND: RecordKind = RecordKind::Ascends;

    fn tombstone(_index: usize) -> Self {
        Ascend::default()
    }

    fn is_tombstone(&self) -> bool {
        self.parents.is_none() && !self.consang.is_computed()
    }
}

/// Families a person is a spouse in
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Union {
    pub family: Vec<Ifam>,
}

impl ToValue for Union {
    fn to_value(&self) -> Value {
        Value::block(0, vec![self.family.to_value()])
    }
}

impl FromValue for Union {
    fn from_value(value: &Value) -> Result<Self> {
        let f = value.as_record(0, 1)?;
        Ok(Union {
            family: field(f, 0)?,
        })
    }
}

impl Record for Union {
    const KIND: RecordKind = RecordKind::Unions;

    fn tombstone(_index: usize) -> Self {
        Union::default()
    }

    fn is_tombstone(&self) -> bool {
        self.family.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Family {
    pub marriage: String,
    pub marriage_place: Istr,
    pub relation: RelationKind,
    pub divorce: Divorce,
    pub witnesses: Vec<Iper>,
    pub comment: Istr,
    pub origin_file: Istr,
    pub fsources: Istr,
    pub fam_index: Ifam,
}

const FAMILY_ARITY: usize = 9;

impl Family {
    pub fn new(fam_index: Ifam) -> Self {
        Family {
            marriage: String::new(),
            marriage_place: Istr::EMPTY,
            relation: RelationKind::default(),
            divorce: Divorce::default(),
            witnesses: Vec::new(),
            comment: Istr::EMPTY,
            origin_file: Istr::EMPTY,
            fsources: Istr::EMPTY,
            fam_index,
        }
    }
}

impl ToValue for Family {
    fn to_value(&self) -> Value {
        Value::block(
            0,
            vec![
                self.marriage.to_value(),
                self.marriage_place.to_value(),
                self.relation.to_value(),
                self.divorce.to_value(),
                self.witnesses.to_value(),
                self.comment.to_value(),
                self.origin_file.to_value(),
                self.fsources.to_value(),
                self.fam_index.to_value(),
            ],
        )
    }
}

impl FromValue for Family {
    fn from_value(value: &Value) -> Result<Self> {
        let f = value.as_record(0, FAMILY_ARITY)?;
        Ok(Family {
            marriage: field(f, 0)?,
            marriage_place: field(f, 1)?,
            relation: field(f, 2)?,
            divorce: field(f, 3)?,
            witnesses: field(f, 4)?,
            comment: field(f, 5)?,
            origin_file: field(f, 6)?,
            fsources: field(f, 7)?,
            fam_index: field(f, 8)?,
        })
    }
}

impl Record for Family {
    const KIND: RecordKind = RecordKind::Families;

    fn tombstone(_index: usize) -> Self {
        Family::new(Ifam::DUMMY)
    }

    fn is_tombstone(&self) -> bool {
        self.fam_index.is_dummy()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Couple {
    pub father: Iper,
    pub mother: Iper,
}

impl Couple {
    pub fn new(father: Iper, mother: Iper) -> Self {
        Couple { father, mother }
    }
}

impl ToValue for Couple {
    fn to_value(&self) -> Value {
        Value::block(0, vec![self.father.to_value(), self.mother.to_value()])
    }
}

impl FromValue for Couple {
    fn from_value(value: &Value) -> Result<Self> {
        let f = value.as_record(0, 2)?;
        Ok(Couple {
            father: field(f, 0)?,
            mother: field(f, 1)?,
        })
    }
}

impl Record for Couple {
    const KIND: RecordKind = RecordKind::Couples;

    fn tombstone(_index: usize) -> Self {
        Couple::new(Iper::DUMMY, Iper::DUMMY)
    }

    fn is_tombstone(&self) -> bool {
        self.father.is_dummy() && self.mother.is_dummy()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Descend {
    pub children: Vec<Iper>,
}

impl ToValue for Descend {
    fn to_value(&self) -> Value {
        Value::block(0, vec![self.children.to_value()])
    }
}

impl FromValue for Descend {
    fn from_value(value: &Value) -> Result<Self> {
        let f = value.as_record(0, 1)?;
        Ok(Descend {
            children: field(f, 0)?,
        })
    }
}

impl Record for Descend {
    const KIND: RecordKind = RecordKind::Descends;

    fn tombstone(_index: usize) -> Self {
        Descend::default()
    }

    fn is_tombstone(&self) -> bool {
        self.children.is_empty()
    }
}

/// Strings are never deleted, only superseded.
impl Record for String {
    const KIND: RecordKind = RecordKind::Strings;

    fn tombstone(_index: usize) -> Self {
        String::new()
    }

    fn is_tombstone(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode, encode_to_vec};
    use pretty_assertions::assert_eq;

    fn sample_person() -> Person {
        Person {
            first_name: Istr(2),
            surname: Istr(3),
            occ: 1,
            qualifiers: vec![Istr(4)],
            titles: vec![
                Title {
                    name: TitleName::Main,
                    ident: Istr(5),
                    place: Istr(6),
                },
                Title {
                    name: TitleName::Name(Istr(7)),
                    ident: Istr(5),
                    place: Istr::EMPTY,
                },
            ],
            sex: Sex::Female,
            access: Access::Public,
            birth: "1802-02-26".to_string(),
            key_index: Iper(9),
            ..Person::default()
        }
    }

    #[test]
    fn test_person_through_bytes() {
        let person = sample_person();
        let bytes = encode_to_vec(&person.to_value());
        let (value, _) = decode(&bytes).unwrap();
        assert_eq!(Person::from_value(&value).unwrap(), person);
    }

    #[test]
    fn test_family_through_bytes() {
        let family = Family {
            divorce: Divorce::Divorced("1850".to_string()),
            witnesses: vec![Iper(1), Iper(4)],
            relation: RelationKind::NoMention,
            ..Family::new(Ifam(3))
        };
        let (value, _) = decode(&encode_to_vec(&family.to_value())).unwrap();
        assert_eq!(Family::from_value(&value).unwrap(), family);
    }

    #[test]
    fn test_tombstones_are_recognized() {
        assert!(Person::tombstone(4).is_tombstone());
        assert_eq!(Person::tombstone(4).key_index, Iper(4));
        assert!(!Person::unknown(Iper(4)).is_tombstone());
        assert!(Family::tombstone(2).is_tombstone());
        assert!(!Family::new(Ifam(2)).is_tombstone());
        assert!(Couple::tombstone(0).is_tombstone());
        assert!(Ascend::tombstone(0).is_tombstone());
    }

    #[test]
    fn test_wrong_arity_is_corrupted() {
        let value = Value::block(0, vec![Value::Int(1)]);
        assert!(Person::from_value(&value).is_err());
        assert!(Couple::from_value(&value).is_err());
    }

    #[test]
    fn test_enum_out_of_range() {
        assert!(Sex::from_value(&Value::Int(3)).is_err());
        assert!(RelationKind::from_value(&Value::Int(6)).is_err());
        assert_eq!(
            TitleName::from_value(&Value::Int(1)).unwrap(),
            TitleName::None
        );
    }
}
