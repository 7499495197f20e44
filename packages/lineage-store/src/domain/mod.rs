//! Record domain of a genealogical base
//!
//! # Identifiers
//!
//! - [`Iper`]: index into the person-indexed arrays (persons, ascends, unions)
//! - [`Ifam`]: index into the family-indexed arrays (families, couples, descends)
//! - [`Istr`]: index into the string array; [`Istr::EMPTY`] and [`Istr::QUEST`]
//!   exist in every base
//!
//! # Records
//!
//! One record type per array, all implementing [`Record`]. Deleting a record
//! patches its [`Record::tombstone`] rather than removing anything, so a
//! deleted index keeps decoding normally.
//!
//! ```rust
//! use lineage_store::domain::{Couple, Iper, Record};
//!
//! let couple = Couple::new(Iper(0), Iper(1));
//! assert!(!couple.is_tombstone());
//! assert!(Couple::tombstone(3).is_tombstone());
//! ```

mod ids;
mod kind;
mod records;

pub use ids::{Fix, Ifam, Iper, Istr};
pub use kind::RecordKind;
pub use records::{
    Access, Ascend, Couple, Descend, Divorce, Family, Person, Record, RelationKind, Sex, Title,
    TitleName, Union,
};
