//! lineage-store: persistence layer of a genealogical base
//!
//! A base is a directory of binary files: the record arrays (`base`,
//! `base.acc`), the lookup indexes built from them, a `patches` overlay and
//! a `synchro_patches` log of committed changes.
//!
//! ## Layers
//!
//! 1. **codec**: the legacy tagged value encoding every file uses
//! 2. **domain**: typed records (persons, families, strings) and their ids
//! 3. **store**: lazy record arrays plus the patch overlay ([`Base`])
//! 4. **index**: name, surname, first-name and string-hash indexes
//! 5. **commit**: rebuild into temp files, then rename into place
//!
//! ## Usage
//!
//! ```rust,no_run
//! use lineage_store::{Base, Iper, Person, StoreConfig};
//!
//! # fn main() -> lineage_store::Result<()> {
//! let mut base = Base::open("/srv/bases/royals", StoreConfig::default())?;
//!
//! let ip = base.new_iper();
//! let mut person = Person::unknown(ip);
//! person.first_name = base.insert_string("Jeanne")?;
//! person.surname = base.insert_string("Dupont")?;
//! base.patch_person(ip, person);
//!
//! // Persist the overlay only
//! base.commit_patches()?;
//!
//! // Or rewrite every file with the patches folded in
//! base.commit()?;
//! assert_eq!(base.persons_of_name("jeanne dupont")?, vec![ip]);
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod collection;
pub mod commit;
pub mod config;
pub mod domain;
pub mod error;
pub mod index;
pub mod lock;
pub mod paths;
pub mod store;

pub use collection::{Collection, Key, Marker};
pub use config::{LockConfig, LockMode, StoreConfig};
pub use domain::{
    Access, Ascend, Couple, Descend, Divorce, Family, Fix, Ifam, Iper, Istr, Person, Record,
    RecordKind, RelationKind, Sex, Title, TitleName, Union,
};
pub use error::{ErrorKind, Result, StorageError};
pub use paths::SafeDir;
pub use store::{Base, Stored};
