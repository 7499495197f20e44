//! Derived indices
//!
//! | file | content |
//! |---|---|
//! | `names.inx` / `names.acc` | normalised-name hash buckets of person indices |
//! | `snames.inx` / `snames.dat` | surnames in collation order, each with its persons |
//! | `fnames.inx` / `fnames.dat` | same for first names |
//! | `strings.inx` | string hash heads and chain links |
//!
//! Indices are only rebuilt by a full commit. Lookups on a [`crate::Base`]
//! merge in persons changed by patches since.

mod builder;
mod collation;
mod name;
mod reader;

pub use builder::{
    build_indexes, string_table_size, IndexFiles, IndexInput, INX_HEADER_LEN, NO_LINK,
};
pub use collation::{collation_key, CollationEntry, Particles};
pub use name::{legacy_hash, misc_names, name_bucket, normalize_name, NAME_TABLE_SIZE};
pub use reader::{NameIndex, SortedIndex, StringTable};
