//! Record store with patch overlay
//!
//! A [`Base`] reads records from the seven arrays of the `base` file and
//! overlays two patch layers on top:
//!
//! ```text
//! read(i) = pending[i]  ?:  committed[i]  ?:  array[i]
//! ```
//!
//! Pending patches live in memory until [`Base::commit_patches`] folds them
//! into the `patches` file. [`Base::commit`] rewrites the whole base with
//! every patch applied.

mod array;
mod base;
pub(crate) mod blob;
pub mod files;
pub mod header;
mod patch;
pub mod synchro;

pub use array::RecordArray;
pub use base::{Base, Stored};
pub use header::{BaseHeader, BASE_MAGIC, PATCHES_MAGIC, SYNCHRO_MAGIC};
pub use patch::{PatchTable, Patches};
pub use synchro::{SynchroEntry, SynchroLog};
