//! lineage-consang: consanguinity engine
//!
//! Reads the ancestry graph of a base through [`AncestryAccess`], computes
//! kinship coefficients between persons and writes every person's
//! consanguinity back as ascend patches.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use lineage_consang::{compute_all, RelationshipInfo};
//! use lineage_store::{Base, Iper, StoreConfig};
//!
//! # fn main() -> lineage_consang::Result<()> {
//! let mut base = Base::open("/srv/bases/royals", StoreConfig::default())?;
//!
//! // Relationship of two persons, with their nearest common ancestors
//! let mut info = RelationshipInfo::new(&base)?;
//! let r = info.relationship_and_links(&base, Iper(12), Iper(40), true)?;
//! println!("{} through {} ancestors", r.coefficient, r.tops.len());
//!
//! // Recompute and store every coefficient
//! compute_all(&mut base, false)?;
//! # Ok(())
//! # }
//! ```

pub mod access;
pub mod compute;
pub mod error;
pub mod relationship;
pub mod topo;

#[cfg(test)]
mod testing;

pub use access::AncestryAccess;
pub use compute::{compute_all, ComputeSummary};
pub use error::{ConsangError, Result};
pub use relationship::{BranchLen, Relationship, RelationshipInfo, TopAncestor};
pub use topo::{check_no_loop, topological_sort, Visit};
