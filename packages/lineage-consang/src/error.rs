use lineage_store::{Iper, StorageError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConsangError>;

#[derive(Error, Debug)]
pub enum ConsangError {
    /// The ancestry graph has a cycle through this person
    #[error("{person} is their own ancestor")]
    OwnAncestor { person: Iper },

    #[error("Store error: {0}")]
    Store(#[from] StorageError),
}
