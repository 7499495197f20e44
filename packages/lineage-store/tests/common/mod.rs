//! Common test utilities for lineage-store
//!
//! Fresh bases in temp directories, a family-tree builder and helpers to
//! compare directory contents.

#![allow(dead_code)]

mod builders;
mod fixtures;

pub use builders::*;
pub use fixtures::*;
