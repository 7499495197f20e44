use memmap2::Mmap;
use std::fs::File;
use std::ops::Deref;
use std::path::Path;

use crate::error::{Result, StorageError};

/// Read-only file contents, memory-mapped when non-empty
pub(crate) enum Blob {
    Mapped { _file: File, mmap: Mmap },
    Empty,
}

impl Blob {
    pub(crate) fn open(path: &Path) -> Result<Blob> {
        let file = File::open(path).map_err(|e| {
            StorageError::io(format!("Cannot open {}", path.display())).with_source(e)
        })?;
        if file.metadata()?.len() == 0 {
            return Ok(Blob::Empty);
        }
        // SAFETY: generation files are never written in place; a rebuild
        // renames new files over them, leaving this mapping intact.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Blob::Mapped { _file: file, mmap })
    }

    /// Like [`Blob::open`], but a missing file reads as empty.
    pub(crate) fn open_optional(path: &Path) -> Result<Blob> {
        if path.exists() {
            Blob::open(path)
        } else {
            Ok(Blob::Empty)
        }
    }
}

impl Deref for Blob {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Blob::Mapped { mmap, .. } => mmap,
            Blob::Empty => &[],
        }
    }
}

impl std::fmt::Debug for Blob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Blob({} bytes)", self.len())
    }
}
