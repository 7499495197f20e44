//! Rebuild protocol
//!
//! A rebuild runs in two phases:
//!
//! 1. [`PreparedCommit::prepare`] writes the new generation (`base`,
//!    `base.acc`, every index file and the ancillary text files) next to the
//!    live files under `<name>.new`. Nothing live is touched; dropping the
//!    prepared commit removes every temp file.
//! 2. [`PreparedCommit::publish`] renames each temp file over its live
//!    counterpart (keeping `<name>~` when backups are on), deletes the
//!    transient session files, and appends a synchro marker.

mod swap;
mod writer;

pub use swap::{
    atomic_write, backup_path, remove_if_exists, rename_or_copy, replace_file, swap_in,
    temp_path, write_synced,
};
pub use writer::{write_base, Snapshot};

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::domain::{Ifam, Iper};
use crate::error::{Result, StorageError};
use crate::index::{build_indexes, IndexInput, Particles};
use crate::paths::SafeDir;
use crate::store::files;
use crate::store::synchro::{SynchroEntry, SynchroLog};

/// Everything a rebuild writes
#[derive(Debug, Clone, Default)]
pub struct CommitInput {
    pub snapshot: Snapshot,
    pub origin: String,
    pub particles: Particles,
    /// Ancillary text files as (path relative to the base directory, content)
    pub texts: Vec<(String, String)>,
    pub touched_persons: BTreeSet<Iper>,
    pub touched_families: BTreeSet<Ifam>,
}

#[derive(Debug)]
struct Staged {
    live: PathBuf,
    temp: PathBuf,
}

/// A fully written, not yet visible generation
#[derive(Debug)]
pub struct PreparedCommit {
    dir: SafeDir,
    keep_backups: bool,
    staged: Vec<Staged>,
    touched_persons: BTreeSet<Iper>,
    touched_families: BTreeSet<Ifam>,
    published: bool,
}

impl PreparedCommit {
    /// Write every file of the new generation to its temp path.
    ///
    /// On error the temp files written so far are removed and the live
    /// generation is untouched.
    pub fn prepare(dir: &SafeDir, config: &StoreConfig, input: CommitInput) -> Result<Self> {
        let mut prepared = PreparedCommit {
            dir: dir.clone(),
            keep_backups: config.keep_backups,
            staged: Vec::new(),
            touched_persons: input.touched_persons.clone(),
            touched_families: input.touched_families.clone(),
            published: false,
        };

        // 1. arrays
        let base = prepared.stage(files::BASE)?;
        let acc = prepared.stage(files::BASE_ACC)?;
        let header = write_base(&input.snapshot, &input.origin, &base, &acc)?;
        debug!(
            persons = header.persons,
            families = header.families,
            strings = header.strings,
            "Wrote new base arrays"
        );

        // 2. indices
        let indexes = build_indexes(IndexInput {
            persons: &input.snapshot.persons,
            strings: &input.snapshot.strings,
            particles: &input.particles,
            string_table_factor: config.string_table_factor,
        })?;
        for (name, bytes) in indexes.files() {
            let temp = prepared.stage(name)?;
            write_synced(&temp, bytes)?;
        }

        // 3. ancillary text
        let particles_text = input.particles.to_text();
        let texts = input
            .texts
            .iter()
            .map(|(path, text)| (path.as_str(), text.as_str()))
            .chain(std::iter::once((files::PARTICLES, particles_text.as_str())));
        for (relative, text) in texts {
            let temp = prepared.stage(relative)?;
            if let Some(parent) = temp.parent() {
                fs::create_dir_all(parent)?;
            }
            write_synced(&temp, text.as_bytes())?;
        }

        info!(files = prepared.staged.len(), "Prepared new generation");
        Ok(prepared)
    }

    fn stage(&mut self, relative: &str) -> Result<PathBuf> {
        let live = self.dir.resolve(relative)?;
        let temp = temp_path(&live);
        self.staged.push(Staged {
            live,
            temp: temp.clone(),
        });
        Ok(temp)
    }

    /// Temp files written by [`PreparedCommit::prepare`].
    pub fn temp_paths(&self) -> impl Iterator<Item = &Path> {
        self.staged.iter().map(|s| s.temp.as_path())
    }

    /// Live files this commit replaces.
    pub fn live_paths(&self) -> impl Iterator<Item = &Path> {
        self.staged.iter().map(|s| s.live.as_path())
    }

    /// Make the new generation live. Returns the new synchro log length.
    pub fn publish(mut self) -> Result<usize> {
        for staged in &self.staged {
            swap_in(&staged.temp, &staged.live, self.keep_backups)?;
        }
        self.published = true;

        for name in files::TRANSIENT {
            remove_if_exists(&self.dir.resolve(name)?);
        }
        let synchro = self.dir.resolve(files::SYNCHRO)?;
        let entry = SynchroEntry::now(&self.touched_persons, &self.touched_families);
        let len = SynchroLog::append(&synchro, entry).map_err(|e| {
            StorageError::commit(format!("New generation live but synchro append failed: {}", e))
        })?;

        info!(files = self.staged.len(), synchro = len, "Published new generation");
        Ok(len)
    }
}

impl Drop for PreparedCommit {
    fn drop(&mut self) {
        if self.published {
            return;
        }
        for staged in &self.staged {
            remove_if_exists(&staged.temp);
        }
        if !self.staged.is_empty() {
            warn!(files = self.staged.len(), "Discarded unpublished generation");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Ascend, Person, Union};
    use tempfile::TempDir;

    fn input() -> CommitInput {
        CommitInput {
            snapshot: Snapshot {
                persons: vec![Person::unknown(Iper(0))],
                ascends: vec![Ascend::default()],
                unions: vec![Union::default()],
                strings: vec![String::new(), "?".to_string()],
                ..Snapshot::default()
            },
            origin: "unit.gw".to_string(),
            texts: vec![("notes_d/history.txt".to_string(), "Once".to_string())],
            ..CommitInput::default()
        }
    }

    #[test]
    fn test_prepare_then_publish() {
        let tmp = TempDir::new().unwrap();
        let dir = SafeDir::new(tmp.path(), &[]);
        let config = StoreConfig::default();

        let prepared = PreparedCommit::prepare(&dir, &config, input()).unwrap();
        assert!(prepared.temp_paths().all(|p| p.exists()));
        assert!(!tmp.path().join("base").exists());

        assert_eq!(prepared.publish().unwrap(), 1);
        for name in files::GENERATION {
            assert!(tmp.path().join(name).exists(), "{} missing", name);
            assert!(!tmp.path().join(files::temp_name(name)).exists());
        }
        assert_eq!(
            fs::read_to_string(tmp.path().join("notes_d/history.txt")).unwrap(),
            "Once"
        );
        assert!(tmp.path().join(files::PARTICLES).exists());
    }

    #[test]
    fn test_drop_discards_temps() {
        let tmp = TempDir::new().unwrap();
        let dir = SafeDir::new(tmp.path(), &[]);
        let prepared = PreparedCommit::prepare(&dir, &StoreConfig::default(), input()).unwrap();
        let temps: Vec<PathBuf> = prepared.temp_paths().map(Path::to_path_buf).collect();
        drop(prepared);
        assert!(temps.iter().all(|p| !p.exists()));
        assert!(!tmp.path().join("base").exists());
    }

    #[test]
    fn test_rejected_text_path_aborts_prepare() {
        let tmp = TempDir::new().unwrap();
        let dir = SafeDir::new(tmp.path(), &[]);
        let mut bad = input();
        bad.texts.push(("../escape.txt".to_string(), "x".to_string()));
        let err = PreparedCommit::prepare(&dir, &StoreConfig::default(), bad).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::PathRejected);
        let stray_files = fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .count();
        assert_eq!(stray_files, 0);
    }

    #[test]
    fn test_publish_removes_transient_files_and_keeps_backups() {
        let tmp = TempDir::new().unwrap();
        let dir = SafeDir::new(tmp.path(), &[]);
        let config = StoreConfig::default();
        PreparedCommit::prepare(&dir, &config, input())
            .unwrap()
            .publish()
            .unwrap();
        let first = fs::read(tmp.path().join("base")).unwrap();

        fs::write(tmp.path().join("patches"), b"stale").unwrap();
        fs::write(tmp.path().join("tstab"), b"stale").unwrap();
        let mut second = input();
        second.origin = "renamed.gw".to_string();
        PreparedCommit::prepare(&dir, &config, second)
            .unwrap()
            .publish()
            .unwrap();

        assert!(!tmp.path().join("patches").exists());
        assert!(!tmp.path().join("tstab").exists());
        assert_eq!(fs::read(tmp.path().join("base~")).unwrap(), first);
        assert_ne!(fs::read(tmp.path().join("base")).unwrap(), first);
    }
}
