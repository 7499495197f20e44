//! Temp-file writes and rename-based replacement

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Result, StorageError};
use crate::store::files::{BACKUP_SUFFIX, TEMP_SUFFIX};

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

pub fn temp_path(path: &Path) -> PathBuf {
    with_suffix(path, TEMP_SUFFIX)
}

pub fn backup_path(path: &Path) -> PathBuf {
    with_suffix(path, BACKUP_SUFFIX)
}

/// Create (or truncate) `path`, write `bytes` and flush them to disk.
pub fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(|e| StorageError::io(format!("Cannot create {}", path.display())).with_source(e))?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

/// Replace `path` with `bytes` through a temp file and a rename.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    replace_file(path, bytes, false)
}

/// Like [`atomic_write`], optionally keeping the previous file as `<path>~`.
pub fn replace_file(path: &Path, bytes: &[u8], keep_backup: bool) -> Result<()> {
    let temp = temp_path(path);
    if let Err(e) = write_synced(&temp, bytes) {
        remove_if_exists(&temp);
        return Err(e);
    }
    swap_in(&temp, path, keep_backup)
}

/// Move `temp` over `live`, first linking `live` to its backup name when
/// asked and when it exists. `live` never goes missing in between.
pub fn swap_in(temp: &Path, live: &Path, keep_backup: bool) -> Result<()> {
    if keep_backup && live.exists() {
        link_backup(live)?;
    }
    rename_or_copy(temp, live).map_err(|e| {
        StorageError::commit(format!(
            "Cannot move {} into place: {}",
            temp.display(),
            e.message
        ))
    })?;
    debug!(file = %live.display(), "Swapped in new file");
    Ok(())
}

/// Point `<live>~` at the current content of `live`, replacing any older
/// backup. Filesystems without hard links get a copy.
fn link_backup(live: &Path) -> Result<()> {
    let backup = backup_path(live);
    remove_if_exists(&backup);
    if let Err(e) = fs::hard_link(live, &backup) {
        debug!(file = %live.display(), error = %e, "Hard link refused, copying backup");
        fs::copy(live, &backup).map_err(|e| {
            StorageError::io(format!("Cannot back up {}", live.display())).with_source(e)
        })?;
    }
    Ok(())
}

/// `rename`, falling back to copy-then-delete across filesystems.
pub fn rename_or_copy(from: &Path, to: &Path) -> Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            debug!(from = %from.display(), to = %to.display(), "Cross-device rename, copying");
            copy_then_delete(from, to)
        }
        Err(e) => Err(StorageError::io(format!(
            "Cannot rename {} to {}",
            from.display(),
            to.display()
        ))
        .with_source(e)),
    }
}

pub(crate) fn copy_then_delete(from: &Path, to: &Path) -> Result<()> {
    fs::copy(from, to)?;
    OpenOptions::new().write(true).open(to)?.sync_all()?;
    fs::remove_file(from)?;
    Ok(())
}

#[cfg(unix)]
fn is_cross_device(e: &io::Error) -> bool {
    e.raw_os_error() == Some(libc::EXDEV)
}

#[cfg(not(unix))]
fn is_cross_device(_e: &io::Error) -> bool {
    false
}

/// Best-effort removal; a missing file is not an error.
pub fn remove_if_exists(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(file = %path.display(), error = %e, "Cannot remove file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_leaves_no_temp() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notes");
        atomic_write(&path, b"first").unwrap();
        atomic_write(&path, b"second").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert!(!temp_path(&path).exists());
        assert!(!backup_path(&path).exists());
    }

    #[test]
    fn test_replace_keeps_backup() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("patches");
        replace_file(&path, b"v1", true).unwrap();
        assert!(!backup_path(&path).exists());
        replace_file(&path, b"v2", true).unwrap();
        assert_eq!(fs::read(backup_path(&path)).unwrap(), b"v1");
        assert_eq!(fs::read(&path).unwrap(), b"v2");
    }

    #[cfg(unix)]
    #[test]
    fn test_backup_links_previous_file() {
        use std::os::unix::fs::MetadataExt;

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("base");
        fs::write(&path, b"old").unwrap();
        fs::write(backup_path(&path), b"older").unwrap();
        let inode = fs::metadata(&path).unwrap().ino();

        fs::write(temp_path(&path), b"new").unwrap();
        swap_in(&temp_path(&path), &path, true).unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"new");
        assert_eq!(fs::read(backup_path(&path)).unwrap(), b"old");
        assert_eq!(fs::metadata(backup_path(&path)).unwrap().ino(), inode);
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_copy_then_delete_moves_content() {
        let tmp = TempDir::new().unwrap();
        let from = tmp.path().join("a");
        let to = tmp.path().join("b");
        fs::write(&from, b"payload").unwrap();
        copy_then_delete(&from, &to).unwrap();
        assert!(!from.exists());
        assert_eq!(fs::read(&to).unwrap(), b"payload");
    }

    #[test]
    fn test_suffixes() {
        assert_eq!(temp_path(Path::new("/b/base")), PathBuf::from("/b/base.new"));
        assert_eq!(backup_path(Path::new("/b/base")), PathBuf::from("/b/base~"));
    }
}
