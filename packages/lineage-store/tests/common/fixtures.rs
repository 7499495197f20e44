//! Test fixtures

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use lineage_store::{Base, StoreConfig};
use tempfile::TempDir;

/// An empty base in a fresh temp directory
pub fn fresh_base() -> (TempDir, Base) {
    let tmp = TempDir::new().expect("temp dir");
    let base = Base::create(tmp.path(), "fixture.gw", StoreConfig::default()).expect("create base");
    (tmp, base)
}

/// Reopen the base stored in `dir` with the default configuration.
pub fn reopen(dir: &Path) -> Base {
    Base::open(dir, StoreConfig::default()).expect("reopen base")
}

/// Every regular file of `dir` (recursively), keyed by relative path.
pub fn dir_contents(dir: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut out = BTreeMap::new();
    collect(dir, dir, &mut out);
    out
}

fn collect(root: &Path, dir: &Path, out: &mut BTreeMap<String, Vec<u8>>) {
    for entry in fs::read_dir(dir).expect("read dir") {
        let path = entry.expect("dir entry").path();
        if path.is_dir() {
            collect(root, &path, out);
        } else {
            let rel = path
                .strip_prefix(root)
                .expect("under root")
                .to_string_lossy()
                .into_owned();
            out.insert(rel, fs::read(&path).expect("read file"));
        }
    }
}

/// Files of `dir` whose name ends with `suffix`.
pub fn files_with_suffix(dir: &Path, suffix: &str) -> Vec<String> {
    dir_contents(dir)
        .into_keys()
        .filter(|name| name.ends_with(suffix))
        .collect()
}
