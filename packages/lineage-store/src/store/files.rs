//! File names inside a base directory

pub const BASE: &str = "base";
pub const BASE_ACC: &str = "base.acc";
pub const NAMES_INX: &str = "names.inx";
pub const NAMES_ACC: &str = "names.acc";
pub const SNAMES_INX: &str = "snames.inx";
pub const SNAMES_DAT: &str = "snames.dat";
pub const FNAMES_INX: &str = "fnames.inx";
pub const FNAMES_DAT: &str = "fnames.dat";
pub const STRINGS_INX: &str = "strings.inx";
pub const PATCHES: &str = "patches";
pub const SYNCHRO: &str = "synchro_patches";
pub const NOTES: &str = "notes";
pub const NOTES_DIR: &str = "notes_d";
pub const PARTICLES: &str = "particles.txt";

/// Session counters invalidated by a rebuild
pub const TRANSIENT: &[&str] = &["patches", "patches~", "tstab", "tstab_visitor", "nb_persons"];

/// Files replaced as a unit by a rebuild, in swap order
pub const GENERATION: &[&str] = &[
    BASE,
    BASE_ACC,
    NAMES_INX,
    NAMES_ACC,
    SNAMES_INX,
    SNAMES_DAT,
    FNAMES_INX,
    FNAMES_DAT,
    STRINGS_INX,
];

pub const TEMP_SUFFIX: &str = ".new";
pub const BACKUP_SUFFIX: &str = "~";

pub fn temp_name(name: &str) -> String {
    format!("{}{}", name, TEMP_SUFFIX)
}

pub fn backup_name(name: &str) -> String {
    format!("{}{}", name, BACKUP_SUFFIX)
}

/// Relative path of a notes topic file.
pub fn topic_file(topic: &str) -> String {
    format!("{}/{}.txt", NOTES_DIR, topic)
}
