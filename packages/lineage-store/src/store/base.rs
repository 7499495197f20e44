use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Component, Path};
use std::sync::Arc;

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use super::array::RecordArray;
use super::blob::Blob;
use super::files;
use super::header::BaseHeader;
use super::patch::{PatchTable, Patches};
use super::synchro::{SynchroEntry, SynchroLog};
use crate::collection::{Collection, Marker};
use crate::commit::{atomic_write, replace_file, CommitInput, PreparedCommit, Snapshot};
use crate::config::StoreConfig;
use crate::domain::{
    Ascend, Couple, Descend, Family, Ifam, Iper, Istr, Person, Record, Union,
};
use crate::error::{ErrorKind, Result, StorageError};
use crate::index::{
    collation_key, legacy_hash, misc_names, name_bucket, normalize_name, NameIndex, Particles,
    SortedIndex, StringTable,
};
use crate::lock;
use crate::paths::SafeDir;

// ═══════════════════════════════════════════════════════════════════════════
// Arrays and per-kind dispatch
// ═══════════════════════════════════════════════════════════════════════════

/// The seven record arrays of the current generation
#[derive(Debug)]
pub struct Arrays {
    pub persons: RecordArray<Person>,
    pub ascends: RecordArray<Ascend>,
    pub unions: RecordArray<Union>,
    pub families: RecordArray<Family>,
    pub couples: RecordArray<Couple>,
    pub descends: RecordArray<Descend>,
    pub strings: RecordArray<String>,
}

impl Arrays {
    fn new(data: Arc<Blob>, acc: Arc<Blob>, header: &BaseHeader) -> Self {
        Self {
            persons: RecordArray::new(data.clone(), acc.clone(), header),
            ascends: RecordArray::new(data.clone(), acc.clone(), header),
            unions: RecordArray::new(data.clone(), acc.clone(), header),
            families: RecordArray::new(data.clone(), acc.clone(), header),
            couples: RecordArray::new(data.clone(), acc.clone(), header),
            descends: RecordArray::new(data.clone(), acc.clone(), header),
            strings: RecordArray::new(data, acc, header),
        }
    }

    fn unload_all(&mut self) {
        self.persons.unload();
        self.ascends.unload();
        self.unions.unload();
        self.families.unload();
        self.couples.unload();
        self.descends.unload();
        self.strings.unload();
    }
}

/// Record kinds a [`Base`] stores: selects the array and patch table of
/// the kind.
pub trait Stored: Record {
    fn array(arrays: &Arrays) -> &RecordArray<Self>;
    fn array_mut(arrays: &mut Arrays) -> &mut RecordArray<Self>;
    fn table(patches: &Patches) -> &PatchTable<Self>;
    fn table_mut(patches: &mut Patches) -> &mut PatchTable<Self>;
}

macro_rules! impl_stored {
    ($ty:ty, $field:ident) => {
        impl Stored for $ty {
            fn array(arrays: &Arrays) -> &RecordArray<Self> {
                &arrays.$field
            }
            fn array_mut(arrays: &mut Arrays) -> &mut RecordArray<Self> {
                &mut arrays.$field
            }
            fn table(patches: &Patches) -> &PatchTable<Self> {
                &patches.$field
            }
            fn table_mut(patches: &mut Patches) -> &mut PatchTable<Self> {
                &mut patches.$field
            }
        }
    };
}

impl_stored!(Person, persons);
impl_stored!(Ascend, ascends);
impl_stored!(Union, unions);
impl_stored!(Family, families);
impl_stored!(Couple, couples);
impl_stored!(Descend, descends);
impl_stored!(String, strings);

// ═══════════════════════════════════════════════════════════════════════════
// Generation
// ═══════════════════════════════════════════════════════════════════════════

/// Files produced by one rebuild
#[derive(Debug)]
struct Generation {
    header: BaseHeader,
    arrays: Arrays,
    names: NameIndex,
    surnames: SortedIndex,
    first_names: SortedIndex,
    strings: StringTable,
}

impl Generation {
    fn open(dir: &SafeDir) -> Result<Self> {
        let base_path = dir.resolve(files::BASE)?;
        let file = File::open(&base_path).map_err(|e| {
            StorageError::io(format!("Cannot open {}", base_path.display())).with_source(e)
        })?;
        let header = BaseHeader::read(&mut BufReader::new(file))?;

        let data = Arc::new(Blob::open(&base_path)?);
        let acc = Arc::new(Blob::open(&dir.resolve(files::BASE_ACC)?)?);
        let arrays = Arrays::new(data, acc, &header);

        Ok(Self {
            arrays,
            names: NameIndex::open(
                &dir.resolve(files::NAMES_INX)?,
                &dir.resolve(files::NAMES_ACC)?,
            )?,
            surnames: SortedIndex::open(
                &dir.resolve(files::SNAMES_INX)?,
                &dir.resolve(files::SNAMES_DAT)?,
            )?,
            first_names: SortedIndex::open(
                &dir.resolve(files::FNAMES_INX)?,
                &dir.resolve(files::FNAMES_DAT)?,
            )?,
            strings: StringTable::open(&dir.resolve(files::STRINGS_INX)?)?,
            header,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Base
// ═══════════════════════════════════════════════════════════════════════════

/// An open genealogical base
#[derive(Debug)]
pub struct Base {
    dir: SafeDir,
    config: StoreConfig,
    generation: Generation,
    committed: Patches,
    pending: Patches,
    /// Text of every patched string, for duplicate detection
    patched_strings: FxHashMap<String, Istr>,
    /// Pending ancillary text, keyed by path relative to the base directory
    pending_texts: BTreeMap<String, String>,
    particles: Particles,
    synchro_len: usize,
}

impl Base {
    /// Open the base stored in `dir`.
    pub fn open(dir: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
        let config = config.validate()?;
        let dir = SafeDir::new(dir.as_ref(), &config.safe_dirs);
        let generation = Generation::open(&dir)?;
        let committed = Patches::read(&dir.resolve(files::PATCHES)?)?;
        let synchro_len = SynchroLog::read(&dir.resolve(files::SYNCHRO)?)?.len();
        let particles = read_particles(&dir)?;

        info!(
            dir = %dir.root().display(),
            persons = generation.header.persons,
            families = generation.header.families,
            patched = !committed.is_empty(),
            "Opened base"
        );

        let mut base = Self {
            dir,
            config,
            generation,
            committed,
            pending: Patches::default(),
            patched_strings: FxHashMap::default(),
            pending_texts: BTreeMap::new(),
            particles,
            synchro_len,
        };
        base.rebuild_patched_strings();
        Ok(base)
    }

    /// Create an empty base in `dir` holding only the reserved strings.
    pub fn create(dir: impl AsRef<Path>, origin: &str, config: StoreConfig) -> Result<Self> {
        let config = config.validate()?;
        fs::create_dir_all(dir.as_ref())?;
        let safe = SafeDir::new(dir.as_ref(), &config.safe_dirs);
        if safe.resolve(files::BASE)?.exists() {
            return Err(StorageError::commit(format!(
                "A base already exists in {}",
                safe.root().display()
            )));
        }

        let input = CommitInput {
            snapshot: Snapshot {
                strings: vec![String::new(), "?".to_string()],
                ..Snapshot::default()
            },
            origin: origin.to_string(),
            particles: Particles::default(),
            ..CommitInput::default()
        };
        {
            let _guard = lock::acquire(&safe, &config.lock)?;
            PreparedCommit::prepare(&safe, &config, input)?.publish()?;
        }
        info!(dir = %safe.root().display(), "Created empty base");
        Self::open(dir, config)
    }

    pub fn dir(&self) -> &SafeDir {
        &self.dir
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Name of the file the base was imported from.
    pub fn origin(&self) -> &str {
        &self.generation.header.origin
    }

    pub fn arrays(&self) -> &Arrays {
        &self.generation.arrays
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty() || !self.pending_texts.is_empty()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Generic record access
    // ═══════════════════════════════════════════════════════════════════════

    /// Record `i`: pending patch, else committed patch, else the array.
    pub fn get<T: Stored>(&self, i: usize) -> Result<T> {
        match T::table(&self.pending).get(i) {
            Some(record) => Ok(record.clone()),
            None => self.get_nopending(i),
        }
    }

    /// Record `i` ignoring pending patches.
    pub fn get_nopending<T: Stored>(&self, i: usize) -> Result<T> {
        if let Some(record) = T::table(&self.committed).get(i) {
            return Ok(record.clone());
        }
        T::array(&self.generation.arrays).get(i)
    }

    fn get_or_tombstone<T: Stored>(&self, i: usize) -> Result<T> {
        match self.get::<T>(i) {
            Err(e) if e.kind == ErrorKind::NotFound => Ok(T::tombstone(i)),
            other => other,
        }
    }

    /// Record a pending replacement for record `i`.
    pub fn patch<T: Stored>(&mut self, i: usize, record: T) {
        T::table_mut(&mut self.pending).insert(i, record);
    }

    /// Replace record `i` by its tombstone.
    pub fn delete<T: Stored>(&mut self, i: usize) {
        self.patch(i, T::tombstone(i));
    }

    pub fn load<T: Stored>(&mut self) -> Result<()> {
        T::array_mut(&mut self.generation.arrays).load().map(|_| ())
    }

    pub fn unload<T: Stored>(&mut self) {
        T::array_mut(&mut self.generation.arrays).unload();
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Typed accessors
    // ═══════════════════════════════════════════════════════════════════════

    pub fn get_person(&self, ip: Iper) -> Result<Person> {
        self.get(ip.index())
    }

    pub fn get_ascend(&self, ip: Iper) -> Result<Ascend> {
        self.get(ip.index())
    }

    pub fn get_union(&self, ip: Iper) -> Result<Union> {
        self.get(ip.index())
    }

    pub fn get_family(&self, ifam: Ifam) -> Result<Family> {
        self.get(ifam.index())
    }

    pub fn get_couple(&self, ifam: Ifam) -> Result<Couple> {
        self.get(ifam.index())
    }

    pub fn get_descend(&self, ifam: Ifam) -> Result<Descend> {
        self.get(ifam.index())
    }

    pub fn get_string(&self, istr: Istr) -> Result<String> {
        self.get(istr.index())
    }

    pub fn get_person_nopending(&self, ip: Iper) -> Result<Person> {
        self.get_nopending(ip.index())
    }

    pub fn get_ascend_nopending(&self, ip: Iper) -> Result<Ascend> {
        self.get_nopending(ip.index())
    }

    pub fn get_union_nopending(&self, ip: Iper) -> Result<Union> {
        self.get_nopending(ip.index())
    }

    pub fn get_family_nopending(&self, ifam: Ifam) -> Result<Family> {
        self.get_nopending(ifam.index())
    }

    pub fn get_couple_nopending(&self, ifam: Ifam) -> Result<Couple> {
        self.get_nopending(ifam.index())
    }

    pub fn get_descend_nopending(&self, ifam: Ifam) -> Result<Descend> {
        self.get_nopending(ifam.index())
    }

    pub fn get_string_nopending(&self, istr: Istr) -> Result<String> {
        self.get_nopending(istr.index())
    }

    pub fn patch_person(&mut self, ip: Iper, person: Person) {
        self.patch(ip.index(), person);
    }

    pub fn patch_ascend(&mut self, ip: Iper, ascend: Ascend) {
        self.patch(ip.index(), ascend);
    }

    pub fn patch_union(&mut self, ip: Iper, union: Union) {
        self.patch(ip.index(), union);
    }

    pub fn patch_family(&mut self, ifam: Ifam, family: Family) {
        self.patch(ifam.index(), family);
    }

    pub fn patch_couple(&mut self, ifam: Ifam, couple: Couple) {
        self.patch(ifam.index(), couple);
    }

    pub fn patch_descend(&mut self, ifam: Ifam, descend: Descend) {
        self.patch(ifam.index(), descend);
    }

    pub fn patch_string(&mut self, istr: Istr, s: String) {
        self.patched_strings.insert(s.clone(), istr);
        self.patch(istr.index(), s);
    }

    pub fn delete_person(&mut self, ip: Iper) {
        self.delete::<Person>(ip.index());
    }

    pub fn delete_ascend(&mut self, ip: Iper) {
        self.delete::<Ascend>(ip.index());
    }

    pub fn delete_union(&mut self, ip: Iper) {
        self.delete::<Union>(ip.index());
    }

    pub fn delete_family(&mut self, ifam: Ifam) {
        self.delete::<Family>(ifam.index());
    }

    pub fn delete_couple(&mut self, ifam: Ifam) {
        self.delete::<Couple>(ifam.index());
    }

    pub fn delete_descend(&mut self, ifam: Ifam) {
        self.delete::<Descend>(ifam.index());
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Counts and allocation
    // ═══════════════════════════════════════════════════════════════════════

    pub fn nb_of_persons(&self) -> usize {
        (self.generation.header.persons as usize)
            .max(self.committed.person_count())
            .max(self.pending.person_count())
    }

    pub fn nb_of_families(&self) -> usize {
        (self.generation.header.families as usize)
            .max(self.committed.family_count())
            .max(self.pending.family_count())
    }

    pub fn nb_of_strings(&self) -> usize {
        (self.generation.header.strings as usize)
            .max(self.committed.string_count())
            .max(self.pending.string_count())
    }

    /// Claim the next free person index. The caller patches its person,
    /// ascend and union records.
    pub fn new_iper(&mut self) -> Iper {
        let ip = self.nb_of_persons();
        self.pending.persons.reserve(ip + 1);
        Iper(ip as u32)
    }

    /// Claim the next free family index. The caller patches its family,
    /// couple and descend records.
    pub fn new_ifam(&mut self) -> Ifam {
        let ifam = self.nb_of_families();
        self.pending.families.reserve(ifam + 1);
        Ifam(ifam as u32)
    }

    pub fn ipers(&self) -> Collection<Iper> {
        Collection::new(self.nb_of_persons())
    }

    pub fn ifams(&self) -> Collection<Ifam> {
        Collection::new(self.nb_of_families())
    }

    pub fn iper_marker<V: Clone>(&self, default: V) -> Marker<Iper, V> {
        self.ipers().marker(default)
    }

    pub fn ifam_marker<V: Clone>(&self, default: V) -> Marker<Ifam, V> {
        self.ifams().marker(default)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Strings
    // ═══════════════════════════════════════════════════════════════════════

    /// Index of a string equal to `s`, if the base has one.
    pub fn find_string(&self, s: &str) -> Result<Option<Istr>> {
        if let Some(istr) = self.patched_strings.get(s) {
            if self.get_string(*istr)? == s {
                return Ok(Some(*istr));
            }
        }
        for istr in self.generation.strings.chain(legacy_hash(s.as_bytes()))? {
            if istr.index() < self.nb_of_strings() && self.get_string(istr)? == s {
                return Ok(Some(istr));
            }
        }
        Ok(None)
    }

    /// Index of `s`, allocating a new string if needed.
    pub fn insert_string(&mut self, s: &str) -> Result<Istr> {
        if let Some(istr) = self.find_string(s)? {
            return Ok(istr);
        }
        let istr = Istr(self.nb_of_strings() as u32);
        self.patch_string(istr, s.to_string());
        Ok(istr)
    }

    fn rebuild_patched_strings(&mut self) {
        self.patched_strings = self
            .committed
            .strings
            .iter()
            .chain(self.pending.strings.iter())
            .map(|(i, s)| (s.clone(), Istr(i as u32)))
            .collect();
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Name lookups
    // ═══════════════════════════════════════════════════════════════════════

    fn patched_persons(&self) -> BTreeSet<Iper> {
        self.committed
            .persons
            .indices()
            .chain(self.pending.persons.indices())
            .map(|i| Iper(i as u32))
            .collect()
    }

    /// Persons filed under a patched string in the surname or first-name
    /// index of the current generation.
    fn persons_of_patched_strings(&self) -> Result<BTreeSet<Iper>> {
        let mut found = BTreeSet::new();
        for i in self
            .committed
            .strings
            .indices()
            .chain(self.pending.strings.indices())
        {
            let istr = Istr(i as u32);
            found.extend(self.generation.surnames.persons_of(istr)?);
            found.extend(self.generation.first_names.persons_of(istr)?);
        }
        Ok(found)
    }

    /// Persons known under `name` (any first name, surname, alias or title
    /// combination), ascending.
    ///
    /// Persons changed by patches are always checked, and so are persons
    /// whose first name or surname string was patched. A patched title or
    /// qualifier string is seen only after the next rebuild.
    pub fn persons_of_name(&self, name: &str) -> Result<Vec<Iper>> {
        let key = normalize_name(name);
        if key.is_empty() {
            return Ok(Vec::new());
        }
        let mut candidates: BTreeSet<Iper> = self
            .generation
            .names
            .bucket(name_bucket(name))?
            .into_iter()
            .collect();
        candidates.extend(self.patched_persons());
        candidates.extend(self.persons_of_patched_strings()?);

        let mut found = Vec::new();
        for ip in candidates {
            let person = self.get_person(ip)?;
            if misc_names(&person, |s| self.get_string(s))?.contains(&key) {
                found.push(ip);
            }
        }
        Ok(found)
    }

    pub fn persons_of_surname(&self, istr: Istr) -> Result<Vec<Iper>> {
        self.merge_sorted_lookup(&self.generation.surnames, istr, |p| {
            p.surname == istr || p.surnames_aliases.contains(&istr)
        })
    }

    pub fn persons_of_first_name(&self, istr: Istr) -> Result<Vec<Iper>> {
        self.merge_sorted_lookup(&self.generation.first_names, istr, |p| {
            p.first_name == istr || p.first_names_aliases.contains(&istr)
        })
    }

    fn merge_sorted_lookup<F>(&self, index: &SortedIndex, istr: Istr, matches: F) -> Result<Vec<Iper>>
    where
        F: Fn(&Person) -> bool,
    {
        let patched = self.patched_persons();
        let mut found: BTreeSet<Iper> = index
            .persons_of(istr)?
            .into_iter()
            .filter(|ip| !patched.contains(ip))
            .collect();
        for ip in patched {
            let person = self.get_person(ip)?;
            if !person.is_tombstone() && matches(&person) {
                found.insert(ip);
            }
        }
        Ok(found.into_iter().collect())
    }

    /// Surname string equal to `s` under collation, preferring an exact
    /// match.
    pub fn find_surname(&self, s: &str) -> Result<Option<Istr>> {
        find_in_sorted(&self.generation.surnames, s, &self.particles, |i| {
            self.get_string(i)
        })
    }

    pub fn find_first_name(&self, s: &str) -> Result<Option<Istr>> {
        find_in_sorted(&self.generation.first_names, s, &self.particles, |i| {
            self.get_string(i)
        })
    }

    /// Surnames whose collation key starts with that of `prefix`, in order.
    pub fn surnames_starting_with(&self, prefix: &str) -> Result<Vec<Istr>> {
        let index = &self.generation.surnames;
        let key = collation_key(prefix, &self.particles);
        let mut pos = index.lower_bound(&key, &self.particles, |i| self.get_string(i))?;
        let mut out = Vec::new();
        while let Some(istr) = index.istr_at(pos) {
            if !collation_key(&self.get_string(istr)?, &self.particles).starts_with(&key) {
                break;
            }
            out.push(istr);
            pos += 1;
        }
        Ok(out)
    }

    pub fn first_surname(&self) -> Option<Istr> {
        self.generation.surnames.first()
    }

    /// Surname after `istr` in collation order.
    pub fn next_surname(&self, istr: Istr) -> Option<Istr> {
        self.generation.surnames.next(istr)
    }

    pub fn first_first_name(&self) -> Option<Istr> {
        self.generation.first_names.first()
    }

    pub fn next_first_name(&self, istr: Istr) -> Option<Istr> {
        self.generation.first_names.next(istr)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Ancillary text
    // ═══════════════════════════════════════════════════════════════════════

    /// Main notes (`None`) or a notes topic.
    pub fn read_notes(&self, topic: Option<&str>) -> Result<String> {
        let relative = notes_file(topic)?;
        if let Some(text) = self.pending_texts.get(&relative) {
            return Ok(text.clone());
        }
        let path = self.dir.resolve(&relative)?;
        if path.exists() {
            Ok(fs::read_to_string(path)?)
        } else {
            Ok(String::new())
        }
    }

    /// Stage new notes text; written by the next commit.
    pub fn write_notes(&mut self, topic: Option<&str>, text: &str) -> Result<()> {
        let relative = notes_file(topic)?;
        self.dir.resolve(&relative)?;
        self.pending_texts.insert(relative, text.to_string());
        Ok(())
    }

    pub fn particles(&self) -> &Particles {
        &self.particles
    }

    /// Replace the particle list; written by the next rebuild.
    pub fn set_particles(&mut self, particles: Particles) {
        self.particles = particles;
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Persistence
    // ═══════════════════════════════════════════════════════════════════════

    /// Fold pending patches into the `patches` file and flush staged notes.
    ///
    /// Fails with [`ErrorKind::Stale`] when another handle committed since
    /// this one last read the base; nothing is written in that case.
    pub fn commit_patches(&mut self) -> Result<()> {
        let _guard = lock::acquire(&self.dir, &self.config.lock)?;
        self.ensure_current()?;

        let mut merged = self.committed.clone();
        merged.absorb(self.pending.clone());
        let patches_path = self.dir.resolve(files::PATCHES)?;
        replace_file(&patches_path, &merged.to_bytes()?, self.config.keep_backups)?;

        for (relative, text) in &self.pending_texts {
            let path = self.dir.resolve(relative)?;
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            atomic_write(&path, text.as_bytes())?;
        }

        let entry = SynchroEntry::now(
            &self.pending.touched_persons(),
            &self.pending.touched_families(),
        );
        self.synchro_len = SynchroLog::append(&self.dir.resolve(files::SYNCHRO)?, entry)?;

        debug!(
            persons = self.pending.persons.len(),
            families = self.pending.families.len(),
            strings = self.pending.strings.len(),
            "Committed patches"
        );
        self.committed = merged;
        self.pending = Patches::default();
        self.pending_texts.clear();
        Ok(())
    }

    /// Every array with all patches applied.
    pub fn snapshot(&self) -> Result<Snapshot> {
        Ok(Snapshot {
            persons: self.collect_all::<Person>(self.nb_of_persons())?,
            ascends: self.collect_all::<Ascend>(self.nb_of_persons())?,
            unions: self.collect_all::<Union>(self.nb_of_persons())?,
            families: self.collect_all::<Family>(self.nb_of_families())?,
            couples: self.collect_all::<Couple>(self.nb_of_families())?,
            descends: self.collect_all::<Descend>(self.nb_of_families())?,
            strings: self.collect_all::<String>(self.nb_of_strings())?,
        })
    }

    fn collect_all<T: Stored>(&self, len: usize) -> Result<Vec<T>> {
        (0..len)
            .into_par_iter()
            .map(|i| self.get_or_tombstone::<T>(i))
            .collect()
    }

    /// Input of a full rebuild of this base.
    pub fn commit_input(&self) -> Result<CommitInput> {
        let mut texts: Vec<(String, String)> = Vec::new();
        if !self.pending_texts.contains_key(files::NOTES) {
            let notes = self.dir.resolve(files::NOTES)?;
            if notes.exists() {
                texts.push((files::NOTES.to_string(), fs::read_to_string(notes)?));
            }
        }
        texts.extend(
            self.pending_texts
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        let mut touched_persons = self.committed.touched_persons();
        touched_persons.extend(self.pending.touched_persons());
        let mut touched_families = self.committed.touched_families();
        touched_families.extend(self.pending.touched_families());

        Ok(CommitInput {
            snapshot: self.snapshot()?,
            origin: self.origin().to_string(),
            particles: self.particles.clone(),
            texts,
            touched_persons,
            touched_families,
        })
    }

    /// Rewrite the base with every patch applied and reopen it.
    ///
    /// Fails with [`ErrorKind::Stale`] like [`Base::commit_patches`].
    pub fn commit(&mut self) -> Result<()> {
        {
            let _guard = lock::acquire(&self.dir, &self.config.lock)?;
            self.ensure_current()?;
            let input = self.commit_input()?;
            PreparedCommit::prepare(&self.dir, &self.config, input)?.publish()?;
        }
        self.pending = Patches::default();
        self.pending_texts.clear();
        self.reopen()?;
        info!(
            persons = self.nb_of_persons(),
            families = self.nb_of_families(),
            strings = self.nb_of_strings(),
            "Rebuilt base"
        );
        Ok(())
    }

    fn reopen(&mut self) -> Result<()> {
        self.generation = Generation::open(&self.dir)?;
        self.committed = Patches::read(&self.dir.resolve(files::PATCHES)?)?;
        self.synchro_len = SynchroLog::read(&self.dir.resolve(files::SYNCHRO)?)?.len();
        self.particles = read_particles(&self.dir)?;
        self.rebuild_patched_strings();
        Ok(())
    }

    /// Must run under the lock.
    fn ensure_current(&self) -> Result<()> {
        let len = SynchroLog::read(&self.dir.resolve(files::SYNCHRO)?)?.len();
        if len != self.synchro_len {
            warn!(seen = self.synchro_len, now = len, "Refusing to write over a newer base");
            return Err(StorageError::stale(format!(
                "{} changed on disk ({} commits seen, {} now)",
                self.dir.root().display(),
                self.synchro_len,
                len
            )));
        }
        Ok(())
    }

    /// Drop every pending patch and staged text.
    pub fn discard_pending(&mut self) {
        self.pending = Patches::default();
        self.pending_texts.clear();
        self.rebuild_patched_strings();
    }

    /// Drop every loaded array.
    pub fn clear_arrays_cache(&mut self) {
        self.generation.arrays.unload_all();
    }

    /// Reopen the on-disk state if another writer committed since this
    /// base was opened. Pending patches are kept; indices they allocated
    /// may now collide with the other writer's, so a writer recovering from
    /// [`ErrorKind::Stale`] calls [`Base::discard_pending`] and replays.
    pub fn refresh_if_stale(&mut self) -> Result<bool> {
        let len = SynchroLog::read(&self.dir.resolve(files::SYNCHRO)?)?.len();
        if len == self.synchro_len {
            return Ok(false);
        }
        debug!(seen = self.synchro_len, now = len, "Base changed on disk, reloading");
        self.reopen()?;
        Ok(true)
    }
}

fn find_in_sorted<F>(
    index: &SortedIndex,
    s: &str,
    particles: &Particles,
    string: F,
) -> Result<Option<Istr>>
where
    F: Fn(Istr) -> Result<String>,
{
    let key = collation_key(s, particles);
    let mut pos = index.lower_bound(&key, particles, &string)?;
    let mut first = None;
    while let Some(istr) = index.istr_at(pos) {
        let raw = string(istr)?;
        if collation_key(&raw, particles) != key {
            break;
        }
        if raw == s {
            return Ok(Some(istr));
        }
        first.get_or_insert(istr);
        pos += 1;
    }
    Ok(first)
}

/// Relative path of the main notes or of a topic; topics may use
/// subdirectories but never leave `notes_d`.
fn notes_file(topic: Option<&str>) -> Result<String> {
    match topic {
        None => Ok(files::NOTES.to_string()),
        Some(topic) => {
            let valid = !topic.is_empty()
                && Path::new(topic)
                    .components()
                    .all(|c| matches!(c, Component::Normal(_)));
            if valid {
                Ok(files::topic_file(topic))
            } else {
                Err(StorageError::path_rejected(topic))
            }
        }
    }
}

fn read_particles(dir: &SafeDir) -> Result<Particles> {
    let path = dir.resolve(files::PARTICLES)?;
    if !path.exists() {
        return Ok(Particles::default());
    }
    match fs::read_to_string(&path) {
        Ok(text) => Ok(Particles::parse(&text)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Unreadable particles file, using defaults");
            Ok(Particles::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NO_LOCK;
    use tempfile::TempDir;

    fn config() -> StoreConfig {
        StoreConfig::default()
    }

    #[test]
    fn test_new_base_has_reserved_strings() {
        let tmp = TempDir::new().unwrap();
        let base = Base::create(tmp.path(), "empty.gw", config()).unwrap();
        assert_eq!(base.nb_of_persons(), 0);
        assert_eq!(base.nb_of_strings(), 2);
        assert_eq!(base.get_string(Istr::EMPTY).unwrap(), "");
        assert_eq!(base.get_string(Istr::QUEST).unwrap(), "?");
        assert_eq!(base.origin(), "empty.gw");
        assert_eq!(base.find_string("?").unwrap(), Some(Istr::QUEST));
    }

    #[test]
    fn test_create_refuses_existing_base() {
        let tmp = TempDir::new().unwrap();
        Base::create(tmp.path(), "a.gw", config()).unwrap();
        let err = Base::create(tmp.path(), "b.gw", config()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Commit);
    }

    #[test]
    fn test_insert_string_reuses() {
        let tmp = TempDir::new().unwrap();
        let mut base = Base::create(tmp.path(), "", config()).unwrap();
        let a = base.insert_string("Dupont").unwrap();
        let b = base.insert_string("Dupont").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, Istr(2));
        assert_eq!(base.insert_string("").unwrap(), Istr::EMPTY);
        assert_eq!(base.nb_of_strings(), 3);
    }

    #[test]
    fn test_missing_record_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let base = Base::create(tmp.path(), "", config()).unwrap();
        let err = base.get_person(Iper(0)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn test_notes_topics_are_confined() {
        let tmp = TempDir::new().unwrap();
        let mut base = Base::create(tmp.path(), "", config()).unwrap();
        base.write_notes(Some("places/paris"), "Capital").unwrap();
        assert_eq!(base.read_notes(Some("places/paris")).unwrap(), "Capital");
        assert!(base.write_notes(Some("../base"), "x").is_err());
        assert!(base.write_notes(Some("/etc/passwd"), "x").is_err());
        assert_eq!(base.read_notes(None).unwrap(), "");

        base.commit_patches().unwrap();
        assert_eq!(
            fs::read_to_string(tmp.path().join("notes_d/places/paris.txt")).unwrap(),
            "Capital"
        );
    }

    #[test]
    fn test_refresh_detects_other_writer() {
        let tmp = TempDir::new().unwrap();
        let mut writer = Base::create(tmp.path(), "", config()).unwrap();
        let mut reader = Base::open(tmp.path(), config()).unwrap();
        assert!(!reader.refresh_if_stale().unwrap());

        let istr = writer.insert_string("Martin").unwrap();
        writer.commit_patches().unwrap();

        assert!(reader.refresh_if_stale().unwrap());
        assert_eq!(reader.get_string(istr).unwrap(), "Martin");
    }

    #[test]
    fn test_no_lock_config_commits() {
        let tmp = TempDir::new().unwrap();
        let config = config().without_lock();
        let mut base = Base::create(tmp.path(), "", config).unwrap();
        base.insert_string("x").unwrap();
        base.commit_patches().unwrap();
        assert!(!tmp.path().join(NO_LOCK).exists());
        assert!(!tmp.path().join("lock").exists());
    }
}
