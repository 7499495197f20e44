//! Common test utilities for lineage-consang

#![allow(dead_code)]

use lineage_store::{Ascend, Base, Couple, Descend, Family, Ifam, Iper, Person, StoreConfig, Union};
use tempfile::TempDir;

pub fn fresh_base() -> (TempDir, Base) {
    let tmp = TempDir::new().expect("temp dir");
    let base = Base::create(tmp.path(), "consang.gw", StoreConfig::default()).expect("create base");
    (tmp, base)
}

/// Builds a pedigree as pending patches
pub struct Pedigree<'a> {
    pub base: &'a mut Base,
}

impl<'a> Pedigree<'a> {
    pub fn new(base: &'a mut Base) -> Self {
        Self { base }
    }

    pub fn person(&mut self) -> Iper {
        let ip = self.base.new_iper();
        self.base.patch_person(ip, Person::unknown(ip));
        self.base.patch_ascend(ip, Ascend::default());
        self.base.patch_union(ip, Union::default());
        ip
    }

    pub fn persons(&mut self, n: usize) -> Vec<Iper> {
        (0..n).map(|_| self.person()).collect()
    }

    pub fn family(&mut self, father: Iper, mother: Iper, children: &[Iper]) -> Ifam {
        let ifam = self.base.new_ifam();
        self.base.patch_family(ifam, Family::new(ifam));
        self.base.patch_couple(ifam, Couple::new(father, mother));
        self.base.patch_descend(
            ifam,
            Descend {
                children: children.to_vec(),
            },
        );
        for parent in [father, mother] {
            let mut union = self.base.get_union(parent).expect("union");
            union.family.push(ifam);
            self.base.patch_union(parent, union);
        }
        for &child in children {
            let mut ascend = self.base.get_ascend(child).expect("ascend");
            ascend.parents = Some(ifam);
            self.base.patch_ascend(child, ascend);
        }
        ifam
    }
}
