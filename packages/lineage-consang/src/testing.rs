//! In-memory ancestry graph for unit tests

use lineage_store::{Fix, Iper, Result};

use crate::access::AncestryAccess;

pub(crate) struct Pedigree {
    parents: Vec<Option<(Iper, Iper)>>,
    consang: Vec<Fix>,
}

impl Pedigree {
    pub(crate) fn new(persons: usize) -> Self {
        Self {
            parents: vec![None; persons],
            consang: vec![Fix::NO_CONSANG; persons],
        }
    }

    pub(crate) fn child_of(&mut self, child: usize, father: usize, mother: usize) {
        self.parents[child] = Some((Iper(father as u32), Iper(mother as u32)));
    }

    pub(crate) fn set_consang(&mut self, ip: usize, value: Fix) {
        self.consang[ip] = value;
    }
}

impl AncestryAccess for Pedigree {
    fn persons(&self) -> usize {
        self.parents.len()
    }

    fn parents(&self, ip: Iper) -> Result<Option<(Iper, Iper)>> {
        Ok(self.parents[ip.index()])
    }

    fn consang(&self, ip: Iper) -> Result<Fix> {
        Ok(self.consang[ip.index()])
    }
}
