//! Read access to the ancestry graph

use lineage_store::{Base, ErrorKind, Fix, Iper, Result, StorageError};

/// What the engine reads from a base: parents and known coefficients.
pub trait AncestryAccess {
    /// Number of person slots; every [`Iper`] below it is valid.
    fn persons(&self) -> usize;

    /// (father, mother) of `ip`, if the person has a parent family.
    fn parents(&self, ip: Iper) -> Result<Option<(Iper, Iper)>>;

    fn consang(&self, ip: Iper) -> Result<Fix>;
}

fn absent_as_none<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(StorageError {
            kind: ErrorKind::NotFound,
            ..
        }) => Ok(None),
        Err(e) => Err(e),
    }
}

impl AncestryAccess for Base {
    fn persons(&self) -> usize {
        self.nb_of_persons()
    }

    fn parents(&self, ip: Iper) -> Result<Option<(Iper, Iper)>> {
        let Some(ascend) = absent_as_none(self.get_ascend(ip))? else {
            return Ok(None);
        };
        match ascend.parents {
            Some(ifam) => {
                let couple = self.get_couple(ifam)?;
                Ok(Some((couple.father, couple.mother)))
            }
            None => Ok(None),
        }
    }

    fn consang(&self, ip: Iper) -> Result<Fix> {
        Ok(absent_as_none(self.get_ascend(ip))?
            .map(|a| a.consang)
            .unwrap_or(Fix::NO_CONSANG))
    }
}
