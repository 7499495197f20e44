//! Consanguinity of every person of a base

use std::cmp::Reverse;

use lineage_store::{Ascend, Base, ErrorKind, Fix, Ifam, Iper};
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::access::AncestryAccess;
use crate::error::Result;
use crate::relationship::RelationshipInfo;

/// Outcome of [`compute_all`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComputeSummary {
    /// Persons whose coefficient was (re)computed
    pub computed: usize,
    /// Persons whose stored coefficient changed
    pub changed: usize,
}

/// Compute the consanguinity of every person, patch the changed ascends and
/// commit the patches.
///
/// A person's consanguinity is the relationship of their parents; children
/// of one family share the value. Without `from_scratch`, persons that
/// already carry a computed value are kept as is.
pub fn compute_all(base: &mut Base, from_scratch: bool) -> Result<ComputeSummary> {
    let mut info = RelationshipInfo::new(&*base)?;
    let persons = info.persons();
    info!(persons, from_scratch, "Computing consanguinity");

    // ancestors first: a coefficient may depend on those of the ancestors
    let mut order: Vec<Iper> = base.ipers().iter().collect();
    order.sort_by_key(|ip| Reverse(info.generation(*ip)));

    let mut by_family: FxHashMap<Ifam, Fix> = FxHashMap::default();
    let mut summary = ComputeSummary::default();
    let step = (persons / 10).max(1);

    for (done, ip) in order.into_iter().enumerate() {
        if done % step == 0 {
            debug!(done, persons, "Consanguinity progress");
        }
        let ascend = match base.get_ascend(ip) {
            Ok(ascend) => ascend,
            Err(e) if e.kind == ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };

        if !from_scratch && ascend.consang.is_computed() {
            if let Some(ifam) = ascend.parents {
                by_family.entry(ifam).or_insert(ascend.consang);
            }
            continue;
        }

        let consang = match ascend.parents {
            None => Fix::ZERO,
            Some(ifam) => match by_family.get(&ifam) {
                Some(known) => *known,
                None => {
                    let value = match base.parents(ip)? {
                        Some((father, mother)) => {
                            Fix::from_f64(info.relationship(&*base, father, mother)?)
                        }
                        None => Fix::ZERO,
                    };
                    by_family.insert(ifam, value);
                    value
                }
            },
        };
        summary.computed += 1;

        if consang != ascend.consang {
            base.patch_ascend(ip, Ascend { consang, ..ascend });
            summary.changed += 1;
        }
    }

    if summary.changed > 0 {
        base.commit_patches()?;
    }
    info!(
        computed = summary.computed,
        changed = summary.changed,
        "Consanguinity computed"
    );
    Ok(summary)
}
