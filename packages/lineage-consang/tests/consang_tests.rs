//! Consanguinity over an on-disk base

mod common;

use common::*;
use lineage_consang::{compute_all, ComputeSummary, ConsangError, RelationshipInfo};
use lineage_store::{Base, Fix, Iper, StoreConfig};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

// ═══════════════════════════════════════════════════════════════════════════
// Coefficients
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_reference_coefficients() {
    let (_tmp, mut base) = fresh_base();
    let mut tree = Pedigree::new(&mut base);
    let p = tree.persons(6);
    tree.family(p[0], p[1], &[p[2], p[3]]);
    base.commit().unwrap();

    let mut info = RelationshipInfo::new(&base).unwrap();
    assert_eq!(info.relationship(&base, p[4], p[5]).unwrap(), 0.0);
    assert!(approx(info.relationship(&base, p[2], p[3]).unwrap(), 0.25));
    assert!(approx(info.relationship(&base, p[0], p[2]).unwrap(), 0.25));

    let same = info.relationship_and_links(&base, p[2], p[2], true).unwrap();
    assert_eq!(same.coefficient, 1.0);
    assert!(same.tops.is_empty());
}

#[test]
fn test_computed_values_survive_reopen() {
    let (tmp, mut base) = fresh_base();
    let mut tree = Pedigree::new(&mut base);
    let p = tree.persons(5);
    tree.family(p[0], p[1], &[p[2], p[3]]);
    tree.family(p[2], p[3], &[p[4]]);

    let summary = compute_all(&mut base, true).unwrap();
    assert_eq!(
        summary,
        ComputeSummary {
            computed: 5,
            changed: 5
        }
    );
    drop(base);

    let base = Base::open(tmp.path(), StoreConfig::default()).unwrap();
    assert_eq!(base.get_ascend(p[4]).unwrap().consang, Fix::from_f64(0.25));
    assert_eq!(base.get_ascend(p[2]).unwrap().consang, Fix::ZERO);
}

// ═══════════════════════════════════════════════════════════════════════════
// Cycles
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_own_ancestor_stops_before_any_coefficient() {
    let (tmp, mut base) = fresh_base();
    let mut tree = Pedigree::new(&mut base);
    let p = tree.persons(4);
    tree.family(p[1], p[2], &[p[0]]);
    tree.family(p[0], p[3], &[p[1]]);
    base.commit_patches().unwrap();

    let err = compute_all(&mut base, true).unwrap_err();
    assert!(matches!(err, ConsangError::OwnAncestor { person } if person == p[0] || person == p[1]));
    assert!(!base.has_pending());

    let base = Base::open(tmp.path(), StoreConfig::default()).unwrap();
    for ip in &p {
        assert_eq!(base.get_ascend(*ip).unwrap().consang, Fix::NO_CONSANG);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Properties
// ═══════════════════════════════════════════════════════════════════════════

/// Random acyclic pedigree: person i may only have parents below i.
fn arb_pedigree() -> impl Strategy<Value = Vec<Option<(usize, usize)>>> {
    (4usize..16).prop_flat_map(|n| {
        prop::collection::vec(any::<(bool, prop::sample::Index, prop::sample::Index)>(), n).prop_map(
            |raw| {
                raw.into_iter()
                    .enumerate()
                    .map(|(i, (has, f, m))| {
                        if has && i >= 2 {
                            let (f, m) = (f.index(i), m.index(i));
                            (f != m).then_some((f, m))
                        } else {
                            None
                        }
                    })
                    .collect()
            },
        )
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_relationship_is_symmetric_and_bounded(pedigree in arb_pedigree()) {
        let (_tmp, mut base) = fresh_base();
        let mut tree = Pedigree::new(&mut base);
        let ipers = tree.persons(pedigree.len());
        for (child, parents) in pedigree.iter().enumerate() {
            if let Some((f, m)) = parents {
                tree.family(ipers[*f], ipers[*m], &[ipers[child]]);
            }
        }

        let mut info = RelationshipInfo::new(&base).unwrap();
        for a in 0..ipers.len() {
            for b in 0..ipers.len() {
                let ab = info.relationship(&base, Iper(a as u32), Iper(b as u32)).unwrap();
                let ba = info.relationship(&base, Iper(b as u32), Iper(a as u32)).unwrap();
                prop_assert!((ab - ba).abs() < 1e-9);
                prop_assert!((0.0..=1.0 + 1e-9).contains(&ab));
            }
        }
    }
}
