//! Relationship coefficient between two persons
//!
//! Ancestors of both targets are processed by ascending generation, so each
//! ancestor is dequeued only after every path from a target reached it.
//! Each ancestor `u` carries:
//!
//! ```text
//! weight1, weight2   sum over paths from target 1 / 2 of 2^-len
//! relationship       sum over its children c of w1(c)/2 * w2(c)/2
//! ```
//!
//! and contributes `weight1 * weight2 - relationship * (1 + F(u))`, where
//! `F(u)` is its own consanguinity. The coefficient is half the sum of the
//! contributions.

use lineage_store::{Collection, Iper, Marker};
use tracing::trace;

use crate::access::AncestryAccess;
use crate::error::Result;
use crate::topo::{is_valid, parents_of, topological_sort};

/// Whether a person is known to be an ancestor of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum AncStat {
    #[default]
    MaybeAnc,
    IsAnc,
}

/// Paths of one length from a target to a common ancestor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchLen {
    pub len: u32,
    pub count: u32,
    /// Children of the ancestor through which those paths arrive
    pub via: Vec<Iper>,
}

/// A nearest common ancestor with non-zero contribution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopAncestor {
    pub ancestor: Iper,
    pub from_first: Vec<BranchLen>,
    pub from_second: Vec<BranchLen>,
}

/// Result of [`RelationshipInfo::relationship_and_links`]
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub coefficient: f64,
    pub tops: Vec<TopAncestor>,
}

#[derive(Debug, Clone, Default)]
struct Cell {
    /// Query that last reset this cell
    mark: u32,
    weight1: f64,
    weight2: f64,
    relationship: f64,
    lens1: Vec<BranchLen>,
    lens2: Vec<BranchLen>,
    elim_ancestors: bool,
    anc_stat1: AncStat,
    anc_stat2: AncStat,
}

/// Per-base working state, reused across queries.
///
/// A cell belongs to the current query only when its `mark` equals the
/// context's counter, so starting a query resets nothing eagerly.
pub struct RelationshipInfo {
    persons: usize,
    generation: Marker<Iper, u32>,
    cells: Marker<Iper, Cell>,
    queue: Vec<Vec<Iper>>,
    mark: u32,
}

fn add_branch(lens: &mut Vec<BranchLen>, len: u32, count: u32, via: Iper) {
    match lens.iter_mut().find(|b| b.len == len) {
        Some(branch) => {
            branch.count += count;
            branch.via.push(via);
        }
        None => lens.push(BranchLen {
            len,
            count,
            via: vec![via],
        }),
    }
}

impl RelationshipInfo {
    /// Compute generations of every person of `access`. Fails with
    /// `OwnAncestor` on a cyclic ancestry graph.
    pub fn new<A: AncestryAccess + ?Sized>(access: &A) -> Result<Self> {
        let generation = topological_sort(access)?;
        let persons = access.persons();
        let depth = generation.iter().map(|(_, g)| *g as usize + 1).max().unwrap_or(0);
        Ok(Self {
            persons,
            cells: Collection::new(persons).marker(Cell::default()),
            generation,
            queue: vec![Vec::new(); depth],
            mark: 0,
        })
    }

    pub fn generation(&self, ip: Iper) -> u32 {
        *self.generation.get(ip)
    }

    pub fn persons(&self) -> usize {
        self.persons
    }

    /// Relationship coefficient of `a` and `b`.
    pub fn relationship<A: AncestryAccess + ?Sized>(
        &mut self,
        access: &A,
        a: Iper,
        b: Iper,
    ) -> Result<f64> {
        Ok(self.relationship_and_links(access, a, b, false)?.coefficient)
    }

    /// Relationship coefficient of `a` and `b`; with `with_branches`, also
    /// the nearest common ancestors and the path lengths reaching them.
    pub fn relationship_and_links<A: AncestryAccess + ?Sized>(
        &mut self,
        access: &A,
        a: Iper,
        b: Iper,
        with_branches: bool,
    ) -> Result<Relationship> {
        if a == b {
            return Ok(Relationship {
                coefficient: 1.0,
                tops: Vec::new(),
            });
        }
        if !is_valid(a, self.persons) || !is_valid(b, self.persons) {
            return Ok(Relationship {
                coefficient: 0.0,
                tops: Vec::new(),
            });
        }

        self.mark = self.mark.wrapping_add(1);
        if self.mark == 0 {
            // counter wrapped: stale cells could alias the new mark
            self.cells.reset();
            self.mark = 1;
        }

        let mut query = Query {
            info: self,
            with_branches,
            nb_anc1: 1,
            nb_anc2: 1,
            sum: 0.0,
            tops: Vec::new(),
            cursor: usize::MAX,
        };
        query.insert(a);
        query.insert(b);
        {
            let ca = query.info.cells.get_mut(a);
            ca.weight1 = 1.0;
            ca.anc_stat1 = AncStat::IsAnc;
            if with_branches {
                ca.lens1 = vec![BranchLen {
                    len: 0,
                    count: 1,
                    via: Vec::new(),
                }];
            }
        }
        {
            let cb = query.info.cells.get_mut(b);
            cb.weight2 = 1.0;
            cb.anc_stat2 = AncStat::IsAnc;
            if with_branches {
                cb.lens2 = vec![BranchLen {
                    len: 0,
                    count: 1,
                    via: Vec::new(),
                }];
            }
        }

        while query.nb_anc1 > 0 && query.nb_anc2 > 0 {
            let Some(u) = query.pop() else {
                break;
            };
            query.treat_ancestor(access, u)?;
        }
        query.drain();

        let Query { sum, tops, .. } = query;
        let tops = tops
            .into_iter()
            .map(|ancestor| {
                let cell = self.cells.get(ancestor);
                TopAncestor {
                    ancestor,
                    from_first: cell.lens1.clone(),
                    from_second: cell.lens2.clone(),
                }
            })
            .collect();
        trace!(a = %a, b = %b, coefficient = sum / 2.0, "Relationship");
        Ok(Relationship {
            coefficient: sum / 2.0,
            tops,
        })
    }
}

/// State of one relationship query
struct Query<'a> {
    info: &'a mut RelationshipInfo,
    with_branches: bool,
    /// Queued ancestors of target 1 / 2 not yet processed
    nb_anc1: usize,
    nb_anc2: usize,
    sum: f64,
    tops: Vec<Iper>,
    /// Lowest generation that may hold queued persons
    cursor: usize,
}

impl Query<'_> {
    fn is_inserted(&self, ip: Iper) -> bool {
        self.info.cells.get(ip).mark == self.info.mark
    }

    fn insert(&mut self, ip: Iper) {
        let mark = self.info.mark;
        self.info.cells.set(
            ip,
            Cell {
                mark,
                ..Cell::default()
            },
        );
        let generation = *self.info.generation.get(ip) as usize;
        self.info.queue[generation].push(ip);
        self.cursor = self.cursor.min(generation);
    }

    fn pop(&mut self) -> Option<Iper> {
        while self.cursor < self.info.queue.len() {
            if let Some(ip) = self.info.queue[self.cursor].pop() {
                return Some(ip);
            }
            self.cursor += 1;
        }
        None
    }

    /// Empty the queue left over by an early stop.
    fn drain(&mut self) {
        while self.pop().is_some() {}
    }

    fn treat_ancestor<A: AncestryAccess + ?Sized>(&mut self, access: &A, u: Iper) -> Result<()> {
        let consang = access.consang(u)?.to_f64();
        let (contribution, elim) = {
            let cell = self.info.cells.get_mut(u);
            if cell.anc_stat1 == AncStat::IsAnc {
                self.nb_anc1 -= 1;
            }
            if cell.anc_stat2 == AncStat::IsAnc {
                self.nb_anc2 -= 1;
            }
            let contribution =
                cell.weight1 * cell.weight2 - cell.relationship * (1.0 + consang);
            let elim = cell.elim_ancestors;
            if self.with_branches && contribution != 0.0 && !elim {
                cell.elim_ancestors = true;
            }
            (contribution, elim)
        };
        self.sum += contribution;
        if self.with_branches && contribution != 0.0 && !elim {
            self.tops.push(u);
        }

        for parent in parents_of(access, u)? {
            self.treat_parent(u, parent);
        }
        Ok(())
    }

    fn treat_parent(&mut self, u: Iper, y: Iper) {
        if !self.is_inserted(y) {
            self.insert(y);
        }
        let from = self.info.cells.get(u).clone();
        let p1 = from.weight1 / 2.0;
        let p2 = from.weight2 / 2.0;

        let to = self.info.cells.get_mut(y);
        if from.anc_stat1 == AncStat::IsAnc && to.anc_stat1 != AncStat::IsAnc {
            to.anc_stat1 = AncStat::IsAnc;
            self.nb_anc1 += 1;
        }
        if from.anc_stat2 == AncStat::IsAnc && to.anc_stat2 != AncStat::IsAnc {
            to.anc_stat2 = AncStat::IsAnc;
            self.nb_anc2 += 1;
        }
        to.weight1 += p1;
        to.weight2 += p2;
        to.relationship += p1 * p2;
        if from.elim_ancestors {
            to.elim_ancestors = true;
        }
        if self.with_branches {
            for branch in &from.lens1 {
                add_branch(&mut to.lens1, branch.len + 1, branch.count, u);
            }
            for branch in &from.lens2 {
                add_branch(&mut to.lens2, branch.len + 1, branch.count, u);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Pedigree;
    use lineage_store::Fix;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn coefficient(p: &Pedigree, a: usize, b: usize) -> f64 {
        let mut ri = RelationshipInfo::new(p).unwrap();
        ri.relationship(p, Iper(a as u32), Iper(b as u32)).unwrap()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Coefficients
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_self_is_one() {
        let p = Pedigree::new(1);
        let mut ri = RelationshipInfo::new(&p).unwrap();
        let r = ri.relationship_and_links(&p, Iper(0), Iper(0), true).unwrap();
        assert_eq!(r.coefficient, 1.0);
        assert!(r.tops.is_empty());
    }

    #[test]
    fn test_unrelated_is_zero() {
        let mut p = Pedigree::new(6);
        p.child_of(2, 0, 1);
        p.child_of(5, 3, 4);
        assert_eq!(coefficient(&p, 2, 5), 0.0);
    }

    #[test]
    fn test_full_siblings() {
        let mut p = Pedigree::new(4);
        p.child_of(2, 0, 1);
        p.child_of(3, 0, 1);
        assert!(approx(coefficient(&p, 2, 3), 0.25));
    }

    #[test]
    fn test_parent_and_child() {
        let mut p = Pedigree::new(3);
        p.child_of(2, 0, 1);
        assert!(approx(coefficient(&p, 0, 2), 0.25));
        assert!(approx(coefficient(&p, 2, 1), 0.25));
    }

    #[test]
    fn test_half_siblings_and_cousins() {
        // 0+1 -> 3, 0+2 -> 4 (half siblings)
        // 3+5 -> 7, 4+6 -> 8 (half cousins)
        let mut p = Pedigree::new(9);
        p.child_of(3, 0, 1);
        p.child_of(4, 0, 2);
        p.child_of(7, 3, 5);
        p.child_of(8, 4, 6);
        assert!(approx(coefficient(&p, 3, 4), 0.125));
        assert!(approx(coefficient(&p, 7, 8), 0.03125));
    }

    #[test]
    fn test_children_of_siblings() {
        // 0+1 -> 2, 3; 2+3 -> 4, 5
        let mut p = Pedigree::new(6);
        p.child_of(2, 0, 1);
        p.child_of(3, 0, 1);
        p.child_of(4, 2, 3);
        p.child_of(5, 2, 3);
        assert!(approx(coefficient(&p, 4, 5), 0.375));
    }

    #[test]
    fn test_inbred_ancestor_line() {
        // 0+1 -> 2, 3; 2+3 -> 4 (F = 1/4); 4+5 -> 6, 7
        let mut p = Pedigree::new(8);
        p.child_of(2, 0, 1);
        p.child_of(3, 0, 1);
        p.child_of(4, 2, 3);
        p.child_of(6, 4, 5);
        p.child_of(7, 4, 5);
        p.set_consang(4, Fix::from_f64(0.25));
        assert!(approx(coefficient(&p, 2, 3), 0.25));
        assert!(approx(coefficient(&p, 6, 7), 0.28125));
    }

    #[test]
    fn test_queries_are_independent() {
        let mut p = Pedigree::new(6);
        p.child_of(2, 0, 1);
        p.child_of(3, 0, 1);
        let mut ri = RelationshipInfo::new(&p).unwrap();
        for _ in 0..3 {
            assert!(approx(ri.relationship(&p, Iper(2), Iper(3)).unwrap(), 0.25));
            assert_eq!(ri.relationship(&p, Iper(4), Iper(5)).unwrap(), 0.0);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Branches
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_siblings_share_both_parents_as_tops() {
        let mut p = Pedigree::new(4);
        p.child_of(2, 0, 1);
        p.child_of(3, 0, 1);
        let mut ri = RelationshipInfo::new(&p).unwrap();
        let r = ri.relationship_and_links(&p, Iper(2), Iper(3), true).unwrap();

        let mut tops: Vec<Iper> = r.tops.iter().map(|t| t.ancestor).collect();
        tops.sort();
        assert_eq!(tops, vec![Iper(0), Iper(1)]);
        for top in &r.tops {
            assert_eq!(
                top.from_first,
                vec![BranchLen {
                    len: 1,
                    count: 1,
                    via: vec![Iper(2)]
                }]
            );
            assert_eq!(top.from_second[0].via, vec![Iper(3)]);
        }
    }

    #[test]
    fn test_ancestors_of_tops_are_not_reported() {
        // grandparents 0+1 -> 2; 2+3 -> 4, 5 siblings
        let mut p = Pedigree::new(6);
        p.child_of(2, 0, 1);
        p.child_of(4, 2, 3);
        p.child_of(5, 2, 3);
        let mut ri = RelationshipInfo::new(&p).unwrap();
        let r = ri.relationship_and_links(&p, Iper(4), Iper(5), true).unwrap();
        let mut tops: Vec<Iper> = r.tops.iter().map(|t| t.ancestor).collect();
        tops.sort();
        assert_eq!(tops, vec![Iper(2), Iper(3)]);
        assert!(approx(r.coefficient, 0.25));
    }
}
