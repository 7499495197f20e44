//! Generation numbers of the ancestry graph
//!
//! A person's generation is strictly greater than the generation of each of
//! their children; persons without children are generation 0. Processing
//! persons by ascending generation therefore visits every child before its
//! parents.

use lineage_store::{Collection, Iper, Marker};
use tracing::{debug, warn};

use crate::access::AncestryAccess;
use crate::error::{ConsangError, Result};

/// Cycle-check state of a person
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    NotVisited,
    BeingVisited,
    Visited,
}

pub(crate) fn is_valid(ip: Iper, persons: usize) -> bool {
    !ip.is_dummy() && ip.index() < persons
}

/// Both parents of `ip` that are real persons of the base.
pub(crate) fn parents_of<A: AncestryAccess + ?Sized>(access: &A, ip: Iper) -> Result<Vec<Iper>> {
    let persons = access.persons();
    Ok(match access.parents(ip)? {
        Some((father, mother)) => [father, mother]
            .into_iter()
            .filter(|p| is_valid(*p, persons))
            .collect(),
        None => Vec::new(),
    })
}

/// Generation number of every person.
///
/// In-degree is the number of times a person appears as a parent; the
/// layers are peeled from the persons with in-degree 0. When the peel stops
/// short of the whole base, [`check_no_loop`] locates the cycle.
pub fn topological_sort<A: AncestryAccess + ?Sized>(access: &A) -> Result<Marker<Iper, u32>> {
    let ipers: Collection<Iper> = Collection::new(access.persons());
    let mut parents: Marker<Iper, Vec<Iper>> = ipers.marker(Vec::new());
    let mut in_degree: Marker<Iper, u32> = ipers.marker(0);

    for ip in ipers.iter() {
        let ps = parents_of(access, ip)?;
        for p in &ps {
            *in_degree.get_mut(*p) += 1;
        }
        parents.set(ip, ps);
    }

    let mut generation: Marker<Iper, u32> = ipers.marker(0);
    let mut layer: Vec<Iper> = ipers.iter().filter(|ip| *in_degree.get(*ip) == 0).collect();
    let mut processed = 0usize;
    let mut current = 0u32;

    while !layer.is_empty() {
        let mut next = Vec::new();
        for ip in layer {
            generation.set(ip, current);
            processed += 1;
            for &p in parents.get(ip) {
                let degree = in_degree.get_mut(p);
                *degree -= 1;
                if *degree == 0 {
                    next.push(p);
                }
            }
        }
        layer = next;
        current += 1;
    }

    if processed < ipers.len() {
        warn!(
            processed,
            persons = ipers.len(),
            "Topological peel incomplete, probing for a cycle"
        );
        check_no_loop(access)?;
    }

    debug!(persons = ipers.len(), generations = current, "Computed generations");
    Ok(generation)
}

/// Depth-first search for self-ancestry.
///
/// Walks parent links with an explicit stack; reaching a person still
/// `BeingVisited` means that person is their own ancestor.
pub fn check_no_loop<A: AncestryAccess + ?Sized>(access: &A) -> Result<()> {
    let ipers: Collection<Iper> = Collection::new(access.persons());
    let mut marks: Marker<Iper, Visit> = ipers.marker(Visit::NotVisited);

    for root in ipers.iter() {
        if *marks.get(root) != Visit::NotVisited {
            continue;
        }
        marks.set(root, Visit::BeingVisited);
        let mut stack: Vec<(Iper, Vec<Iper>)> = vec![(root, parents_of(access, root)?)];

        loop {
            let (ip, next) = match stack.last_mut() {
                Some((ip, pending)) => (*ip, pending.pop()),
                None => break,
            };
            match next {
                Some(parent) => match *marks.get(parent) {
                    Visit::BeingVisited => {
                        warn!(person = %parent, "Own ancestor");
                        return Err(ConsangError::OwnAncestor { person: parent });
                    }
                    Visit::NotVisited => {
                        marks.set(parent, Visit::BeingVisited);
                        stack.push((parent, parents_of(access, parent)?));
                    }
                    Visit::Visited => {}
                },
                None => {
                    marks.set(ip, Visit::Visited);
                    stack.pop();
                }
            }
        }
    }
    Ok(())
}
