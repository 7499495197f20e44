//! Lazy index collections and dense scratch markers
//!
//! A [`Collection`] is the range `0..len` of a typed key; nothing is
//! materialised until iterated. A [`Marker`] attaches one mutable value per
//! key of a collection, starting from a default. Markers are per-computation
//! scratch space and are never written to disk.

use std::marker::PhantomData;

/// A key addressable by position
pub trait Key: Copy {
    fn from_index(index: usize) -> Self;
    fn index(self) -> usize;
}

impl Key for usize {
    fn from_index(index: usize) -> Self {
        index
    }

    fn index(self) -> usize {
        self
    }
}

/// The keys `0..len`
#[derive(Debug, Clone, Copy)]
pub struct Collection<K> {
    len: usize,
    _key: PhantomData<K>,
}

impl<K: Key> Collection<K> {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            _key: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, key: K) -> bool {
        key.index() < self.len
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = K> + ExactSizeIterator {
        (0..self.len).map(K::from_index)
    }

    pub fn fold<A>(&self, init: A, f: impl FnMut(A, K) -> A) -> A {
        self.iter().fold(init, f)
    }

    /// A marker over this collection with every key set to `default`.
    pub fn marker<V: Clone>(&self, default: V) -> Marker<K, V> {
        Marker::new(*self, default)
    }
}

impl<K: Key> IntoIterator for Collection<K> {
    type Item = K;
    type IntoIter = std::iter::Map<std::ops::Range<usize>, fn(usize) -> K>;

    fn into_iter(self) -> Self::IntoIter {
        (0..self.len).map(K::from_index as fn(usize) -> K)
    }
}

/// Dense per-key scratch values
///
/// Keys outside the collection panic on access, like slice indexing.
#[derive(Debug, Clone)]
pub struct Marker<K, V> {
    values: Vec<V>,
    default: V,
    _key: PhantomData<K>,
}

impl<K: Key, V: Clone> Marker<K, V> {
    pub fn new(collection: Collection<K>, default: V) -> Self {
        Self {
            values: vec![default.clone(); collection.len()],
            default,
            _key: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, key: K) -> &V {
        &self.values[key.index()]
    }

    pub fn get_mut(&mut self, key: K) -> &mut V {
        &mut self.values[key.index()]
    }

    pub fn set(&mut self, key: K, value: V) {
        self.values[key.index()] = value;
    }

    /// Set every key back to the default.
    pub fn reset(&mut self) {
        let default = self.default.clone();
        self.values.iter_mut().for_each(|v| *v = default.clone());
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> {
        self.values
            .iter()
            .enumerate()
            .map(|(i, v)| (K::from_index(i), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Iper;

    #[test]
    fn test_collection_is_a_range() {
        let ipers: Collection<Iper> = Collection::new(4);
        assert_eq!(ipers.len(), 4);
        assert!(ipers.contains(Iper(3)));
        assert!(!ipers.contains(Iper(4)));
        assert_eq!(
            ipers.iter().collect::<Vec<_>>(),
            vec![Iper(0), Iper(1), Iper(2), Iper(3)]
        );
        assert_eq!(ipers.fold(0, |acc, ip| acc + ip.0), 6);
        assert!(Collection::<Iper>::new(0).is_empty());
    }

    #[test]
    fn test_marker_set_get_reset() {
        let ipers: Collection<Iper> = Collection::new(3);
        let mut marker = ipers.marker(false);
        marker.set(Iper(1), true);
        *marker.get_mut(Iper(2)) = true;
        assert!(!*marker.get(Iper(0)));
        assert!(*marker.get(Iper(1)));
        assert_eq!(marker.iter().filter(|(_, v)| **v).count(), 2);

        marker.reset();
        assert!(marker.iter().all(|(_, v)| !*v));
    }

    #[test]
    #[should_panic]
    fn test_marker_out_of_range_panics() {
        let marker = Collection::<Iper>::new(2).marker(0u8);
        marker.get(Iper(2));
    }
}
