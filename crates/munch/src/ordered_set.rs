//! Canonical sorted collections backed by a flat vector.
//!
//! An [`OrderedSet`] is always strictly ascending under its [`Comparator`], so
//! two sets holding equal elements are structurally equal.  Lookups and
//! insertions bisect the backing slice.

use std::{cmp::Ordering, fmt, ops, slice, vec};

/// A total order over `T`, used in place of [`Ord`] so that the same element
/// type can be kept in several orders (e.g. transitions keyed by source state)
pub trait Comparator<T: ?Sized> {
    fn compare(&self, lhs: &T, rhs: &T) -> Ordering;
}

/// The element type's own [`Ord`] implementation
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Natural;

impl<T: Ord + ?Sized> Comparator<T> for Natural {
    #[inline]
    fn compare(&self, lhs: &T, rhs: &T) -> Ordering { lhs.cmp(rhs) }
}

/// The inverse of another comparator
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Reversed<C>(pub C);

impl<T: ?Sized, C: Comparator<T>> Comparator<T> for Reversed<C> {
    #[inline]
    fn compare(&self, lhs: &T, rhs: &T) -> Ordering { self.0.compare(rhs, lhs) }
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct OrderedSet<T, C = Natural> {
    items: Vec<T>,
    cmp: C,
}

impl<T: fmt::Debug, C> fmt::Debug for OrderedSet<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(&self.items).finish()
    }
}

impl<T, C: Default> Default for OrderedSet<T, C> {
    #[inline]
    fn default() -> Self { Self::new() }
}

impl<T, C: Default> OrderedSet<T, C> {
    #[must_use]
    #[inline]
    pub fn new() -> Self { Self::with_comparator(C::default()) }

    #[must_use]
    pub fn singleton(item: T) -> Self {
        Self {
            items: vec![item],
            cmp: C::default(),
        }
    }
}

impl<T, C> OrderedSet<T, C> {
    #[must_use]
    #[inline]
    pub const fn with_comparator(cmp: C) -> Self {
        Self {
            items: Vec::new(),
            cmp,
        }
    }

    #[must_use]
    #[inline]
    pub fn len(&self) -> usize { self.items.len() }

    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    #[inline]
    pub fn iter(&self) -> slice::Iter<'_, T> { self.items.iter() }

    #[must_use]
    #[inline]
    pub fn as_slice(&self) -> &[T] { &self.items }

    #[must_use]
    #[inline]
    pub fn into_vec(self) -> Vec<T> { self.items }

    /// The representative element, i.e. the least one under the comparator
    #[must_use]
    #[inline]
    pub fn first(&self) -> Option<&T> { self.items.first() }

    #[must_use]
    #[inline]
    pub fn last(&self) -> Option<&T> { self.items.last() }

    /// Bisect the set around its middle element
    #[must_use]
    pub fn halves(&self) -> Option<(&[T], &T, &[T])> {
        if self.items.is_empty() {
            return None;
        }

        let mid = self.items.len() / 2;
        let (lo, rest) = self.items.split_at(mid);
        let (mid, hi) = rest.split_first().unwrap_or_else(|| unreachable!());
        Some((lo, mid, hi))
    }

    /// The same elements in reverse order, under the flipped comparator
    #[must_use]
    pub fn reverse(self) -> OrderedSet<T, Reversed<C>> {
        let Self { mut items, cmp } = self;
        items.reverse();
        OrderedSet {
            items,
            cmp: Reversed(cmp),
        }
    }
}

impl<T, C: Comparator<T>> OrderedSet<T, C> {
    /// Wrap a vector that is already strictly ascending, or return `None`
    #[must_use]
    pub fn from_sorted(items: Vec<T>, cmp: C) -> Option<Self> {
        items
            .windows(2)
            .all(|w| cmp.compare(&w[0], &w[1]) == Ordering::Less)
            .then_some(Self { items, cmp })
    }

    fn locate(&self, item: &T) -> Result<usize, usize> {
        // first half / mid / second half
        let (mut lo, mut hi) = (0, self.items.len());

        while lo < hi {
            let mid = lo + (hi - lo) / 2;

            match self.cmp.compare(item, &self.items[mid]) {
                Ordering::Less => hi = mid,
                Ordering::Greater => lo = mid + 1,
                Ordering::Equal => return Ok(mid),
            }
        }

        Err(lo)
    }

    /// Returns true if the item was not already present
    pub fn insert(&mut self, item: T) -> bool {
        match self.locate(&item) {
            Ok(_) => false,
            Err(at) => {
                self.items.insert(at, item);
                true
            },
        }
    }

    #[must_use]
    #[inline]
    pub fn inserted(mut self, item: T) -> Self {
        self.insert(item);
        self
    }

    #[must_use]
    pub fn find(&self, item: &T) -> Option<&T> { self.locate(item).ok().map(|i| &self.items[i]) }

    #[must_use]
    #[inline]
    pub fn has(&self, item: &T) -> bool { self.locate(item).is_ok() }

    #[must_use]
    #[inline]
    pub fn position(&self, item: &T) -> Option<usize> { self.locate(item).ok() }

    /// Index of the first element for which `pred` returns false
    pub fn partition_point(&self, pred: impl FnMut(&T) -> bool) -> usize {
        self.items.partition_point(pred)
    }

    /// Append elements that all sort after the current last element.
    ///
    /// No re-sorting is done; the ordering requirement is only checked in
    /// debug builds.
    pub fn concat<I: IntoIterator<Item = T>>(&mut self, it: I) {
        for item in it {
            debug_assert!(
                self.items
                    .last()
                    .is_none_or(|l| self.cmp.compare(l, &item) == Ordering::Less),
                "Concatenated element out of order"
            );
            self.items.push(item);
        }
    }

    #[must_use]
    #[inline]
    pub fn concatenated<I: IntoIterator<Item = T>>(mut self, it: I) -> Self {
        self.concat(it);
        self
    }

    /// Split into the elements before index `at` and the rest
    #[must_use]
    pub fn split_at(mut self, at: usize) -> (Self, Self)
    where C: Clone {
        let hi = self.items.split_off(at);
        let cmp = self.cmp.clone();
        (self, Self { items: hi, cmp })
    }

    pub fn retain(&mut self, f: impl FnMut(&T) -> bool) { self.items.retain(f); }
}

impl<T: Clone, C: Comparator<T> + Clone> OrderedSet<T, C> {
    /// Merge-based set difference `self - other`
    #[must_use]
    pub fn diff(&self, other: &Self) -> Self {
        let mut items = Vec::with_capacity(self.items.len());
        let mut rhs = other.items.iter().peekable();

        for item in &self.items {
            loop {
                match rhs.peek() {
                    Some(r) if self.cmp.compare(r, item) == Ordering::Less => {
                        rhs.next();
                    },
                    Some(r) if self.cmp.compare(r, item) == Ordering::Equal => break,
                    _ => {
                        items.push(item.clone());
                        break;
                    },
                }
            }
        }

        Self {
            items,
            cmp: self.cmp.clone(),
        }
    }

    /// Merge-based set union
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut items = Vec::with_capacity(self.items.len() + other.items.len());
        let mut lhs = self.items.iter().peekable();
        let mut rhs = other.items.iter().peekable();

        loop {
            let next = match (lhs.peek(), rhs.peek()) {
                (Some(l), Some(r)) => match self.cmp.compare(l, r) {
                    Ordering::Less => lhs.next(),
                    Ordering::Greater => rhs.next(),
                    Ordering::Equal => {
                        rhs.next();
                        lhs.next()
                    },
                },
                (Some(_), None) => lhs.next(),
                (None, Some(_)) => rhs.next(),
                (None, None) => break,
            };

            items.extend(next.cloned());
        }

        Self {
            items,
            cmp: self.cmp.clone(),
        }
    }
}

impl<T, C> ops::Index<usize> for OrderedSet<T, C> {
    type Output = T;

    #[inline]
    fn index(&self, idx: usize) -> &T { &self.items[idx] }
}

impl<T, C: Comparator<T>> Extend<T> for OrderedSet<T, C> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, it: I) {
        for item in it {
            self.insert(item);
        }
    }
}

impl<T, C: Comparator<T> + Default> FromIterator<T> for OrderedSet<T, C> {
    fn from_iter<I: IntoIterator<Item = T>>(it: I) -> Self {
        let mut me = Self::new();
        me.extend(it);
        me
    }
}

impl<T, C> IntoIterator for OrderedSet<T, C> {
    type IntoIter = vec::IntoIter<T>;
    type Item = T;

    #[inline]
    fn into_iter(self) -> Self::IntoIter { self.items.into_iter() }
}

impl<'a, T, C> IntoIterator for &'a OrderedSet<T, C> {
    type IntoIter = slice::Iter<'a, T>;
    type Item = &'a T;

    #[inline]
    fn into_iter(self) -> Self::IntoIter { self.items.iter() }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    fn set(items: &[u32]) -> OrderedSet<u32> { items.iter().copied().collect() }

    fn assert_canonical<T: fmt::Debug, C: Comparator<T>>(s: &OrderedSet<T, C>) {
        for w in s.as_slice().windows(2) {
            assert_eq!(
                s.cmp.compare(&w[0], &w[1]),
                Ordering::Less,
                "not strictly ascending: {s:?}"
            );
        }
    }

    #[test]
    fn empty_base_cases() {
        let mut s = OrderedSet::<u32>::new();
        assert!(s.find(&3).is_none());
        assert!(s.halves().is_none());
        assert!(s.first().is_none());
        assert!(s.insert(3));
        assert_eq!(s.as_slice(), &[3]);
    }

    #[test]
    fn diff_sanity() {
        assert_eq!(set(&[1, 2, 3, 5, 8]).diff(&set(&[0, 2, 5, 9])), set(&[1, 3, 8]));
        assert_eq!(set(&[1, 2]).diff(&set(&[])), set(&[1, 2]));
        assert_eq!(set(&[]).diff(&set(&[1, 2])), set(&[]));
    }

    #[test]
    fn union_sanity() {
        assert_eq!(set(&[1, 4, 6]).union(&set(&[2, 4, 7])), set(&[1, 2, 4, 6, 7]));
    }

    #[test]
    fn reverse_flips_comparator() {
        let mut r = set(&[1, 3, 5]).reverse();
        assert_eq!(r.as_slice(), &[5, 3, 1]);
        assert!(r.insert(4));
        assert!(!r.insert(3));
        assert_eq!(r.as_slice(), &[5, 4, 3, 1]);
        assert_canonical(&r);
    }

    #[test]
    fn halves_and_split() {
        let s = set(&[1, 2, 3, 4, 5]);
        let (lo, mid, hi) = s.halves().unwrap();
        assert_eq!((lo, *mid, hi), (&[1, 2][..], 3, &[4, 5][..]));

        let (l, r) = s.split_at(2);
        assert_eq!((l, r), (set(&[1, 2]), set(&[3, 4, 5])));
    }

    #[test]
    fn concat_keeps_order() {
        let s = set(&[1, 2]).concatenated([5, 9]);
        assert_eq!(s.as_slice(), &[1, 2, 5, 9]);
        assert!(s.has(&5));
    }

    #[test]
    fn from_sorted_rejects_disorder() {
        assert!(OrderedSet::from_sorted(vec![1, 2, 2], Natural).is_none());
        assert!(OrderedSet::from_sorted(vec![2, 1], Natural).is_none());
        assert!(OrderedSet::from_sorted(vec![1, 2, 4], Natural).is_some());
    }

    proptest! {
        #[test]
        fn insert_then_find(v in prop::collection::vec(0_u32..256, 0..128)) {
            let mut s = OrderedSet::<u32>::new();

            for x in &v {
                s.insert(*x);
                prop_assert_eq!(s.find(x), Some(x));
                assert_canonical(&s);
            }

            let mut sorted = v.clone();
            sorted.sort_unstable();
            sorted.dedup();
            prop_assert_eq!(s.as_slice(), &sorted[..]);
        }

        #[test]
        fn diff_matches_filter(
            l in prop::collection::vec(0_u32..64, 0..64),
            r in prop::collection::vec(0_u32..64, 0..64),
        ) {
            let l: OrderedSet<u32> = l.into_iter().collect();
            let r: OrderedSet<u32> = r.into_iter().collect();
            let d = l.diff(&r);

            assert_canonical(&d);
            for x in &l {
                prop_assert_eq!(d.has(x), !r.has(x));
            }
            prop_assert!(d.iter().all(|x| l.has(x)));
        }
    }
}
