//! Set algebra over id sets. Every helper returns a fresh set and leaves its
//! inputs untouched, so snapshot state is never modified in place.

use std::collections::BTreeSet;

pub fn union<T: Ord + Clone>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> BTreeSet<T> {
    a.union(b).cloned().collect()
}

pub fn difference<T: Ord + Clone>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> BTreeSet<T> {
    a.difference(b).cloned().collect()
}

pub fn intersection<T: Ord + Clone>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> BTreeSet<T> {
    a.intersection(b).cloned().collect()
}

pub fn with<T: Ord + Clone>(a: &BTreeSet<T>, item: T) -> BTreeSet<T> {
    let mut out = a.clone();
    out.insert(item);
    out
}

pub fn without<T: Ord + Clone>(a: &BTreeSet<T>, item: &T) -> BTreeSet<T> {
    let mut out = a.clone();
    out.remove(item);
    out
}

pub fn without_all<'a, T, I>(a: &BTreeSet<T>, items: I) -> BTreeSet<T>
where
    T: Ord + Clone + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut out = a.clone();
    for item in items {
        out.remove(item);
    }
    out
}
