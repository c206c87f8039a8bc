//! Specificity order over policy identifiers split into components.
//!
//! `Ordering::Less` means "more specific". Scanning left to right, the first
//! differing component decides: a literal always beats the wildcard there.
//! Two differing literals fall back to lexical order so the order stays total.

use std::cmp::Ordering;

pub fn compare<S: AsRef<str>>(a: &[S], b: &[S], wildcard: &str) -> Ordering {
    if a.len() != b.len() {
        return a.len().cmp(&b.len());
    }
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (x.as_ref(), y.as_ref());
        if x == y {
            continue;
        }
        if x == wildcard {
            return Ordering::Greater;
        }
        if y == wildcard {
            return Ordering::Less;
        }
        return x.cmp(y);
    }
    Ordering::Equal
}

/// Pick the most specific of a set of same-length matches.
pub fn best<'a, S, I>(matches: I, wildcard: &str) -> Option<&'a [S]>
where
    S: AsRef<str> + 'a,
    I: IntoIterator<Item = &'a [S]>,
{
    matches
        .into_iter()
        .min_by(|a, b| compare(a, b, wildcard))
}
