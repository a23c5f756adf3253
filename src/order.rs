//! Reordering of the spine and of the top level of the table of contents.
//!
//! An order is given as a few explicit indices; every index that was not
//! named follows in ascending order. Index 0 is the generated table of
//! contents, so `toc 3 1` puts the contents page first, then the third and
//! the first document, then the rest.

use std::str::FromStr;

use crate::error::{Error, Result};

/// Explicit leading indices of an order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderSpec {
    explicit: Vec<usize>,
}

impl OrderSpec {
    pub fn new(explicit: Vec<usize>) -> Self {
        Self { explicit }
    }

    /// The natural order: 0, 1, 2, ...
    pub fn natural() -> Self {
        Self::default()
    }

    /// Parse command-line tokens: positive numbers or `toc`.
    pub fn parse<I, S>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tokens
            .into_iter()
            .map(|t| parse_token(t.as_ref()))
            .collect::<Result<Vec<_>>>()
            .map(Self::new)
    }

    pub fn explicit(&self) -> &[usize] {
        &self.explicit
    }

    /// A fresh, unbounded iterator over the indices of this order.
    pub fn indices(&self) -> OrderIndices<'_> {
        OrderIndices {
            explicit: self.explicit.iter(),
            used: &self.explicit,
            next_fill: 0,
        }
    }
}

impl FromStr for OrderSpec {
    type Err = Error;

    /// Whitespace- or comma-separated tokens.
    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s.split([' ', ',']).filter(|t| !t.is_empty()))
    }
}

/// Parse one order token. `toc` is index 0.
pub fn parse_token(token: &str) -> Result<usize> {
    if token.eq_ignore_ascii_case("toc") {
        return Ok(0);
    }
    match token.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(Error::Config(format!(
            "'{token}' is not a valid order value: use a positive number or 'toc'"
        ))),
    }
}

/// Indices of an [`OrderSpec`]: the explicit ones, then every unused index.
#[derive(Debug, Clone)]
pub struct OrderIndices<'a> {
    explicit: std::slice::Iter<'a, usize>,
    used: &'a [usize],
    next_fill: usize,
}

impl Iterator for OrderIndices<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if let Some(&index) = self.explicit.next() {
            return Some(index);
        }
        while self.used.contains(&self.next_fill) {
            self.next_fill += 1;
        }
        let index = self.next_fill;
        self.next_fill += 1;
        Some(index)
    }
}

/// Rearrange `entries` by the first `entries.len()` indices of `order`.
///
/// Every index must be in range and used once, so the result is always a
/// permutation of the input.
pub fn reorder<T, I>(entries: Vec<T>, order: I) -> Result<Vec<T>>
where
    I: IntoIterator<Item = usize>,
{
    let len = entries.len();
    let indices: Vec<usize> = order.into_iter().take(len).collect();

    let mut seen = vec![false; len];
    for &index in &indices {
        if index >= len {
            return Err(Error::OrderOutOfRange {
                index,
                max: len.saturating_sub(1),
            });
        }
        if std::mem::replace(&mut seen[index], true) {
            return Err(Error::Config(format!(
                "The value '{index}' is used more than once in the order"
            )));
        }
    }

    let mut slots: Vec<Option<T>> = entries.into_iter().map(Some).collect();
    Ok(indices
        .into_iter()
        .filter_map(|index| slots[index].take())
        .collect())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_gap_fill() {
        let order = OrderSpec::new(vec![2]);
        assert_eq!(reorder(vec!['A', 'B', 'C'], order.indices()).unwrap(), vec!['C', 'A', 'B']);
    }

    #[test]
    fn test_natural_order_is_identity() {
        let order = OrderSpec::natural();
        assert_eq!(reorder(vec![1, 2, 3], order.indices()).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_indices_are_restartable() {
        let order = OrderSpec::new(vec![3, 1]);
        let first: Vec<_> = order.indices().take(6).collect();
        let second: Vec<_> = order.indices().take(6).collect();
        assert_eq!(first, vec![3, 1, 0, 2, 4, 5]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_out_of_range_names_max() {
        let order = OrderSpec::new(vec![3]);
        match reorder(vec!['A', 'B', 'C'], order.indices()) {
            Err(Error::OrderOutOfRange { index, max }) => {
                assert_eq!(index, 3);
                assert_eq!(max, 2);
            }
            other => panic!("expected range error, got {other:?}"),
        }
    }

    #[test]
    fn test_out_of_range_message() {
        let err = reorder(vec![0; 4], OrderSpec::new(vec![9]).indices()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "The value '9' is out of bounds, only values from 1 up to 3 can be used."
        );
    }

    #[test]
    fn test_duplicate_index_rejected() {
        assert!(reorder(vec!['A', 'B'], [1, 1]).is_err());
    }

    #[test]
    fn test_parse_tokens() {
        assert_eq!(OrderSpec::parse(["2", "toc", "1"]).unwrap().explicit(), &[2, 0, 1]);
        assert_eq!("3, 1".parse::<OrderSpec>().unwrap().explicit(), &[3, 1]);
        assert!(parse_token("0").is_err());
        assert!(parse_token("-1").is_err());
        assert!(parse_token("first").is_err());
        assert_eq!(parse_token("TOC").unwrap(), 0);
    }

    #[test]
    fn test_empty_entries() {
        let out: Vec<u8> = reorder(Vec::new(), OrderSpec::new(vec![5]).indices()).unwrap();
        assert!(out.is_empty());
    }

    proptest! {
        #[test]
        fn prop_permutation_spec_gives_permutation(
            perm in (1usize..20).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle())
        ) {
            let entries: Vec<usize> = (0..perm.len()).map(|i| i * 10).collect();
            let out = reorder(entries.clone(), perm.iter().copied()).unwrap();
            prop_assert_eq!(out.len(), entries.len());
            let mut sorted = out.clone();
            sorted.sort_unstable();
            prop_assert_eq!(sorted, entries);
            for (slot, &index) in perm.iter().enumerate() {
                prop_assert_eq!(out[slot], index * 10);
            }
        }

        #[test]
        fn prop_gap_filled_prefix_is_permutation(
            len in 1usize..15,
            picks in proptest::collection::vec(0usize..15, 0..5)
        ) {
            let mut explicit = Vec::new();
            for p in picks {
                if p < len && !explicit.contains(&p) {
                    explicit.push(p);
                }
            }
            let order = OrderSpec::new(explicit.clone());
            let out = reorder((0..len).collect(), order.indices()).unwrap();
            prop_assert_eq!(&out[..explicit.len()], &explicit[..]);
            let mut sorted = out.clone();
            sorted.sort_unstable();
            prop_assert_eq!(sorted, (0..len).collect::<Vec<_>>());
        }

        #[test]
        fn prop_index_equal_to_len_is_rejected(len in 1usize..30) {
            let order = OrderSpec::new(vec![len]);
            match reorder(vec![(); len], order.indices()) {
                Err(Error::OrderOutOfRange { max, .. }) => prop_assert_eq!(max, len - 1),
                other => prop_assert!(false, "unexpected {:?}", other),
            }
        }
    }
}
