//! Token Index
//!
//! An inverted posting-list index: `add` tokenizes a text blob and appends the
//! owning payload's position to each token's posting list, `search_must_include`
//! resolves a set of ANDed groups (each itself an ORed set of tokens) against a
//! predicate. Bucket-chained posting lists, generalized from a fixed hash
//! table keyed on whole values to one keyed on whitespace tokens with an
//! index-based posting list.

use std::collections::{HashMap, HashSet};

/// A generic token → payload inverted index.
///
/// Payloads are stored once in `entries`, in insertion order; posting lists
/// hold indices into `entries` rather than clones of the payload itself, so a
/// message with many shared tokens doesn't multiply storage by token count.
#[derive(Debug)]
pub struct Index<T> {
    entries: Vec<T>,
    postings: HashMap<String, Vec<usize>>,
    rank_promoted: bool,
}

impl<T> Default for Index<T> {
    fn default() -> Self {
        Index {
            entries: Vec::new(),
            postings: HashMap::new(),
            rank_promoted: false,
        }
    }
}

impl<T: Clone> Index<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of payloads added (not the number of distinct tokens).
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_rank_promoted(&self) -> bool {
        self.rank_promoted
    }

    /// Whitespace-tokenize `text` (lowercased, empty tokens dropped), store
    /// `payload`, and append its index to every distinct token's posting
    /// list. Invariant maintained: posting lists are appended in insertion
    /// (hence `seq`) order.
    pub fn add(&mut self, payload: T, text: &str) {
        let idx = self.entries.len();
        self.entries.push(payload);

        let mut seen: HashSet<&str> = HashSet::new();
        for token in text.split_whitespace() {
            if token.is_empty() {
                continue;
            }
            if !seen.insert(token) {
                continue;
            }
            let lowered = token.to_lowercase();
            self.postings.entry(lowered).or_default().push(idx);
        }
    }

    /// Union of posting-list indices for every token in `group`, as a set.
    fn group_candidates(&self, group: &[String]) -> HashSet<usize> {
        let mut out = HashSet::new();
        for token in group {
            if let Some(list) = self.postings.get(&token.to_lowercase()) {
                out.extend(list.iter().copied());
            }
        }
        out
    }

    /// Payloads that (a) have at least one token from every group in
    /// `groups` (groups ANDed, tokens within a group ORed) and (b) satisfy
    /// `predicate`. Yielded newest-first (descending insertion order). An
    /// empty `groups` matches every payload, subject still to `predicate`.
    pub fn search_must_include<'a, P>(
        &'a self,
        groups: &[Vec<String>],
        predicate: P,
    ) -> impl Iterator<Item = T> + 'a
    where
        P: Fn(&T) -> bool + 'a,
    {
        let candidates: Vec<usize> = if groups.is_empty() {
            (0..self.entries.len()).collect()
        } else {
            let mut sets = groups.iter().map(|g| self.group_candidates(g));
            let mut acc = sets.next().unwrap_or_default();
            for s in sets {
                acc = acc.intersection(&s).copied().collect();
            }
            let mut v: Vec<usize> = acc.into_iter().collect();
            v.sort_unstable();
            v
        };

        candidates
            .into_iter()
            .rev()
            .filter_map(move |idx| {
                let payload = &self.entries[idx];
                if predicate(payload) {
                    Some(payload.clone())
                } else {
                    None
                }
            })
    }

    /// Marks the index read-only. Sorts and deduplicates posting lists and
    /// shrinks their backing storage — the index never grows again.
    pub fn convert_to_higher_rank(&mut self) {
        for list in self.postings.values_mut() {
            list.sort_unstable();
            list.dedup();
            list.shrink_to_fit();
        }
        self.entries.shrink_to_fit();
        self.rank_promoted = true;
    }
}
