//! Index Block: the unit that rolls over when full and gets finalized.
//!
//! Pairs a token index with a drain tree, tracking the `min_seq`/`max_seq`
//! window of records it holds. A block splits cleanly into a live (mutable)
//! phase and a finalized, read-optimized one: "finalized" means
//! `Index::convert_to_higher_rank` plus sealing the drain tree.

use std::sync::Arc;

use crate::drain::DrainTree;
use crate::index::Index;
use crate::record::{Level, Payload, Record};

#[derive(Debug)]
pub struct IndexBlock {
    pub token_index: Index<Arc<Record>>,
    pub drain_tree: DrainTree,
    pub min_seq: Option<u64>,
    pub max_seq: u64,
    pub finalized: bool,
}

impl IndexBlock {
    pub fn new(source_id: String, level: Level, drain_similarity_threshold: f64, drain_max_children: usize) -> Self {
        IndexBlock {
            token_index: Index::new(),
            drain_tree: DrainTree::new(source_id, level, drain_similarity_threshold, drain_max_children),
            min_seq: None,
            max_seq: 0,
            finalized: false,
        }
    }

    pub fn size(&self) -> usize {
        self.token_index.size()
    }

    pub fn is_full(&self, cap: usize) -> bool {
        self.size() >= cap
    }

    /// Inserts a record: feeds the drain tree for `LogRecord` payloads,
    /// always appends to the token index keyed on the canonical searchable
    /// string, and updates the `min_seq`/`max_seq` window.
    pub fn insert(&mut self, record: Arc<Record>) {
        debug_assert!(!self.finalized, "insert into a finalized block");
        if matches!(record.payload, Payload::Log(_)) {
            self.drain_tree.add(&record);
        }
        self.token_index.add(record.clone(), record.canonical());
        self.min_seq.get_or_insert(record.seq);
        self.max_seq = self.max_seq.max(record.seq);
    }

    /// One-way transition to read-only: compacts the token index and seals
    /// the drain tree.
    pub fn finalize(&mut self) {
        self.token_index.convert_to_higher_rank();
        self.drain_tree.final_();
        self.finalized = true;
    }

    /// Records in this block matching `pos`/`neg` with `seq <= offset_lock`,
    /// newest first. Callers are expected to have already pruned out blocks
    /// whose `max_seq > offset_lock` before calling this.
    ///
    /// Each word of each `pos` term (a phrase contributes every one of its
    /// words) becomes its own singleton group, so the index narrows
    /// candidates down to records containing every required word — a
    /// necessary but not sufficient condition for a phrase match. The exact
    /// match, including word order and adjacency, is re-checked by
    /// `Record::contains` in the predicate below.
    pub fn search<'a>(
        &'a self,
        pos: &'a [String],
        neg: &'a [String],
        offset_lock: u64,
    ) -> impl Iterator<Item = Arc<Record>> + 'a {
        let groups: Vec<Vec<String>> = pos
            .iter()
            .flat_map(|term| term.split_whitespace())
            .map(|word| vec![word.to_string()])
            .collect();
        self.token_index
            .search_must_include(&groups, move |r| r.seq <= offset_lock && r.contains(pos, neg))
    }
}
