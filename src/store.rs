//! ValueStore: the per-source tiered index.
//!
//! Level/compaction split (an active structure plus frozen, read-optimized
//! ones), owning a collection per severity that filters then takes, newest
//! first.

use std::collections::HashMap;
use std::sync::Arc;

use crate::block::IndexBlock;
use crate::config::EngineConfig;
use crate::drain::{ClusterSnapshot, TemplateToken};
use crate::merge::MergeIter;
use crate::record::{Level, Record};

/// One source's (pod's, topic-group's) full index: a block list per
/// severity. Only the tail block of each list is mutable.
#[derive(Debug)]
pub struct ValueStore {
    source_id: String,
    blocks: HashMap<Level, Vec<IndexBlock>>,
    size: usize,
    cap: usize,
    drain_similarity_threshold: f64,
    drain_max_children: usize,
}

impl ValueStore {
    pub fn new(source_id: String, config: &EngineConfig) -> Self {
        ValueStore {
            source_id,
            blocks: HashMap::new(),
            size: 0,
            cap: config.cap,
            drain_similarity_threshold: config.drain_similarity_threshold,
            drain_max_children: config.drain_max_children,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Routes to the per-severity block list, finalizing and rolling over
    /// the tail block if it is at capacity, then inserts.
    pub fn put(&mut self, record: Arc<Record>) {
        let level = record.level;
        let list = self.blocks.entry(level).or_default();

        if list.last().map(|b| b.is_full(self.cap)).unwrap_or(true) {
            if let Some(tail) = list.last_mut() {
                tail.finalize();
            }
            list.push(IndexBlock::new(
                self.source_id.clone(),
                level,
                self.drain_similarity_threshold,
                self.drain_max_children,
            ));
        }

        list.last_mut().expect("just pushed").insert(record);
        self.size += 1;
    }

    /// Merged, globally `(timestamp desc, seq desc)` ordered search across
    /// every severity in `levels`, honoring `offset_lock`.
    pub fn search<'a>(
        &'a self,
        pos: &'a [String],
        neg: &'a [String],
        offset_lock: u64,
        levels: &'a [Level],
    ) -> impl Iterator<Item = Arc<Record>> + 'a {
        let streams: Vec<Box<dyn Iterator<Item = Arc<Record>> + 'a>> = levels
            .iter()
            .filter_map(|level| self.blocks.get(level))
            .map(|blocks| -> Box<dyn Iterator<Item = Arc<Record>> + 'a> {
                Box::new(
                    blocks
                        .iter()
                        .rev()
                        .filter(move |b| b.max_seq <= offset_lock)
                        .flat_map(move |b| b.search(pos, neg, offset_lock)),
                )
            })
            .collect();
        MergeIter::new(streams)
    }

    /// Flattened drain-tree clusters across `levels`, grouped by
    /// `(level, template)` with counts summed.
    pub fn get_log_clusters(&self, levels: &[Level]) -> Vec<ClusterSnapshot> {
        let mut grouped: HashMap<(Level, Vec<TemplateToken>), ClusterSnapshot> = HashMap::new();
        for level in levels {
            let Some(blocks) = self.blocks.get(level) else {
                continue;
            };
            for block in blocks {
                for snap in block.drain_tree.log_clusters() {
                    let key = (snap.level, snap.template.clone());
                    grouped
                        .entry(key)
                        .and_modify(|existing| existing.count += snap.count)
                        .or_insert(snap);
                }
            }
        }
        grouped.into_values().collect()
    }
}
