//! Scroll-back pagination cache.
//!
//! Lets small offset changes reuse already-materialized search results
//! instead of re-running the merged search from scratch on every scroll
//! tick. Owned by the scheduler; see `Scheduler::handle_query`.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::record::{Level, Record};

/// Identifies the query a cached window was built for. Any change
/// invalidates the cache outright, including a change to the enabled
/// severity set, treated the same as a query-text change.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CacheKey {
    pos: Vec<String>,
    neg: Vec<String>,
    levels: Vec<Level>,
    offset_lock: u64,
}

#[derive(Debug, Default)]
pub struct CachedList {
    key: Option<CacheKey>,
    /// Index into the conceptual global newest-first result order at which
    /// `records[0]` sits.
    start: u64,
    records: Vec<Arc<Record>>,
    complete: bool,
}

impl CachedList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensures the cache covers `offset`, rebuilding via `fetch` if needed.
    /// `fetch(cache_start, take_n)` must return the merged search results
    /// starting at position `cache_start` in the global newest-first order,
    /// up to `take_n` records.
    pub fn ensure(
        &mut self,
        pos: &[String],
        neg: &[String],
        levels: &[Level],
        offset_lock: u64,
        offset: u64,
        cfg: &EngineConfig,
        fetch: impl FnOnce(u64, usize) -> Vec<Arc<Record>>,
    ) {
        let key = CacheKey {
            pos: pos.to_vec(),
            neg: neg.to_vec(),
            levels: levels.to_vec(),
            offset_lock,
        };

        if !self.needs_rebuild(&key, offset, cfg) {
            return;
        }

        let cache_start = offset.saturating_sub(cfg.cache_window_before as u64);
        let take_n = cfg.cache_window_after;
        let records = fetch(cache_start, take_n);
        self.complete = records.len() < take_n;
        self.records = records;
        self.start = cache_start;
        self.key = Some(key);
    }

    fn needs_rebuild(&self, key: &CacheKey, offset: u64, cfg: &EngineConfig) -> bool {
        match &self.key {
            None => true,
            Some(existing) if existing != key => true,
            Some(_) if offset < self.start => true,
            Some(_) => {
                !self.complete
                    && (offset - self.start + cfg.cache_window_before as u64) > self.records.len() as u64
            }
        }
    }

    /// `length`-sized slice newest-first, starting at `offset` within the
    /// cached window. Caller is responsible for reversing for display.
    pub fn page(&self, offset: u64, length: usize) -> Vec<Arc<Record>> {
        let rel_start = (offset - self.start) as usize;
        self.records
            .iter()
            .skip(rel_start)
            .take(length)
            .cloned()
            .collect()
    }

    pub fn results_offset_start(&self) -> u64 {
        self.start
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn invalidate(&mut self) {
        self.key = None;
        self.records.clear();
        self.start = 0;
        self.complete = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LogFields;

    fn rec(seq: u64) -> Arc<Record> {
        Arc::new(Record::new_log(
            seq,
            Level::Info,
            seq as i64,
            "m".into(),
            "s1".into(),
            LogFields {
                thread: None,
                service_name: None,
                service_version: None,
                logger: None,
                correlation_id: None,
                request_id: None,
                error_message: None,
                stacktrace: None,
            },
        ))
    }

    #[test]
    fn first_call_always_rebuilds() {
        let mut cache = CachedList::new();
        let cfg = EngineConfig::default();
        let mut calls = 0;
        cache.ensure(&[], &[], &Level::ALL, u64::MAX, 50, &cfg, |_start, n| {
            calls += 1;
            (0..n as u64).map(rec).collect()
        });
        assert_eq!(calls, 1);
        assert_eq!(cache.results_offset_start(), 0); // 50 - 5000 clamps to 0
    }

    #[test]
    fn query_change_invalidates() {
        let mut cache = CachedList::new();
        let cfg = EngineConfig::default();
        cache.ensure(&["a".into()], &[], &Level::ALL, u64::MAX, 10, &cfg, |_s, n| {
            (0..n as u64).map(rec).collect()
        });
        let mut rebuilt = false;
        cache.ensure(&["b".into()], &[], &Level::ALL, u64::MAX, 10, &cfg, |_s, n| {
            rebuilt = true;
            (0..n as u64).map(rec).collect()
        });
        assert!(rebuilt);
    }

    #[test]
    fn same_query_small_offset_change_reuses_cache() {
        let mut cache = CachedList::new();
        let cfg = EngineConfig::default();
        cache.ensure(&[], &[], &Level::ALL, u64::MAX, 100, &cfg, |_s, n| {
            (0..n as u64).map(rec).collect()
        });
        let mut rebuilt = false;
        cache.ensure(&[], &[], &Level::ALL, u64::MAX, 101, &cfg, |_s, n| {
            rebuilt = true;
            (0..n as u64).map(rec).collect()
        });
        assert!(!rebuilt);
    }

    #[test]
    fn offset_below_start_forces_rebuild() {
        let mut cache = CachedList::new();
        let cfg = EngineConfig::default();
        cache.ensure(&[], &[], &Level::ALL, u64::MAX, 10_000, &cfg, |_s, n| {
            (0..n as u64).map(rec).collect()
        });
        let start = cache.results_offset_start();
        let mut rebuilt = false;
        cache.ensure(&[], &[], &Level::ALL, u64::MAX, start.saturating_sub(1), &cfg, |_s, n| {
            rebuilt = true;
            (0..n as u64).map(rec).collect()
        });
        assert!(rebuilt);
    }
}
