//! Scheduler / Coordinator.
//!
//! Owns mutable state, drains work, produces a result: a long-lived
//! `tokio::select!` loop over channels rather than a one-shot executor.
//! Conflated input/output queues map onto `tokio::sync::watch` — "latest
//! value wins" is exactly `watch`'s semantics.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::config::EngineConfig;
use crate::drain::ClusterSnapshot;
use crate::merge::MergeIter;
use crate::query;
use crate::record::{Level, Record};
use crate::store::ValueStore;
use crate::telemetry::Logger;

/// A command arriving on the (unbounded-ish, buffered) ingest queue.
#[derive(Debug)]
pub enum IngestCommand {
    /// `preassigned_seq` is `Some` only when an upstream adapter already
    /// claimed a sequence number from the scheduler before pushing; the
    /// scheduler always remains the sole source of truth for `seq_counter`.
    AddRecord { record: Record, preassigned_seq: Option<u64> },
    ClearSource(String),
}

/// A command on the conflated search queue.
#[derive(Debug, Clone)]
pub struct QueryCommand {
    pub text: String,
    pub length: usize,
    pub offset: u64,
}

#[derive(Debug, Clone)]
pub struct ResultChanged {
    /// `length`-sized page, oldest-first within the page (reversed from the
    /// newest-first search order, for display).
    pub page: Vec<Arc<Record>>,
    /// The wider cached window, used for time-series charting. Same
    /// oldest-first convention as `page`.
    pub chart_page: Vec<Arc<Record>>,
}

#[derive(Debug, Clone)]
pub struct ClusterList(pub Vec<ClusterSnapshot>);

/// Merges searches across every source in `sources` for the severities in
/// `levels`, newest-first.
fn merged_search<'a>(
    sources: &'a HashMap<String, ValueStore>,
    pos: &'a [String],
    neg: &'a [String],
    offset_lock: u64,
    levels: &'a [Level],
) -> impl Iterator<Item = Arc<Record>> + 'a {
    let streams: Vec<Box<dyn Iterator<Item = Arc<Record>> + 'a>> = sources
        .values()
        .map(|store| -> Box<dyn Iterator<Item = Arc<Record>> + 'a> {
            Box::new(store.search(pos, neg, offset_lock, levels))
        })
        .collect();
    MergeIter::new(streams)
}

/// Owns all per-source indexes, the sequence counter, the offset lock, and
/// the scroll-back cache. Single-threaded cooperative: every mutation
/// happens from inside `handle_*`, called one at a time either directly
/// (tests) or from the `tokio::select!` loop spawned by `spawn`.
pub struct Scheduler {
    sources: HashMap<String, ValueStore>,
    seq_counter: u64,
    offset_lock: u64,
    cache: crate::cache::CachedList,
    config: EngineConfig,
    levels: Vec<Level>,
    indexed_lines: u64,
    logger: Logger,
}

impl Scheduler {
    pub fn new(config: EngineConfig) -> Self {
        Scheduler {
            sources: HashMap::new(),
            seq_counter: 0,
            offset_lock: u64::MAX,
            cache: crate::cache::CachedList::new(),
            config,
            levels: Level::ALL.to_vec(),
            indexed_lines: 0,
            logger: Logger::default(),
        }
    }

    pub fn indexed_lines(&self) -> u64 {
        self.indexed_lines
    }

    pub fn seq_counter(&self) -> u64 {
        self.seq_counter
    }

    pub fn offset_lock(&self) -> u64 {
        self.offset_lock
    }

    /// Replaces the enabled severity filter. Any change invalidates the
    /// scroll cache, just like a query-text change would.
    pub fn set_levels(&mut self, levels: Vec<Level>) {
        if levels != self.levels {
            self.levels = levels;
            self.cache.invalidate();
        }
    }

    /// Assigns (or honors a pre-assigned) `seq`, routes to the record's
    /// source store, and returns the stored record.
    pub fn handle_add_record(&mut self, mut record: Record, preassigned_seq: Option<u64>) -> Arc<Record> {
        let seq = match preassigned_seq {
            Some(s) => {
                self.seq_counter = self.seq_counter.max(s + 1);
                s
            }
            None => {
                let s = self.seq_counter;
                self.seq_counter += 1;
                s
            }
        };
        record.seq = seq;

        let source_id = record.source_id.clone();
        self.logger.debug(&format!("ingested seq={seq} source={source_id}"));
        let arc = Arc::new(record);
        self.sources
            .entry(source_id.clone())
            .or_insert_with(|| ValueStore::new(source_id, &self.config))
            .put(arc.clone());
        self.indexed_lines += 1;
        arc
    }

    /// No-op if the source doesn't exist.
    pub fn handle_clear_source(&mut self, source_id: &str) {
        if let Some(store) = self.sources.remove(source_id) {
            self.indexed_lines = self.indexed_lines.saturating_sub(store.size() as u64);
            // the removed source may have contributed records to the cached
            // window; CacheKey doesn't track source membership, so drop it
            self.cache.invalidate();
            self.logger.info(&format!("cleared source={source_id}"));
        }
    }

    /// Runs a search/scroll request, managing the offset lock and scroll
    /// cache as specified.
    pub fn handle_query(&mut self, cmd: &QueryCommand) -> ResultChanged {
        if cmd.offset > 0 {
            if self.offset_lock == u64::MAX {
                self.offset_lock = self.seq_counter;
            }
        } else {
            self.offset_lock = u64::MAX;
        }

        let parsed = query::parse(&cmd.text);
        let offset_lock = self.offset_lock;
        let levels = self.levels.clone();
        let sources = &self.sources;

        if cmd.offset > 0 {
            let pos = parsed.pos.clone();
            let neg = parsed.neg.clone();
            let levels_for_fetch = levels.clone();
            self.cache.ensure(
                &parsed.pos,
                &parsed.neg,
                &levels,
                offset_lock,
                cmd.offset,
                &self.config,
                |start, take_n| {
                    merged_search(sources, &pos, &neg, offset_lock, &levels_for_fetch)
                        .skip(start as usize)
                        .take(take_n)
                        .collect()
                },
            );
            let page = self.cache.page(cmd.offset, cmd.length);
            let chart_page = self
                .cache
                .page(self.cache.results_offset_start(), self.config.cache_window_after);
            ResultChanged {
                page: page.into_iter().rev().collect(),
                chart_page: chart_page.into_iter().rev().collect(),
            }
        } else {
            let chart_page: Vec<Arc<Record>> =
                merged_search(sources, &parsed.pos, &parsed.neg, offset_lock, &levels)
                    .take(self.config.cache_window_after)
                    .collect();
            let page: Vec<Arc<Record>> = chart_page.iter().take(cmd.length).cloned().collect();
            ResultChanged {
                page: page.into_iter().rev().collect(),
                chart_page: chart_page.into_iter().rev().collect(),
            }
        }
    }

    pub fn handle_refresh_clusters(&self) -> ClusterList {
        let mut all = Vec::new();
        for store in self.sources.values() {
            all.extend(store.get_log_clusters(&self.levels));
        }
        ClusterList(all)
    }
}

/// Channel handles returned by `Scheduler::spawn`, for wiring ingest
/// adapters and output consumers.
pub struct SchedulerHandle {
    pub ingest_tx: mpsc::Sender<IngestCommand>,
    pub search_tx: watch::Sender<Option<QueryCommand>>,
    pub refresh_tx: watch::Sender<()>,
    pub results_rx: watch::Receiver<Option<ResultChanged>>,
    pub clusters_rx: watch::Receiver<Option<ClusterList>>,
}

impl Scheduler {
    /// Spawns the cooperative event loop as a `tokio::task`. The loop owns
    /// the scheduler exclusively from this point on; callers interact only
    /// through the returned channels.
    pub fn spawn(config: EngineConfig) -> (SchedulerHandle, tokio::task::JoinHandle<()>) {
        let (ingest_tx, mut ingest_rx) = mpsc::channel(1024);
        let (search_tx, mut search_rx) = watch::channel(None);
        let (refresh_tx, mut refresh_rx) = watch::channel(());
        let (results_tx, results_rx) = watch::channel(None);
        let (clusters_tx, clusters_rx) = watch::channel(None);
        let send_timeout = config.output_send_timeout();
        let mut scheduler = Scheduler::new(config);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    maybe_cmd = ingest_rx.recv() => {
                        match maybe_cmd {
                            Some(IngestCommand::AddRecord { record, preassigned_seq }) => {
                                scheduler.handle_add_record(record, preassigned_seq);
                            }
                            Some(IngestCommand::ClearSource(id)) => {
                                scheduler.handle_clear_source(&id);
                            }
                            None => break,
                        }
                    }
                    Ok(()) = search_rx.changed() => {
                        if let Some(cmd) = search_rx.borrow_and_update().clone() {
                            let result = scheduler.handle_query(&cmd);
                            let _ = tokio::time::timeout(send_timeout, async {
                                let _ = results_tx.send(Some(result));
                            }).await;
                        }
                    }
                    Ok(()) = refresh_rx.changed() => {
                        refresh_rx.borrow_and_update();
                        let clusters = scheduler.handle_refresh_clusters();
                        let _ = tokio::time::timeout(send_timeout, async {
                            let _ = clusters_tx.send(Some(clusters));
                        }).await;
                    }
                    else => break,
                }
            }
        });

        (
            SchedulerHandle {
                ingest_tx,
                search_tx,
                refresh_tx,
                results_rx,
                clusters_rx,
            },
            task,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LogFields;

    fn log(ts: i64, msg: &str, source: &str) -> Record {
        Record::new_log(
            0,
            Level::Info,
            ts,
            msg.into(),
            source.into(),
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
        )
    }

    #[test]
    fn seq_counter_is_strictly_increasing() {
        let mut sched = Scheduler::new(EngineConfig::default());
        let a = sched.handle_add_record(log(1, "a", "s1"), None);
        let b = sched.handle_add_record(log(2, "b", "s1"), None);
        assert!(a.seq < b.seq);
        assert_eq!(sched.seq_counter(), 2);
    }

    #[test]
    fn preassigned_seq_advances_counter() {
        let mut sched = Scheduler::new(EngineConfig::default());
        let r = sched.handle_add_record(log(1, "a", "s1"), Some(41));
        assert_eq!(r.seq, 41);
        assert_eq!(sched.seq_counter(), 42);
    }

    #[test]
    fn clear_source_is_noop_for_unknown_id() {
        let mut sched = Scheduler::new(EngineConfig::default());
        sched.handle_clear_source("missing");
        assert_eq!(sched.indexed_lines(), 0);
    }

    #[test]
    fn basic_ingest_and_search_scenario() {
        let mut sched = Scheduler::new(EngineConfig::default());
        sched.handle_add_record(log(1000, "foo bar", "s1"), None);
        sched.handle_add_record(log(2000, "bar baz", "s1"), None);
        sched.handle_add_record(log(3000, "qux", "s1"), None);

        let result = sched.handle_query(&QueryCommand {
            text: "bar".into(),
            length: 10,
            offset: 0,
        });
        let timestamps: Vec<i64> = result.page.iter().map(|r| r.timestamp).collect();
        assert_eq!(timestamps, vec![1000, 2000]);
    }

    #[test]
    fn negation_scenario() {
        let mut sched = Scheduler::new(EngineConfig::default());
        sched.handle_add_record(log(1000, "foo bar", "s1"), None);
        sched.handle_add_record(log(2000, "bar baz", "s1"), None);
        sched.handle_add_record(log(3000, "qux", "s1"), None);

        let result = sched.handle_query(&QueryCommand {
            text: "bar !baz".into(),
            length: 10,
            offset: 0,
        });
        let timestamps: Vec<i64> = result.page.iter().map(|r| r.timestamp).collect();
        assert_eq!(timestamps, vec![1000]);
    }

    #[test]
    fn phrase_scenario() {
        let mut sched = Scheduler::new(EngineConfig::default());
        sched.handle_add_record(log(1000, "hello world foo", "s1"), None);

        let hit = sched.handle_query(&QueryCommand {
            text: "\"hello world\"".into(),
            length: 10,
            offset: 0,
        });
        assert_eq!(hit.page.len(), 1);

        let miss = sched.handle_query(&QueryCommand {
            text: "\"world hello\"".into(),
            length: 10,
            offset: 0,
        });
        assert_eq!(miss.page.len(), 0);
    }

    #[test]
    fn offset_lock_keeps_scroll_consistent() {
        let mut sched = Scheduler::new(EngineConfig::default());
        for i in 0..100u64 {
            sched.handle_add_record(log(i as i64, "line", "s1"), None);
        }
        let first = sched.handle_query(&QueryCommand {
            text: "".into(),
            length: 10,
            offset: 50,
        });
        for i in 100..110u64 {
            sched.handle_add_record(log(i as i64, "line", "s1"), None);
        }
        let second = sched.handle_query(&QueryCommand {
            text: "".into(),
            length: 10,
            offset: 50,
        });
        let first_seqs: Vec<u64> = first.page.iter().map(|r| r.seq).collect();
        let second_seqs: Vec<u64> = second.page.iter().map(|r| r.seq).collect();
        assert_eq!(first_seqs, second_seqs);

        let live = sched.handle_query(&QueryCommand {
            text: "".into(),
            length: 10,
            offset: 0,
        });
        assert_eq!(sched.offset_lock(), u64::MAX);
        assert_eq!(live.page.last().unwrap().seq, 109);
    }

    #[test]
    fn block_rollover_scenario() {
        let mut cfg = EngineConfig::default();
        cfg.cap = 4;
        let mut sched = Scheduler::new(cfg);
        for i in 0..9u64 {
            sched.handle_add_record(log(i as i64, "line", "s1"), None);
        }
        let result = sched.handle_query(&QueryCommand {
            text: "".into(),
            length: 100,
            offset: 0,
        });
        assert_eq!(result.page.len(), 9);
    }

    #[test]
    fn cluster_refresh_scenario() {
        let mut sched = Scheduler::new(EngineConfig::default());
        for id in 0..1000u64 {
            sched.handle_add_record(log(id as i64, &format!("user {id} logged in"), "s1"), None);
        }
        let clusters = sched.handle_refresh_clusters();
        assert_eq!(clusters.0.len(), 1);
        assert!(clusters.0[0].count >= 990);
    }

    #[test]
    fn severity_filter_change_invalidates_cache() {
        let mut sched = Scheduler::new(EngineConfig::default());
        for i in 0..10u64 {
            sched.handle_add_record(log(i as i64, "line", "s1"), None);
        }
        sched.handle_query(&QueryCommand {
            text: "".into(),
            length: 5,
            offset: 3,
        });
        sched.set_levels(vec![Level::Error]);
        // after invalidation a query against a now-empty severity filter
        // must not return stale cached records
        let result = sched.handle_query(&QueryCommand {
            text: "".into(),
            length: 5,
            offset: 3,
        });
        assert!(result.page.is_empty());
    }

    #[test]
    fn clear_source_invalidates_scroll_cache() {
        let mut sched = Scheduler::new(EngineConfig::default());
        for i in 0..6u64 {
            sched.handle_add_record(log(i as i64 * 2, "line", "s1"), None);
            sched.handle_add_record(log(i as i64 * 2 + 1, "line", "s2"), None);
        }
        let before = sched.handle_query(&QueryCommand {
            text: "".into(),
            length: 3,
            offset: 1,
        });
        assert!(before.page.iter().any(|r| r.source_id == "s2"));

        sched.handle_clear_source("s2");

        let after = sched.handle_query(&QueryCommand {
            text: "".into(),
            length: 3,
            offset: 1,
        });
        assert!(after.page.iter().all(|r| r.source_id != "s2"));
    }
}
