//! Drain Tree: an online log-message templatizer.
//!
//! Named after the Drain algorithm (He et al., "Drain: An Online Log Parsing
//! Approach"). The leveled, bounded-fanout tree shape follows the usual
//! "leaf holds accumulated state, fans out on overflow" pattern for
//! bounded-memory leveled storage.
//!
//! Messages are first bucketed by token count (cheap, exact partition), then
//! routed down a bounded-depth trie keyed on the literal token at each
//! position — once a node's distinct-child count exceeds `max_children`,
//! further distinct tokens collapse onto a shared wildcard branch. The leaf
//! reached holds the candidate cluster list for that (length, prefix) class.

use std::collections::HashMap;

use crate::record::{Level, Record};

/// Depth of the branching trie before falling into a flat per-leaf cluster
/// list. Not exposed as configuration — the Drain paper treats it as a
/// structural constant, not a tunable.
const MAX_DEPTH: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum TemplateToken {
    Literal(String),
    Wildcard,
}

/// One equivalence class of structurally similar messages.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Cluster {
    pub template: Vec<TemplateToken>,
    pub count: u64,
}

impl Cluster {
    fn new(tokens: &[String]) -> Cluster {
        Cluster {
            template: tokens.iter().cloned().map(TemplateToken::Literal).collect(),
            count: 1,
        }
    }

    fn similarity(&self, tokens: &[String]) -> f64 {
        if self.template.len() != tokens.len() || tokens.is_empty() {
            return 0.0;
        }
        let matches = self
            .template
            .iter()
            .zip(tokens.iter())
            .filter(|(t, tok)| matches!(t, TemplateToken::Wildcard) || matches!(t, TemplateToken::Literal(l) if l == *tok))
            .count();
        matches as f64 / tokens.len() as f64
    }

    /// Merge a matching message into this cluster: positions that differ
    /// from the incoming message become wildcards; matching positions are
    /// left alone. Count always increments.
    fn merge(&mut self, tokens: &[String]) {
        for (slot, tok) in self.template.iter_mut().zip(tokens.iter()) {
            match slot {
                TemplateToken::Literal(l) if l != tok => *slot = TemplateToken::Wildcard,
                _ => {}
            }
        }
        self.count += 1;
    }
}

/// A full snapshot of one cluster, tagged with the owning tree's identity.
#[derive(Debug, Clone)]
pub struct ClusterSnapshot {
    pub source_id: String,
    pub level: Level,
    pub template: Vec<TemplateToken>,
    pub count: u64,
}

#[derive(Debug, Default)]
struct Node {
    children: HashMap<String, Node>,
    clusters: Vec<Cluster>,
}

/// One per `(source, severity)` index block.
#[derive(Debug)]
pub struct DrainTree {
    source_id: String,
    level: Level,
    similarity_threshold: f64,
    max_children: usize,
    roots: HashMap<usize, Node>,
    finalized: bool,
}

impl DrainTree {
    pub fn new(source_id: String, level: Level, similarity_threshold: f64, max_children: usize) -> Self {
        DrainTree {
            source_id,
            level,
            similarity_threshold,
            max_children,
            roots: HashMap::new(),
            finalized: false,
        }
    }

    fn tokenize(message: &str) -> Vec<String> {
        message.split_whitespace().map(|s| s.to_string()).collect()
    }

    fn route<'a>(&'a mut self, tokens: &[String]) -> &'a mut Node {
        let max_children = self.max_children;
        let node = self.roots.entry(tokens.len()).or_default();
        let depth = MAX_DEPTH.min(tokens.len());
        let mut cur = node;
        for token in tokens.iter().take(depth) {
            let use_wildcard = !cur.children.contains_key(token) && cur.children.len() >= max_children;
            let key = if use_wildcard { "*" } else { token.as_str() };
            cur = cur.children.entry(key.to_string()).or_default();
        }
        cur
    }

    /// Feed one record's message into the tree. Returns the cluster it
    /// joined (post-merge), creating a new one if nothing matches closely
    /// enough and the tree is not yet finalized.
    pub fn add(&mut self, record: &Record) -> Cluster {
        let tokens = Self::tokenize(&record.message);
        let finalized = self.finalized;
        let threshold = self.similarity_threshold;
        let leaf = self.route(&tokens);

        let best_idx = leaf
            .clusters
            .iter()
            .map(|c| c.similarity(&tokens))
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        match best_idx {
            Some((idx, score)) if score >= threshold => {
                leaf.clusters[idx].merge(&tokens);
                leaf.clusters[idx].clone()
            }
            Some((idx, _)) if finalized => {
                // sealed: degrade to nearest existing cluster rather than create one
                leaf.clusters[idx].merge(&tokens);
                leaf.clusters[idx].clone()
            }
            _ if finalized => Cluster::new(&tokens),
            _ => {
                let cluster = Cluster::new(&tokens);
                leaf.clusters.push(cluster.clone());
                cluster
            }
        }
    }

    /// Idempotent: seals the tree so `add` never creates new clusters again,
    /// but existing ones keep accumulating counts.
    pub fn final_(&mut self) {
        self.finalized = true;
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Flattened, immutable snapshot of every cluster currently in the tree.
    pub fn log_clusters(&self) -> Vec<ClusterSnapshot> {
        let mut out = Vec::new();
        for root in self.roots.values() {
            Self::collect(root, &self.source_id, self.level, &mut out);
        }
        out
    }

    fn collect(node: &Node, source_id: &str, level: Level, out: &mut Vec<ClusterSnapshot>) {
        for c in &node.clusters {
            out.push(ClusterSnapshot {
                source_id: source_id.to_string(),
                level,
                template: c.template.clone(),
                count: c.count,
            });
        }
        for child in node.children.values() {
            Self::collect(child, source_id, level, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LogFields;

    fn rec(msg: &str) -> Record {
        Record::new_log(
            0,
            Level::Info,
            0,
            msg.into(),
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
        )
    }

    #[test]
    fn similar_messages_join_one_cluster_with_wildcard() {
        let mut tree = DrainTree::new("s1".into(), Level::Info, 0.5, 100);
        for id in 0..1000 {
            tree.add(&rec(&format!("user {id} logged in")));
        }
        let clusters = tree.log_clusters();
        assert_eq!(clusters.len(), 1);
        let c = &clusters[0];
        assert_eq!(c.count, 1000);
        assert!(c.template.iter().any(|t| matches!(t, TemplateToken::Wildcard)));
    }

    #[test]
    fn dissimilar_messages_create_separate_clusters() {
        let mut tree = DrainTree::new("s1".into(), Level::Info, 0.9, 100);
        tree.add(&rec("connection established"));
        tree.add(&rec("disk quota exceeded badly"));
        let clusters = tree.log_clusters();
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn final_is_idempotent_and_blocks_new_clusters() {
        let mut tree = DrainTree::new("s1".into(), Level::Info, 0.9, 100);
        tree.add(&rec("alpha beta"));
        tree.final_();
        tree.final_();
        assert!(tree.is_finalized());
        tree.add(&rec("totally different message shape"));
        // still exactly one persisted cluster: the pre-existing one absorbed
        // the post-final message rather than a new one being created
        assert_eq!(tree.log_clusters().len(), 1);
    }

    #[test]
    fn cluster_counts_are_monotone_non_decreasing() {
        let mut tree = DrainTree::new("s1".into(), Level::Info, 0.5, 100);
        let mut last = 0u64;
        for i in 0..50 {
            tree.add(&rec(&format!("request {i} completed")));
            let total: u64 = tree.log_clusters().iter().map(|c| c.count).sum();
            assert!(total >= last);
            last = total;
        }
    }

    #[test]
    fn snapshot_tags_source_and_level() {
        let mut tree = DrainTree::new("pod-7".into(), Level::Error, 0.5, 100);
        tree.add(&rec("boom"));
        let snap = &tree.log_clusters()[0];
        assert_eq!(snap.source_id, "pod-7");
        assert_eq!(snap.level, Level::Error);
    }
}
