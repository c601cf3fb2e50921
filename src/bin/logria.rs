//! Demo CLI binary.
//!
//! Stands in for the externally-owned WebSocket/HTTP presentation surface:
//! wires up configuration, telemetry, and the scheduler, then drives the
//! core end to end from stdin. Each line is treated as a container-runtime
//! log line (`<rfc3339-timestamp> <json-or-text-payload>`) for a fixed
//! source, except for two control lines:
//!
//! - `!query <offset> <length> <text...>` issues a search
//! - `!refresh` requests a cluster refresh
//!
//! Results are logged via `tracing`.

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use logria_core::config::EngineConfig;
use logria_core::ingest::container;
use logria_core::scheduler::{IngestCommand, QueryCommand, Scheduler};
use logria_core::telemetry;

#[derive(Parser, Debug)]
#[command(name = "logria", about = "In-memory streaming log observability engine")]
struct Args {
    /// Path to a TOML config file; defaults are used when omitted.
    #[arg(long)]
    config: Option<String>,

    /// Source id attributed to lines read from stdin.
    #[arg(long, default_value = "stdin")]
    source: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::from_toml_file(path)?,
        None => EngineConfig::default(),
    };

    let (handle, task) = Scheduler::spawn(config);
    let mut results_rx = handle.results_rx.clone();
    let mut clusters_rx = handle.clusters_rx.clone();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                Ok(()) = results_rx.changed() => {
                    if let Some(result) = results_rx.borrow_and_update().clone() {
                        tracing::info!(page_len = result.page.len(), "results updated");
                        for r in &result.page {
                            println!("{} [{}] {}", r.timestamp, r.level, r.message);
                        }
                    }
                }
                Ok(()) = clusters_rx.changed() => {
                    if let Some(clusters) = clusters_rx.borrow_and_update().clone() {
                        tracing::info!(cluster_count = clusters.0.len(), "clusters updated");
                    }
                }
                else => break,
            }
        }
    });

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    while let Some(line) = lines.next_line().await? {
        if let Some(rest) = line.strip_prefix("!query ") {
            let mut parts = rest.splitn(3, ' ');
            let offset: u64 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
            let length: usize = parts.next().and_then(|s| s.parse().ok()).unwrap_or(50);
            let text = parts.next().unwrap_or("").to_string();
            let _ = handle.search_tx.send(Some(QueryCommand { text, length, offset }));
            continue;
        }
        if line.trim() == "!refresh" {
            let _ = handle.refresh_tx.send(());
            continue;
        }
        if let Some(record) = container::parse_line(&args.source, &line) {
            let _ = handle
                .ingest_tx
                .send(IngestCommand::AddRecord { record, preassigned_seq: None })
                .await;
        }
    }

    drop(handle.ingest_tx);
    task.await.ok();
    Ok(())
}
