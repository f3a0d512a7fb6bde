// src/ingest/orchestrator.rs
//! Bounded fan-out of fetch tasks over one adapter, full-barrier fan-in, merge.
//!
//! Each call builds its own pool of `min(tasks, concurrency_limit)` workers and
//! drops it when every task has finished. A failing, panicking or timed-out
//! task contributes no records; siblings are never aborted.

use futures::stream::{self, StreamExt};
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;

use crate::config::PoolConfig;
use crate::ingest::types::{FetchError, SourceAdapter};
use crate::ingest::{cap_per_channel, ensure_metrics_described, merge_records};
use crate::model::{FetchTask, VideoRecord};

/// Outcome of one stage: merged records plus the tasks that failed.
#[derive(Debug, Default)]
pub struct FetchReport {
    /// Deduplicated by `video_id`, newest upload first.
    pub records: Vec<VideoRecord>,
    pub failed: Vec<(FetchTask, FetchError)>,
    pub duplicates: usize,
}

impl FetchReport {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn quota_exhausted(&self) -> bool {
        self.failed
            .iter()
            .any(|(_, e)| matches!(e, FetchError::QuotaExhausted))
    }
}

type TaskOutcome = (usize, FetchTask, Result<Vec<VideoRecord>, FetchError>);

/// Run every task against `adapter` and merge what succeeded.
pub async fn run(
    tasks: Vec<FetchTask>,
    adapter: Arc<dyn SourceAdapter>,
    pool: &PoolConfig,
) -> FetchReport {
    ensure_metrics_described();
    if tasks.is_empty() {
        return FetchReport::default();
    }

    let workers = pool.pool_size(tasks.len());
    let timeout = pool.timeout;
    let adapter_name = adapter.name();
    let t0 = Instant::now();
    counter!("fetch_tasks_total", "adapter" => adapter_name).increment(tasks.len() as u64);

    let mut outcomes: Vec<TaskOutcome> = stream::iter(tasks.into_iter().enumerate().map(
        |(idx, task)| {
            let adapter = Arc::clone(&adapter);
            let reported = task.clone();
            // Spawned lazily: buffer_unordered pulls at most `workers` at a time.
            let handle = tokio::spawn(async move {
                let res = match tokio::time::timeout(timeout, adapter.fetch(&task)).await {
                    Ok(res) => res,
                    Err(_) => Err(FetchError::Timeout),
                };
                (idx, task, res)
            });
            async move {
                match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => (
                        idx,
                        reported,
                        Err(FetchError::Transient(format!("fetch task aborted: {e}"))),
                    ),
                }
            }
        },
    ))
    .buffer_unordered(workers)
    .collect()
    .await;

    // Completion order is arbitrary; dedup ("first seen") follows task order.
    outcomes.sort_by_key(|(idx, _, _)| *idx);

    let mut batches = Vec::with_capacity(outcomes.len());
    let mut failed = Vec::new();
    for (_, task, res) in outcomes {
        match res {
            Ok(records) => batches.push(records),
            Err(e) => {
                tracing::warn!(
                    target: "ingest",
                    adapter = adapter_name,
                    query = %task.source_query,
                    kind = ?task.source_kind,
                    error = %e,
                    "fetch task failed"
                );
                counter!("fetch_task_errors_total", "adapter" => adapter_name, "kind" => e.kind())
                    .increment(1);
                failed.push((task, e));
            }
        }
    }

    let (records, duplicates) = merge_records(batches);

    counter!("fetch_records_total").increment(records.len() as u64);
    counter!("fetch_dedup_total").increment(duplicates as u64);
    histogram!("fetch_stage_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    tracing::info!(
        target: "ingest",
        adapter = adapter_name,
        workers,
        kept = records.len(),
        failed = failed.len(),
        duplicates,
        "fetch stage done"
    );

    FetchReport {
        records,
        failed,
        duplicates,
    }
}

/// Feed → detail composition: stage one collects ids per channel, its fan-in
/// becomes the `VideoDetail` task list of stage two.
///
/// Ids whose detail lookup fails are dropped.
pub async fn run_two_stage(
    channel_ids: &[String],
    feed: Arc<dyn SourceAdapter>,
    detail: Arc<dyn SourceAdapter>,
    pool: &PoolConfig,
) -> FetchReport {
    run_two_stage_capped(channel_ids, usize::MAX, feed, detail, pool).await
}

/// [`run_two_stage`] keeping at most `per_channel` of the newest skeletons of
/// each channel before the detail stage.
pub async fn run_two_stage_capped(
    channel_ids: &[String],
    per_channel: usize,
    feed: Arc<dyn SourceAdapter>,
    detail: Arc<dyn SourceAdapter>,
    pool: &PoolConfig,
) -> FetchReport {
    let stage_one = run(
        channel_ids.iter().map(FetchTask::channel).collect(),
        feed,
        pool,
    )
    .await;

    let detail_tasks: Vec<FetchTask> = cap_per_channel(stage_one.records, per_channel)
        .into_iter()
        .map(|r| FetchTask::video(r.video_id))
        .collect();

    let mut stage_two = run(detail_tasks, detail, pool).await;

    let mut failed = stage_one.failed;
    failed.append(&mut stage_two.failed);
    FetchReport {
        records: stage_two.records,
        failed,
        duplicates: stage_one.duplicates + stage_two.duplicates,
    }
}
