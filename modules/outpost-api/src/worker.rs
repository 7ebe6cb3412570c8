//! Worker pool: N worker processes drawing from a durable job queue. A
//! single job runs its steps sequentially within one worker, but multiple
//! jobs execute concurrently across workers. Each worker is a tokio task
//! that polls `claim_pending_job` and runs one job to completion before
//! polling again.

use std::sync::Arc;
use std::time::Duration;

use outpost_common::{JobStatus, StepEvent, StepName, StepStatus};
use outpost_pipeline::store::JobUpdate;
use tracing::{error, warn};

use crate::state::AppState;

/// How long an idle worker sleeps between empty polls of the job queue.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Spawn `worker_count` background tasks, each an independent consumer of
/// the durable job queue. `claim_pending_job` is the only path that dequeues
/// a `Pending` job and flips it to `Running`; this is the sole caller of
/// `Supervisor::run`, so a job runs exactly once no matter how many workers
/// are polling concurrently.
pub fn spawn_pool(state: Arc<AppState>, worker_count: usize, job_timeout: Duration) {
    let worker_count = worker_count.max(1);
    for worker_id in 0..worker_count {
        let state = state.clone();
        tokio::spawn(async move {
            tracing::info!(worker_id, "worker started");
            loop {
                match state.store.claim_pending_job().await {
                    Ok(Some(job)) => {
                        let job_id = job.id;
                        let run = state.supervisor.run(job_id);
                        match tokio::time::timeout(job_timeout, run).await {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => {
                                warn!(worker_id, %job_id, error = %e, "pipeline run failed");
                            }
                            Err(_) => {
                                error!(worker_id, %job_id, "pipeline run exceeded job timeout, cancelling");
                                // Dropping the timed-out future aborts the Supervisor mid-step
                                // without running its own failure handling, so the terminal
                                // transition happens here instead.
                                if let Err(e) = state
                                    .store
                                    .update_job(
                                        job_id,
                                        JobUpdate {
                                            status: Some(JobStatus::Failed),
                                            error: Some("job cancelled: queue timeout exceeded".to_string()),
                                            ..Default::default()
                                        },
                                    )
                                    .await
                                {
                                    error!(worker_id, %job_id, error = %e, "failed to mark timed-out job failed");
                                }
                                state
                                    .event_bus
                                    .publish(
                                        job_id,
                                        StepEvent::new(StepName::Pipeline, StepStatus::Failed).with_data(
                                            serde_json::json!({"error": "job cancelled: queue timeout exceeded"}),
                                        ),
                                    )
                                    .await;
                            }
                        }
                    }
                    Ok(None) => tokio::time::sleep(POLL_INTERVAL).await,
                    Err(e) => {
                        error!(worker_id, error = %e, "failed to poll job queue");
                        tokio::time::sleep(POLL_INTERVAL).await;
                    }
                }
            }
        });
    }
}
