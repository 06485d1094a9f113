//! FIFO dispatcher: queued jobs → worker tasks under the concurrency cap.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::registry::JobRegistry;
use shorts_models::Job;

/// Start the dispatcher loop.
///
/// Jobs are handed to `handler` strictly in submission order; a job is only
/// picked up once a slot under the global semaphore frees, so at most
/// `max_concurrent_jobs` handlers run at any instant. The permit is moved
/// into the spawned task and released when the handler returns.
///
/// Panics if called twice on the same registry: there is exactly one queue
/// consumer.
pub fn run_dispatcher<F, Fut>(registry: Arc<JobRegistry>, handler: F) -> JoinHandle<()>
where
    F: Fn(Job) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut queue_rx = registry
        .take_queue_receiver()
        .expect("dispatcher already running for this registry");

    tokio::spawn(async move {
        info!(
            max_concurrent_jobs = registry.config().max_concurrent_jobs,
            "Dispatcher started"
        );

        while let Some(job_id) = queue_rx.recv().await {
            let permit = match registry.semaphore().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            registry.note_dequeued();

            let job = match registry.get(&job_id).await {
                Ok(job) => job,
                Err(e) => {
                    error!(
                        job_id = %job_id,
                        stage = "queued",
                        error = %e,
                        "Queued job vanished from registry"
                    );
                    continue;
                }
            };

            debug!(
                job_id = %job.job_id,
                trace_id = %job.trace_id,
                stage = "queued",
                "Dispatching job to worker"
            );
            let fut = handler(job);
            tokio::spawn(async move {
                let _permit = permit;
                fut.await;
            });
        }

        info!("Dispatcher stopped");
    })
}
