//! Fixed-interval polling of job status until a terminal state.
//!
//! Reads go through the registry's `status` view and never mutate a job, so
//! any number of pollers may watch the same job.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::debug;
use uuid::Uuid;

use crate::error::{SlidegenError, SlidegenResult};
use crate::models::JobStatusView;
use crate::registry::JobRegistry;

#[derive(Clone)]
pub struct StatusPoller {
    registry: Arc<dyn JobRegistry>,
    poll_interval: Duration,
}

impl std::fmt::Debug for StatusPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusPoller")
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl StatusPoller {
    pub fn new(registry: Arc<dyn JobRegistry>, poll_interval: Duration) -> Self {
        Self {
            registry,
            poll_interval,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub async fn poll(&self, job_id: Uuid) -> SlidegenResult<JobStatusView> {
        Ok(self.registry.status(job_id).await?)
    }

    /// Poll until the job is terminal or `deadline` elapses
    pub async fn wait_for_terminal(
        &self,
        job_id: Uuid,
        deadline: Duration,
    ) -> SlidegenResult<JobStatusView> {
        self.watch(job_id, deadline, |_| {}).await
    }

    /// Like [`wait_for_terminal`](Self::wait_for_terminal), handing every
    /// observed view to `on_poll`
    pub async fn watch<F>(
        &self,
        job_id: Uuid,
        deadline: Duration,
        mut on_poll: F,
    ) -> SlidegenResult<JobStatusView>
    where
        F: FnMut(&JobStatusView) + Send,
    {
        timeout(deadline, self.poll_until_terminal(job_id, &mut on_poll))
            .await
            .map_err(|_| {
                SlidegenError::Timeout(format!(
                    "Job {job_id} not terminal after {}ms",
                    deadline.as_millis()
                ))
            })?
    }

    async fn poll_until_terminal<F>(
        &self,
        job_id: Uuid,
        on_poll: &mut F,
    ) -> SlidegenResult<JobStatusView>
    where
        F: FnMut(&JobStatusView) + Send,
    {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let view = self.poll(job_id).await?;
            debug!(
                job_id = %job_id,
                status = %view.status,
                completed = view.progress.completed,
                total = view.progress.total,
                "🔎 POLLER: Job status"
            );
            on_poll(&view);
            if view.is_terminal() {
                return Ok(view);
            }
        }
    }
}
