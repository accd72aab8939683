//! # Job Runner
//!
//! Executes one item's generation: build the prompt (or the edit prompt when
//! the unit carries an instruction), call the adapter under a timeout, write
//! the outcome to the store and report it back. The runner
//! never touches the job record and never retries; a retry is a new
//! generation request with the overwrite flag set.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use crate::generation::{
    build_edit_prompt, build_prompt, GenerationAdapter, GenerationFailure, GenerationRequest,
};
use crate::models::{ItemOutcome, ItemPayload};
use crate::store::{ContainerStore, WriteOutcome};

use super::types::{panic_message, ItemCompletion, WorkUnit};

pub struct JobRunner {
    adapter: Arc<dyn GenerationAdapter>,
    store: Arc<dyn ContainerStore>,
}

impl std::fmt::Debug for JobRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRunner")
            .field("adapter", &self.adapter.name())
            .finish()
    }
}

impl JobRunner {
    pub fn new(adapter: Arc<dyn GenerationAdapter>, store: Arc<dyn ContainerStore>) -> Self {
        Self { adapter, store }
    }

    /// Run one claimed item to completion
    pub async fn run(&self, unit: &WorkUnit, timeout: Duration) -> ItemCompletion {
        let started = Instant::now();
        let generated = self.generate(unit, timeout).await;
        let outcome = self.write(unit, generated).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        debug!(
            job_id = %unit.job_id,
            item_id = %unit.item_id(),
            kind = %unit.kind,
            success = outcome.is_success(),
            duration_ms = duration_ms,
            "🏃 RUNNER: Item finished"
        );
        ItemCompletion::new(unit.job_id, unit.item_id(), outcome, duration_ms)
    }

    async fn generate(
        &self,
        unit: &WorkUnit,
        timeout: Duration,
    ) -> Result<ItemPayload, GenerationFailure> {
        let context = &unit.item.context;
        let (prompt, source_image) = match unit.instruction.as_deref() {
            Some(instruction) => (
                build_edit_prompt(&unit.container, context, instruction)?,
                context.image_ref.clone(),
            ),
            None => (build_prompt(unit.kind, &unit.container, context)?, None),
        };
        let request = GenerationRequest {
            kind: unit.kind,
            container: unit.container.as_ref().clone(),
            item: context.clone(),
            prompt,
            source_image,
            timeout,
        };

        let result = tokio::time::timeout(
            timeout,
            AssertUnwindSafe(self.adapter.generate(&request)).catch_unwind(),
        )
        .await;

        match result {
            Ok(Ok(Ok(payload))) if payload.kind() == unit.kind => Ok(payload),
            Ok(Ok(Ok(payload))) => Err(GenerationFailure::permanent(format!(
                "Adapter {} returned {} content for a {} request",
                self.adapter.name(),
                payload.kind(),
                unit.kind
            ))),
            Ok(Ok(Err(failure))) => {
                warn!(
                    job_id = %unit.job_id,
                    item_id = %unit.item_id(),
                    adapter = self.adapter.name(),
                    failure = %failure,
                    "🏃 RUNNER: Adapter reported failure"
                );
                Err(failure)
            }
            Ok(Err(panic)) => {
                let message = panic_message(panic.as_ref());
                error!(
                    job_id = %unit.job_id,
                    item_id = %unit.item_id(),
                    adapter = self.adapter.name(),
                    panic_msg = %message,
                    "🏃 RUNNER: Adapter panicked"
                );
                Err(GenerationFailure::permanent(format!(
                    "Adapter panicked: {message}"
                )))
            }
            Err(_) => {
                warn!(
                    job_id = %unit.job_id,
                    item_id = %unit.item_id(),
                    timeout_ms = timeout.as_millis() as u64,
                    "⏱️ RUNNER: Generation timed out"
                );
                Err(GenerationFailure::timed_out(timeout))
            }
        }
    }

    async fn write(
        &self,
        unit: &WorkUnit,
        generated: Result<ItemPayload, GenerationFailure>,
    ) -> ItemOutcome {
        let container_id = unit.container.container_id;
        let item_id = unit.item_id();

        let (written, outcome) = match generated {
            Ok(payload) => (
                self.store.record_success(container_id, item_id, payload).await,
                ItemOutcome::Succeeded,
            ),
            Err(failure) => (
                self.store
                    .record_failure(container_id, item_id, failure.clone())
                    .await,
                ItemOutcome::failed(failure),
            ),
        };

        match written {
            Ok(WriteOutcome::Applied) => outcome,
            Ok(WriteOutcome::Discarded(reason)) => ItemOutcome::skipped(reason),
            Err(store_error) => {
                error!(
                    job_id = %unit.job_id,
                    item_id = %item_id,
                    error = %store_error,
                    "🏃 RUNNER: Failed to write item result"
                );
                ItemOutcome::failed(GenerationFailure::permanent(format!(
                    "Failed to store result: {store_error}"
                )))
            }
        }
    }
}
