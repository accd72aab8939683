//! # Slidegen Demo
//!
//! Builds a deck from a canned outline and runs description then image
//! batches against a simulated model, printing polled job status.
//!
//! ```bash
//! SLIDEGEN_ENV=development cargo run --bin slidegen-demo
//! ```
//!
//! Set `SLIDEGEN_DEMO_FAIL_PAGE=3` to make page 3's image call fail with a
//! transient error and watch the job complete with a partial failure.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use slidegen_core::generation::{GenerationAdapter, GenerationFailure, GenerationRequest};
use slidegen_core::logging::init_structured_logging_with;
use slidegen_core::models::{NewContainer, Outline, OutlineEntry, PageOutline};
use slidegen_core::orchestration::{BatchOptions, BatchOrchestrator, StatusPoller};
use slidegen_core::{
    ConfigManager, ContainerStore, GenerationKind, InMemoryContainerStore, InMemoryJobRegistry,
    ItemPayload, JobRegistry,
};

/// Stands in for the model client with short, page-dependent latencies
struct SimulatedModel {
    fail_page: Option<usize>,
}

#[async_trait]
impl GenerationAdapter for SimulatedModel {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<ItemPayload, GenerationFailure> {
        let page = request.item.page_index;
        tokio::time::sleep(Duration::from_millis(40 + (page as u64 % 4) * 25)).await;

        match request.kind {
            GenerationKind::Description => Ok(ItemPayload::description(format!(
                "{}\n\nA short walk through {}.",
                request.item.outline.title,
                request.item.outline.points.join(", ")
            ))),
            GenerationKind::Image if self.fail_page == Some(page) => Err(
                GenerationFailure::transient("rate limited by image backend"),
            ),
            GenerationKind::Image if request.is_edit() => Ok(ItemPayload::image(
                format!("memory://slides/{}-edited.png", request.item.item_id),
                request.prompt.clone(),
            )),
            GenerationKind::Image => Ok(ItemPayload::image(
                format!("memory://slides/{}.png", request.item.item_id),
                request.prompt.clone(),
            )),
        }
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

fn demo_outline() -> Outline {
    let page = |title: &str, points: &[&str]| {
        PageOutline::new(title, points.iter().map(|p| p.to_string()).collect())
    };
    Outline::new(vec![
        OutlineEntry::Page(page("Why Rust", &["memory safety", "performance"])),
        OutlineEntry::Part {
            part: "Ownership".to_string(),
            pages: vec![
                page("Moves and borrows", &["one owner", "shared or mutable"]),
                page("Lifetimes", &["scopes", "elision"]),
            ],
        },
        OutlineEntry::Part {
            part: "Concurrency".to_string(),
            pages: vec![
                page("Send and Sync", &["marker traits"]),
                page("Async", &["futures", "executors"]),
            ],
        },
        OutlineEntry::Page(page("Wrap up", &["next steps"])),
    ])
}

#[tokio::main]
async fn main() -> Result<()> {
    let manager = ConfigManager::load().context("loading configuration")?;
    let config = manager.config().clone();
    init_structured_logging_with(&config.logging);

    let fail_page = std::env::var("SLIDEGEN_DEMO_FAIL_PAGE")
        .ok()
        .map(|raw| raw.parse::<usize>())
        .transpose()
        .context("SLIDEGEN_DEMO_FAIL_PAGE must be a page number")?;

    let registry = Arc::new(InMemoryJobRegistry::new());
    let store = Arc::new(InMemoryContainerStore::new());
    let orchestrator = BatchOrchestrator::new(
        registry.clone(),
        store.clone(),
        Arc::new(SimulatedModel { fail_page }),
        &config,
    );
    let poller = StatusPoller::new(registry.clone(), config.orchestration.poll_interval());

    let container = store
        .create_container(
            NewContainer::new("An introduction to Rust for backend engineers")
                .with_extra_requirements("Flat illustrations, dark background")
                .with_template_ref("templates/dark-grid.png"),
        )
        .await?;
    let items = store.set_outline(container.id, demo_outline()).await?;
    info!(container_id = %container.id, pages = items.len(), "Deck outline ready");

    for kind in GenerationKind::ALL {
        let job_id = orchestrator
            .start_batch(container.id, kind, BatchOptions::default().with_max_workers(3))
            .await
            .with_context(|| format!("starting {kind} batch"))?;

        let view = poller
            .watch(job_id, Duration::from_secs(60), |view| {
                println!(
                    "[{kind}] {} {}/{}",
                    view.status, view.progress.completed, view.progress.total
                );
            })
            .await?;

        println!("{}", serde_json::to_string_pretty(&view)?);
    }

    let cover = store.get_item(container.id, items[0].id).await?;
    if cover.image_ref().is_some() {
        let job_id = orchestrator
            .start_image_edit(container.id, cover.id, "Make the title larger and dark blue")
            .await
            .context("starting cover edit")?;
        let view = poller
            .wait_for_terminal(job_id, Duration::from_secs(60))
            .await?;
        println!("[edit] cover {}", view.status);
    }

    let container = store.get_container(container.id).await?;
    println!("Container stage: {}", container.state);
    println!(
        "Jobs recorded: {}",
        registry.jobs_for_container(container.id).await.len()
    );

    orchestrator.shutdown();
    Ok(())
}
