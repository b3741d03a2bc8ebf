//! Runs one middleware pattern against a stream of `email:deliver` tasks.
//!
//! The pattern, concurrency and log format come from `TASKCTX_PATTERN`,
//! `TASKCTX_CONCURRENCY` and `TASKCTX_LOG_FORMAT`. The worker enqueues a
//! handful of demo tasks into its in-memory broker and processes them until
//! ctrl-c.
mod settings;

use anyhow::Context;
use taskctx::{patterns::build_mux, tasks::new_email_delivery_task, telemetry};
use taskctx_core::{
    broker::MemoryBroker,
    client::{Client, EnqueueOptions},
    config::Config,
    server::Server,
};

use crate::settings::Settings;

/// Queues and their weights
const QUEUES: [(&str, u32); 3] = [("critical", 6), ("default", 3), ("low", 1)];

async fn produce_tasks(client: &Client<MemoryBroker>) -> anyhow::Result<()> {
    let templates = ["welcome", "reminder", "digest"];
    for user_id in 0..9u64 {
        let (queue, _) = QUEUES[user_id as usize % QUEUES.len()];
        let template = templates[user_id as usize % templates.len()];
        let task = new_email_delivery_task(user_id, template)?;
        let info = client
            .enqueue_with(&task, EnqueueOptions::default().queue(queue))
            .await?;
        tracing::info!(task_id = %info.id, queue = %info.queue, "enqueued task");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env()?;
    let telemetry =
        telemetry::init(&settings.telemetry).context("could not initialise telemetry")?;

    let broker = MemoryBroker::new();
    produce_tasks(&Client::new(broker.clone())).await?;

    let config = Config::default()
        .concurrency(settings.concurrency)
        .queues(QUEUES);
    let mux = build_mux(settings.pattern, &telemetry);
    tracing::info!(pattern = %settings.pattern, "starting worker");

    let metrics = telemetry.metrics().clone();
    Server::new(broker, config)
        .on_error(|task, err| {
            tracing::error!(task_type = task.type_name(), error = %err, "could not process task");
        })
        .run(mux)
        .await
        .context("could not run server")?;

    tracing::debug!(metrics = %metrics.render(), "final metrics");
    Ok(())
}
