//! Intake - document tracking synchronization engine
//!
//! Reads document events as NDJSON on stdin, drives each through the
//! tracking orchestrator, and writes one result JSON object per line to
//! stdout.

use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use intake::crm::fields::{load_field_maps, FieldMaps};
use intake::crm::http::{HttpCrm, HttpCrmConfig};
use intake::crm::memory::InMemoryCrm;
use intake::crm::{BorrowerStore, DealStore, NoteClient, TaskClient};
use intake::events::DocumentEvent;
use intake::worker;
use intake::{Args, TrackingConfig, TrackingOrchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("intake={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Intake - Document Tracking Engine");
    info!("======================================");
    info!("Build: {} ({})", env!("GIT_COMMIT_SHORT"), env!("BUILD_TIMESTAMP"));
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Pipeline: {}", args.pipeline_id);
    info!("Docs-complete stage: {}", args.docs_complete_stage_id);
    info!("Field map: {}", args.field_map_file.display());
    info!("Queue capacity: {}", args.queue_capacity);
    info!("======================================");

    let field_maps: FieldMaps = match load_field_maps(&args.field_map_file) {
        Ok(maps) => maps,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let tracking_config = TrackingConfig {
        pipeline_id: args.pipeline_id.clone(),
        docs_complete_stage_id: args.docs_complete_stage_id.clone(),
        finmo_app_field_id: args.finmo_app_field_id.clone(),
        contact_fields: field_maps.contact,
        deal_fields: field_maps.opportunity,
    };

    if args.dev_mode {
        warn!("Dev mode: using in-process CRM, no writes leave this process");
        let crm = Arc::new(InMemoryCrm::new());
        run_pipeline(crm, tracking_config, &args).await
    } else {
        // Key presence was validated above
        let api_key = args.crm_api_key.as_deref().unwrap_or_default();
        let crm = Arc::new(HttpCrm::new(HttpCrmConfig::new(
            args.crm_base_url.clone(),
            api_key,
        ))?);
        info!("CRM client ready: {}", args.crm_base_url);
        run_pipeline(crm, tracking_config, &args).await
    }
}

/// Wire stdin, worker, and stdout together and run until stdin closes
async fn run_pipeline<C>(crm: Arc<C>, config: TrackingConfig, args: &Args) -> anyhow::Result<()>
where
    C: BorrowerStore + DealStore + NoteClient + TaskClient + 'static,
{
    let orchestrator = TrackingOrchestrator::new(
        config,
        Arc::clone(&crm),
        Arc::clone(&crm),
        Arc::clone(&crm),
        Arc::clone(&crm),
    );
    let worker::WorkerHandle {
        events,
        mut results,
        join,
    } = worker::spawn(orchestrator, args.queue_capacity, args.max_attempts);

    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<DocumentEvent>(line) {
                        Ok(event) => {
                            if events.send(event).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Skipping malformed event line: {}", e),
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!("stdin read failed: {}", e);
                    break;
                }
            }
        }
        // Dropping the sender lets the worker drain and stop
    });

    while let Some(result) = results.recv().await {
        println!("{}", serde_json::to_string(&result)?);
    }

    reader.await?;
    join.await?;
    info!("All events processed, shutting down");
    Ok(())
}
