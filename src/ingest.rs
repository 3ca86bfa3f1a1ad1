//! Ingestion triggers.
//!
//! Two things start an ingestion job:
//!
//! - **Schedule**: [`run_schedule`] re-crawls the web data source every
//!   `ingest.schedule_secs`.
//! - **Object created**: a storage event notification posted to
//!   `/events/object-created` re-syncs the document-bucket data source.
//!
//! Both end up in [`start_ingestion`]; they differ only in which data
//! source they target.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use kb_gateway_core::backend::{IngestionJob, KnowledgeBase};
use serde::Deserialize;

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestTrigger {
    Schedule,
    ObjectCreated,
}

impl IngestTrigger {
    /// The data source this trigger re-syncs.
    pub fn data_source_id<'a>(&self, config: &'a Config) -> Result<&'a str> {
        match self {
            IngestTrigger::Schedule => config.data_source_id(),
            IngestTrigger::ObjectCreated => config.s3_data_source_id(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IngestTrigger::Schedule => "schedule",
            IngestTrigger::ObjectCreated => "object-created",
        }
    }
}

/// Start an ingestion job, using `request_id` as the idempotency token.
pub async fn start_ingestion(
    kb: &dyn KnowledgeBase,
    config: &Config,
    trigger: IngestTrigger,
    request_id: &str,
) -> Result<IngestionJob> {
    let knowledge_base_id = config.knowledge_base_id()?;
    let data_source_id = trigger.data_source_id(config)?;

    let job = kb
        .start_ingestion_job(knowledge_base_id, data_source_id, request_id)
        .await
        .with_context(|| format!("Failed to start ingestion ({})", trigger.as_str()))?;

    tracing::info!(
        trigger = trigger.as_str(),
        %data_source_id,
        job_id = job.ingestion_job_id.as_deref().unwrap_or("-"),
        status = job.status.as_deref().unwrap_or("-"),
        "ingestion job started"
    );
    Ok(job)
}

/// Fire the scheduled trigger forever. Returns immediately when the
/// schedule is disabled.
pub async fn run_schedule(kb: Arc<dyn KnowledgeBase>, config: Arc<Config>) {
    let secs = config.ingest.schedule_secs;
    if secs == 0 {
        return;
    }
    let period = Duration::from_secs(secs);
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    tracing::info!(every_secs = secs, "scheduled ingestion enabled");

    loop {
        ticker.tick().await;
        let request_id = uuid::Uuid::new_v4().to_string();
        if let Err(e) = start_ingestion(kb.as_ref(), &config, IngestTrigger::Schedule, &request_id).await
        {
            tracing::error!(error = %format!("{:#}", e), "scheduled ingestion failed");
        }
    }
}

/// Storage event notification, as delivered by object-storage event hooks.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<EventRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "eventName", default)]
    pub event_name: String,
    #[serde(default)]
    pub s3: Option<EventEntity>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventEntity {
    #[serde(default)]
    pub object: Option<EventObject>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventObject {
    #[serde(default)]
    pub key: Option<String>,
}

impl EventRecord {
    pub fn is_object_created(&self) -> bool {
        self.event_name.starts_with("ObjectCreated")
    }

    pub fn key(&self) -> Option<&str> {
        self.s3.as_ref()?.object.as_ref()?.key.as_deref()
    }
}

impl StorageEvent {
    pub fn has_object_created(&self) -> bool {
        self.records.iter().any(EventRecord::is_object_created)
    }

    /// Keys of the created objects, for logging.
    pub fn object_created_keys(&self) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| r.is_object_created())
            .filter_map(EventRecord::key)
            .collect()
    }
}
