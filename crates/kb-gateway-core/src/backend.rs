//! Managed knowledge-base abstraction.
//!
//! The [`KnowledgeBase`] trait covers every call the gateway makes to the
//! managed service. The production implementation signs and sends REST
//! requests; tests substitute an in-memory implementation.
//!
//! Implementations must be `Send + Sync` to be shared across handlers.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::datasource::{DataSource, DataSourceRequest};
use crate::generate::{RetrieveAndGenerateRequest, RetrieveAndGenerateResponse};

/// Summary of a started ingestion job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionJob {
    #[serde(default)]
    pub ingestion_job_id: Option<String>,
    #[serde(default)]
    pub knowledge_base_id: Option<String>,
    #[serde(default)]
    pub data_source_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// One entry of the live foundation-model listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoundationModelSummary {
    pub model_id: String,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub provider_name: Option<String>,
    #[serde(default)]
    pub input_modalities: Vec<String>,
    #[serde(default)]
    pub output_modalities: Vec<String>,
    #[serde(default)]
    pub response_streaming_supported: Option<bool>,
}

#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// Retrieve from the knowledge base and generate an answer.
    async fn retrieve_and_generate(
        &self,
        request: &RetrieveAndGenerateRequest,
    ) -> Result<RetrieveAndGenerateResponse>;

    async fn get_data_source(&self, knowledge_base_id: &str, data_source_id: &str)
        -> Result<DataSource>;

    async fn create_data_source(
        &self,
        knowledge_base_id: &str,
        request: &DataSourceRequest,
    ) -> Result<DataSource>;

    /// Replace a data source's configuration. Returns the raw service result.
    async fn update_data_source(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
        request: &DataSourceRequest,
    ) -> Result<serde_json::Value>;

    async fn delete_data_source(&self, knowledge_base_id: &str, data_source_id: &str) -> Result<()>;

    async fn start_ingestion_job(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
        client_token: &str,
    ) -> Result<IngestionJob>;

    /// List foundation models available for on-demand inference.
    async fn list_foundation_models(&self) -> Result<Vec<FoundationModelSummary>>;
}
