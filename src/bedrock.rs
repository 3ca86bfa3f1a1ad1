//! Managed knowledge-base client.
//!
//! [`BedrockClient`] implements [`KnowledgeBase`] over the service's REST
//! JSON API, signing every request with SigV4 (service name `bedrock`).
//! Three hosts are involved:
//!
//! | API | Host | Operations |
//! |-----|------|------------|
//! | agent runtime | `bedrock-agent-runtime.<region>.amazonaws.com` | retrieve-and-generate |
//! | agent | `bedrock-agent.<region>.amazonaws.com` | data sources, ingestion jobs |
//! | control plane | `bedrock.<region>.amazonaws.com` | foundation-model listing |
//!
//! Each host can be overridden through `[aws.endpoints]`.
//!
//! No call is retried: a failure is returned to the caller as-is.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use kb_gateway_core::backend::{FoundationModelSummary, IngestionJob, KnowledgeBase};
use kb_gateway_core::datasource::{DataSource, DataSourceRequest};
use kb_gateway_core::generate::{RetrieveAndGenerateRequest, RetrieveAndGenerateResponse};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::Config;
use crate::sigv4::{self, AwsCredentials, UnsignedRequest};

const SIGNING_SERVICE: &str = "bedrock";

/// A service base URL split into scheme and host.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Endpoint {
    scheme: String,
    host: String,
}

impl Endpoint {
    fn resolve(override_url: Option<&str>, default_host: String) -> Self {
        match override_url {
            Some(url) => {
                let (scheme, rest) = match url.split_once("://") {
                    Some((scheme, rest)) => (scheme.to_string(), rest),
                    None => ("https".to_string(), url),
                };
                Self {
                    scheme,
                    host: rest.trim_end_matches('/').to_string(),
                }
            }
            None => Self {
                scheme: "https".to_string(),
                host: default_host,
            },
        }
    }
}

pub struct BedrockClient {
    http: reqwest::Client,
    region: String,
    agent: Endpoint,
    agent_runtime: Endpoint,
    control: Endpoint,
}

impl BedrockClient {
    pub fn from_config(config: &Config) -> Result<Self> {
        let region = config.aws.region.clone();
        let endpoints = &config.aws.endpoints;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.query.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            agent: Endpoint::resolve(
                endpoints.agent.as_deref(),
                format!("bedrock-agent.{}.amazonaws.com", region),
            ),
            agent_runtime: Endpoint::resolve(
                endpoints.agent_runtime.as_deref(),
                format!("bedrock-agent-runtime.{}.amazonaws.com", region),
            ),
            control: Endpoint::resolve(
                endpoints.bedrock.as_deref(),
                format!("bedrock.{}.amazonaws.com", region),
            ),
            region,
        })
    }

    /// Send a signed request and return the raw response body.
    async fn send(
        &self,
        endpoint: &Endpoint,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<Vec<u8>>,
        operation: &str,
    ) -> Result<String> {
        let creds = AwsCredentials::from_env()?;
        let body = body.unwrap_or_default();
        let mut extra_headers = Vec::new();
        if !body.is_empty() {
            extra_headers.push(("content-type".to_string(), "application/json".to_string()));
        }

        let signed = sigv4::sign(
            &creds,
            &self.region,
            SIGNING_SERVICE,
            &UnsignedRequest {
                method: method.as_str(),
                host: &endpoint.host,
                path,
                query,
                headers: &extra_headers,
                body: &body,
            },
            Utc::now(),
        );

        let url = format!("{}://{}{}", endpoint.scheme, endpoint.host, path);
        let mut req = self
            .http
            .request(method, &url)
            .query(query)
            .header("Authorization", &signed.authorization)
            .header("x-amz-date", &signed.amz_date);
        for (k, v) in &extra_headers {
            req = req.header(k.as_str(), v.as_str());
        }
        if let Some(ref token) = signed.security_token {
            req = req.header("x-amz-security-token", token);
        }
        if !body.is_empty() {
            req = req.body(body);
        }

        tracing::debug!(operation, %url, "sending request");
        let resp = req
            .send()
            .await
            .map_err(|e| anyhow!("{} request failed: {}", operation, e))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .with_context(|| format!("{}: failed to read response", operation))?;
        if !status.is_success() {
            bail!(
                "{} failed (HTTP {}): {}",
                operation,
                status,
                text.chars().take(500).collect::<String>()
            );
        }
        Ok(text)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        endpoint: &Endpoint,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<Vec<u8>>,
        operation: &str,
    ) -> Result<T> {
        let text = self.send(endpoint, method, path, query, body, operation).await?;
        serde_json::from_str(&text).with_context(|| format!("{}: unexpected response body", operation))
    }
}

fn data_source_path(knowledge_base_id: &str, data_source_id: &str) -> String {
    format!(
        "/knowledgebases/{}/datasources/{}",
        sigv4::uri_encode(knowledge_base_id),
        sigv4::uri_encode(data_source_id)
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataSourceEnvelope {
    data_source: DataSource,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngestionJobEnvelope {
    ingestion_job: IngestionJob,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelListEnvelope {
    #[serde(default)]
    model_summaries: Vec<FoundationModelSummary>,
}

#[async_trait]
impl KnowledgeBase for BedrockClient {
    async fn retrieve_and_generate(
        &self,
        request: &RetrieveAndGenerateRequest,
    ) -> Result<RetrieveAndGenerateResponse> {
        self.send_json(
            &self.agent_runtime,
            Method::POST,
            "/retrieveAndGenerate",
            &[],
            Some(serde_json::to_vec(request)?),
            "RetrieveAndGenerate",
        )
        .await
    }

    async fn get_data_source(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
    ) -> Result<DataSource> {
        let envelope: DataSourceEnvelope = self
            .send_json(
                &self.agent,
                Method::GET,
                &data_source_path(knowledge_base_id, data_source_id),
                &[],
                None,
                "GetDataSource",
            )
            .await?;
        Ok(envelope.data_source)
    }

    async fn create_data_source(
        &self,
        knowledge_base_id: &str,
        request: &DataSourceRequest,
    ) -> Result<DataSource> {
        let path = format!(
            "/knowledgebases/{}/datasources/",
            sigv4::uri_encode(knowledge_base_id)
        );
        let envelope: DataSourceEnvelope = self
            .send_json(
                &self.agent,
                Method::PUT,
                &path,
                &[],
                Some(serde_json::to_vec(request)?),
                "CreateDataSource",
            )
            .await?;
        Ok(envelope.data_source)
    }

    async fn update_data_source(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
        request: &DataSourceRequest,
    ) -> Result<serde_json::Value> {
        self.send_json(
            &self.agent,
            Method::PUT,
            &data_source_path(knowledge_base_id, data_source_id),
            &[],
            Some(serde_json::to_vec(request)?),
            "UpdateDataSource",
        )
        .await
    }

    async fn delete_data_source(&self, knowledge_base_id: &str, data_source_id: &str) -> Result<()> {
        self.send(
            &self.agent,
            Method::DELETE,
            &data_source_path(knowledge_base_id, data_source_id),
            &[],
            None,
            "DeleteDataSource",
        )
        .await?;
        Ok(())
    }

    async fn start_ingestion_job(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
        client_token: &str,
    ) -> Result<IngestionJob> {
        let path = format!(
            "{}/ingestionjobs/",
            data_source_path(knowledge_base_id, data_source_id)
        );
        let body = serde_json::json!({ "clientToken": client_token });
        let envelope: IngestionJobEnvelope = self
            .send_json(
                &self.agent,
                Method::PUT,
                &path,
                &[],
                Some(serde_json::to_vec(&body)?),
                "StartIngestionJob",
            )
            .await?;
        Ok(envelope.ingestion_job)
    }

    async fn list_foundation_models(&self) -> Result<Vec<FoundationModelSummary>> {
        let query = [("byInferenceType".to_string(), "ON_DEMAND".to_string())];
        let envelope: ModelListEnvelope = self
            .send_json(
                &self.control,
                Method::GET,
                "/foundation-models",
                &query,
                None,
                "ListFoundationModels",
            )
            .await?;
        Ok(envelope.model_summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[test]
    fn test_default_hosts_follow_region() {
        let cfg = parse_config("[aws]\nregion = \"eu-central-1\"\n").unwrap();
        let client = BedrockClient::from_config(&cfg).unwrap();
        assert_eq!(client.agent.host, "bedrock-agent.eu-central-1.amazonaws.com");
        assert_eq!(
            client.agent_runtime.host,
            "bedrock-agent-runtime.eu-central-1.amazonaws.com"
        );
        assert_eq!(client.control.host, "bedrock.eu-central-1.amazonaws.com");
        assert_eq!(client.agent.scheme, "https");
    }

    #[test]
    fn test_endpoint_override() {
        let ep = Endpoint::resolve(Some("http://localhost:4566/"), "unused".to_string());
        assert_eq!(
            ep,
            Endpoint {
                scheme: "http".to_string(),
                host: "localhost:4566".to_string()
            }
        );
        let ep = Endpoint::resolve(Some("vpce.example.com"), "unused".to_string());
        assert_eq!(ep.scheme, "https");
        assert_eq!(ep.host, "vpce.example.com");
    }

    /// Serve one request with a 200 whose body stops short of its length.
    async fn truncated_body_server() -> u16 {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n\
                      content-length: 200\r\n\r\n{\"modelSummaries\":[",
                )
                .await
                .unwrap();
            socket.shutdown().await.ok();
        });
        port
    }

    #[tokio::test]
    async fn test_truncated_success_body_is_a_read_error() {
        std::env::set_var("AWS_ACCESS_KEY_ID", "AKIDEXAMPLE");
        std::env::set_var("AWS_SECRET_ACCESS_KEY", "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY");

        let port = truncated_body_server().await;
        let cfg = parse_config(&format!(
            "[aws]\nregion = \"us-east-1\"\n[aws.endpoints]\nbedrock = \"http://127.0.0.1:{}\"\n",
            port
        ))
        .unwrap();
        let client = BedrockClient::from_config(&cfg).unwrap();

        let err = client.list_foundation_models().await.unwrap_err();
        let message = format!("{:#}", err);
        assert!(
            message.contains("ListFoundationModels: failed to read response"),
            "{}",
            message
        );
    }

    #[test]
    fn test_data_source_path() {
        assert_eq!(
            data_source_path("KB1", "DS1"),
            "/knowledgebases/KB1/datasources/DS1"
        );
    }
}
