//! HTTP client for a running gateway.
//!
//! Used by `kbg chat`. A `500` from `/docs` carries a well-formed reply
//! (the server-side error sentinel) and is decoded along with its status;
//! only transport failures and unexpected statuses are errors.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use kb_gateway_core::backend::FoundationModelSummary;
use kb_gateway_core::conversation::QueryReply;
use kb_gateway_core::datasource::{UrlSettings, UrlUpdate};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub struct GatewayClient {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AskBody<'a> {
    question: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_session_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model_id: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelList {
    #[serde(default)]
    model_list: Vec<FoundationModelSummary>,
}

impl GatewayClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Ask a question. Returns the reply with the status it came with.
    pub async fn ask(
        &self,
        question: &str,
        session_id: Option<&str>,
        model_id: Option<&str>,
    ) -> Result<(StatusCode, QueryReply)> {
        let resp = self
            .http
            .post(self.url("/docs"))
            .json(&AskBody {
                question,
                request_session_id: session_id,
                model_id,
            })
            .send()
            .await
            .context("gateway unreachable")?;

        match resp.status() {
            status @ (StatusCode::OK | StatusCode::INTERNAL_SERVER_ERROR) => {
                let reply = resp
                    .json::<QueryReply>()
                    .await
                    .context("malformed answer from gateway")?;
                Ok((status, reply))
            }
            status => {
                let text = resp.text().await.unwrap_or_default();
                bail!("gateway returned {}: {}", status, text)
            }
        }
    }

    pub async fn get_urls(&self) -> Result<UrlSettings> {
        let resp = self
            .http
            .get(self.url("/urls"))
            .send()
            .await
            .context("gateway unreachable")?;
        decode(resp).await
    }

    pub async fn update_urls(&self, update: &UrlUpdate) -> Result<serde_json::Value> {
        let resp = self
            .http
            .post(self.url("/web-urls"))
            .json(update)
            .send()
            .await
            .context("gateway unreachable")?;
        decode(resp).await
    }

    /// Live model list, or the built-in catalog when `catalog` is set.
    pub async fn models(&self, catalog: bool) -> Result<Vec<FoundationModelSummary>> {
        let path = if catalog { "/models/catalog" } else { "/models" };
        let resp = self
            .http
            .get(self.url(path))
            .send()
            .await
            .context("gateway unreachable")?;
        let list: ModelList = decode(resp).await?;
        Ok(list.model_list)
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        bail!("gateway returned {}: {}", status, text);
    }
    resp.json::<T>()
        .await
        .context("malformed response from gateway")
}
