//! Question answering against the knowledge base.
//!
//! [`ask`] turns a client question into one retrieve-and-generate call and
//! always produces a [`QueryReply`]: upstream failures never escape, they
//! are logged and replaced by [`SERVER_ERROR_MESSAGE`] with a `500` status.

use anyhow::Result;
use axum::http::StatusCode;
use kb_gateway_core::backend::KnowledgeBase;
use kb_gateway_core::catalog::model_arn;
use kb_gateway_core::citation::resolve_citation;
use kb_gateway_core::conversation::QueryReply;
use kb_gateway_core::generate::RetrieveAndGenerateRequest;
use serde::Deserialize;

use crate::config::Config;

/// Answer returned when the managed service call fails.
pub const SERVER_ERROR_MESSAGE: &str = "Server side error: please check function logs";

pub const EMPTY_QUESTION_MESSAGE: &str = "question must not be empty";

/// Body of `POST /docs`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub request_session_id: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
}

/// Answer `request`, returning the HTTP status and reply body.
pub async fn ask(
    kb: &dyn KnowledgeBase,
    config: &Config,
    request: &QueryRequest,
) -> (StatusCode, QueryReply) {
    if request.question.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, empty_reply(EMPTY_QUESTION_MESSAGE));
    }

    match generate(kb, config, request).await {
        Ok(reply) => (StatusCode::OK, reply),
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "retrieve-and-generate failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                empty_reply(SERVER_ERROR_MESSAGE),
            )
        }
    }
}

async fn generate(
    kb: &dyn KnowledgeBase,
    config: &Config,
    request: &QueryRequest,
) -> Result<QueryReply> {
    let knowledge_base_id = config.knowledge_base_id()?;
    let model_id = request
        .model_id
        .as_deref()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(config.query.default_model.as_str());
    let session_id = request
        .request_session_id
        .clone()
        .filter(|s| !s.trim().is_empty());

    tracing::info!(
        model = model_id,
        continuing = session_id.is_some(),
        "answering question"
    );

    let outbound = RetrieveAndGenerateRequest::knowledge_base(
        request.question.as_str(),
        knowledge_base_id,
        model_arn(&config.aws.region, model_id),
        session_id,
    );
    let response = kb.retrieve_and_generate(&outbound).await?;

    Ok(QueryReply {
        response: response.output.text,
        citation: resolve_citation(&response.citations).into_string(),
        session_id: response.session_id,
    })
}

fn empty_reply(message: &str) -> QueryReply {
    QueryReply {
        response: message.to_string(),
        citation: None,
        session_id: None,
    }
}
