//! Wire types for the managed retrieve-and-generate operation.
//!
//! Field names follow the managed service's JSON (camelCase). Response
//! types are lenient: every optional part of the shape defaults, so a
//! partial response deserializes and citation resolution decides what to
//! surface.

use serde::{Deserialize, Serialize};

/// Request body for `POST /retrieveAndGenerate`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveAndGenerateRequest {
    pub input: GenerationInput,
    pub retrieve_and_generate_configuration: RetrieveAndGenerateConfiguration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationInput {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveAndGenerateConfiguration {
    /// Always `KNOWLEDGE_BASE` for this gateway.
    #[serde(rename = "type")]
    pub kind: String,
    pub knowledge_base_configuration: KnowledgeBaseConfiguration,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeBaseConfiguration {
    pub knowledge_base_id: String,
    pub model_arn: String,
}

impl RetrieveAndGenerateRequest {
    /// Build a knowledge-base backed request.
    pub fn knowledge_base(
        question: impl Into<String>,
        knowledge_base_id: impl Into<String>,
        model_arn: impl Into<String>,
        session_id: Option<String>,
    ) -> Self {
        Self {
            input: GenerationInput {
                text: question.into(),
            },
            retrieve_and_generate_configuration: RetrieveAndGenerateConfiguration {
                kind: "KNOWLEDGE_BASE".to_string(),
                knowledge_base_configuration: KnowledgeBaseConfiguration {
                    knowledge_base_id: knowledge_base_id.into(),
                    model_arn: model_arn.into(),
                },
            },
            session_id,
        }
    }
}

/// Response body of `POST /retrieveAndGenerate`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveAndGenerateResponse {
    #[serde(default)]
    pub output: GenerationOutput,
    #[serde(default)]
    pub citations: Vec<CitationEntry>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationOutput {
    #[serde(default)]
    pub text: String,
}

/// One citation: a span of generated text and the references backing it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationEntry {
    #[serde(default)]
    pub retrieved_references: Vec<RetrievedReference>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievedReference {
    #[serde(default)]
    pub location: Option<ReferenceLocation>,
}

/// Polymorphic location of a retrieved reference.
///
/// `type` names the variant; the matching `*Location` field carries the
/// address. Unknown types are preserved as strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceLocation {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub s3_location: Option<S3Location>,
    #[serde(default)]
    pub web_location: Option<WebLocation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct S3Location {
    #[serde(default)]
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebLocation {
    #[serde(default)]
    pub url: Option<String>,
}
