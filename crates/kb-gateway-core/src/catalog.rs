//! Static foundation-model catalog.
//!
//! The catalog lists the models a chat client can offer for selection. It is
//! plain data: the gateway never validates a requested model id against it,
//! it only formats the id into a model ARN (see [`model_arn`]).

use serde::Serialize;

/// Model used when a question arrives without a model id.
pub const DEFAULT_MODEL_ID: &str = "anthropic.claude-instant-v1";

/// Input or output modality supported by a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Modality {
    Text,
    Image,
}

/// One entry of the model catalog.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    #[serde(rename = "modelId")]
    pub id: &'static str,
    #[serde(rename = "modelName")]
    pub name: &'static str,
    #[serde(rename = "providerName")]
    pub provider: &'static str,
    pub input_modalities: &'static [Modality],
    pub output_modalities: &'static [Modality],
}

const TEXT: &[Modality] = &[Modality::Text];
const TEXT_IMAGE: &[Modality] = &[Modality::Text, Modality::Image];

pub static MODEL_CATALOG: &[ModelInfo] = &[
    ModelInfo {
        id: "amazon.titan-text-premier-v1:0",
        name: "Titan Text G1 - Premier",
        provider: "Amazon",
        input_modalities: TEXT,
        output_modalities: TEXT,
    },
    ModelInfo {
        id: "anthropic.claude-v2:1",
        name: "Claude",
        provider: "Anthropic",
        input_modalities: TEXT,
        output_modalities: TEXT,
    },
    ModelInfo {
        id: "anthropic.claude-v2",
        name: "Claude",
        provider: "Anthropic",
        input_modalities: TEXT,
        output_modalities: TEXT,
    },
    ModelInfo {
        id: "anthropic.claude-3-sonnet-20240229-v1:0",
        name: "Claude 3 Sonnet",
        provider: "Anthropic",
        input_modalities: TEXT_IMAGE,
        output_modalities: TEXT,
    },
    ModelInfo {
        id: "anthropic.claude-3-haiku-20240307-v1:0",
        name: "Claude 3 Haiku",
        provider: "Anthropic",
        input_modalities: TEXT_IMAGE,
        output_modalities: TEXT,
    },
    ModelInfo {
        id: "anthropic.claude-instant-v1",
        name: "Claude Instant",
        provider: "Anthropic",
        input_modalities: TEXT,
        output_modalities: TEXT,
    },
];

/// Look up a catalog entry by model id.
pub fn find_model(id: &str) -> Option<&'static ModelInfo> {
    MODEL_CATALOG.iter().find(|m| m.id == id)
}

/// Format a model id into a fully-qualified foundation-model ARN.
///
/// ```rust
/// use kb_gateway_core::catalog::model_arn;
///
/// assert_eq!(
///     model_arn("us-east-1", "anthropic.claude-v2"),
///     "arn:aws:bedrock:us-east-1::foundation-model/anthropic.claude-v2"
/// );
/// ```
pub fn model_arn(region: &str, model_id: &str) -> String {
    format!("arn:aws:bedrock:{}::foundation-model/{}", region, model_id)
}
