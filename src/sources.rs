//! Web-crawler data source management.
//!
//! The gateway owns one web data source inside the configured knowledge
//! base. Its name, crawl rate and scope are fixed by configuration; clients
//! only choose the seed URLs and the two filter lists.
//!
//! Updates are full replacements: whatever the client submits becomes the
//! complete configuration, with no merge against the stored one.

use anyhow::{bail, Context, Result};
use kb_gateway_core::backend::KnowledgeBase;
use kb_gateway_core::datasource::{
    web_data_source_request, UrlSettings, UrlUpdate, MAX_SEED_URLS,
};
use serde::Serialize;

use crate::config::Config;

/// Identity of a freshly provisioned data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedDataSource {
    pub data_source_id: String,
    pub name: String,
}

/// Provision the web data source.
///
/// Uses `urls` when given, otherwise the `[crawler]` defaults.
pub async fn create(
    kb: &dyn KnowledgeBase,
    config: &Config,
    urls: Option<UrlUpdate>,
) -> Result<CreatedDataSource> {
    let knowledge_base_id = config.knowledge_base_id()?;
    let urls = urls.unwrap_or_else(|| config.default_url_update());
    validate_update(&urls)?;

    let mut request = web_data_source_request(&config.crawler_settings(), &urls);
    request.client_token = Some(uuid::Uuid::new_v4().to_string());

    let created = kb
        .create_data_source(knowledge_base_id, &request)
        .await
        .context("Failed to create data source")?;

    let data_source_id = created
        .data_source_id
        .context("created data source has no id")?;
    let name = created.name.unwrap_or(request.name);
    tracing::info!(%data_source_id, %name, "data source created");

    Ok(CreatedDataSource {
        data_source_id,
        name,
    })
}

/// Current seed URLs and filters of the web data source.
pub async fn read(kb: &dyn KnowledgeBase, config: &Config) -> Result<UrlSettings> {
    let data_source = kb
        .get_data_source(config.knowledge_base_id()?, config.data_source_id()?)
        .await
        .context("Failed to read data source")?;
    Ok(UrlSettings::from_data_source(&data_source))
}

/// Reject updates the managed service would refuse.
pub fn validate_update(update: &UrlUpdate) -> Result<()> {
    if update.url_list.len() > MAX_SEED_URLS {
        bail!(
            "at most {} seed URLs are allowed, got {}",
            MAX_SEED_URLS,
            update.url_list.len()
        );
    }
    Ok(())
}

/// Replace the web data source's URLs and filters.
///
/// Returns the managed service's update result unchanged.
pub async fn update(
    kb: &dyn KnowledgeBase,
    config: &Config,
    update: &UrlUpdate,
) -> Result<serde_json::Value> {
    validate_update(update)?;
    let knowledge_base_id = config.knowledge_base_id()?;
    let data_source_id = config.data_source_id()?;

    let request = web_data_source_request(&config.crawler_settings(), update);
    let result = kb
        .update_data_source(knowledge_base_id, data_source_id, &request)
        .await
        .context("Failed to update data source")?;

    tracing::info!(
        %data_source_id,
        urls = update.url_list.len(),
        exclusions = update.exclusion_filters.len(),
        inclusions = update.inclusion_filters.len(),
        "data source updated"
    );
    Ok(result)
}

pub async fn delete(kb: &dyn KnowledgeBase, config: &Config, data_source_id: &str) -> Result<()> {
    kb.delete_data_source(config.knowledge_base_id()?, data_source_id)
        .await
        .with_context(|| format!("Failed to delete data source {}", data_source_id))?;
    tracing::info!(%data_source_id, "data source deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kb_gateway_core::backend::{FoundationModelSummary, IngestionJob};
    use kb_gateway_core::datasource::{DataSource, DataSourceRequest};
    use kb_gateway_core::generate::{RetrieveAndGenerateRequest, RetrieveAndGenerateResponse};
    use std::sync::Mutex;

    /// Records data-source writes; `created_id` is what create answers with.
    #[derive(Default)]
    struct Recorder {
        created_id: Option<String>,
        created: Mutex<Vec<(String, DataSourceRequest)>>,
        deleted: Mutex<Vec<(String, String)>>,
    }

    impl Recorder {
        fn answering(id: &str) -> Self {
            Self {
                created_id: Some(id.to_string()),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl KnowledgeBase for Recorder {
        async fn retrieve_and_generate(
            &self,
            _: &RetrieveAndGenerateRequest,
        ) -> Result<RetrieveAndGenerateResponse> {
            bail!("unused")
        }
        async fn get_data_source(&self, _: &str, _: &str) -> Result<DataSource> {
            bail!("unused")
        }
        async fn create_data_source(
            &self,
            knowledge_base_id: &str,
            request: &DataSourceRequest,
        ) -> Result<DataSource> {
            self.created
                .lock()
                .unwrap()
                .push((knowledge_base_id.to_string(), request.clone()));
            Ok(DataSource {
                data_source_id: self.created_id.clone(),
                knowledge_base_id: Some(knowledge_base_id.to_string()),
                name: Some(request.name.clone()),
                ..Default::default()
            })
        }
        async fn update_data_source(
            &self,
            _: &str,
            _: &str,
            _: &DataSourceRequest,
        ) -> Result<serde_json::Value> {
            bail!("unused")
        }
        async fn delete_data_source(&self, knowledge_base_id: &str, data_source_id: &str) -> Result<()> {
            self.deleted
                .lock()
                .unwrap()
                .push((knowledge_base_id.to_string(), data_source_id.to_string()));
            Ok(())
        }
        async fn start_ingestion_job(&self, _: &str, _: &str, _: &str) -> Result<IngestionJob> {
            bail!("unused")
        }
        async fn list_foundation_models(&self) -> Result<Vec<FoundationModelSummary>> {
            bail!("unused")
        }
    }

    fn config() -> Config {
        crate::config::parse_config(
            r#"
[aws]
region = "us-west-2"

[knowledge_base]
id = "KB1"

[crawler]
seed_urls = ["https://docs.example.com"]
exclusion_filters = [".*private.*"]
inclusion_filters = ["^https://docs.*$"]
"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_sends_fixed_crawler_settings_and_defaults() {
        let kb = Recorder::answering("DS9");
        let created = create(&kb, &config(), None).await.unwrap();
        assert_eq!(
            created,
            CreatedDataSource {
                data_source_id: "DS9".to_string(),
                name: "WebCrawlerDataSource".to_string(),
            }
        );

        let calls = kb.created.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (kb_id, request) = &calls[0];
        assert_eq!(kb_id, "KB1");

        let json = serde_json::to_value(request).unwrap();
        assert_eq!(json["name"], "WebCrawlerDataSource");
        assert_eq!(json["dataDeletionPolicy"], "DELETE");
        let web = &json["dataSourceConfiguration"]["webConfiguration"];
        assert_eq!(
            web["sourceConfiguration"]["urlConfiguration"]["seedUrls"],
            serde_json::json!([{"url": "https://docs.example.com"}])
        );
        let crawler = &web["crawlerConfiguration"];
        assert_eq!(crawler["crawlerLimits"]["rateLimit"], 50);
        assert_eq!(crawler["scope"], "HOST_ONLY");
        assert_eq!(crawler["exclusionFilters"], serde_json::json!([".*private.*"]));
        assert_eq!(crawler["inclusionFilters"], serde_json::json!(["^https://docs.*$"]));

        let token = request.client_token.as_deref().unwrap();
        assert!(uuid::Uuid::parse_str(token).is_ok());
    }

    #[tokio::test]
    async fn test_create_uses_given_urls() {
        let kb = Recorder::answering("DS9");
        let urls = UrlUpdate {
            url_list: vec!["https://blog.example.com".to_string()],
            ..Default::default()
        };
        create(&kb, &config(), Some(urls)).await.unwrap();

        let calls = kb.created.lock().unwrap();
        let web = calls[0].1.data_source_configuration.web_configuration.as_ref().unwrap();
        let seeds: Vec<&str> = web
            .source_configuration
            .url_configuration
            .seed_urls
            .iter()
            .map(|s| s.url.as_str())
            .collect();
        assert_eq!(seeds, vec!["https://blog.example.com"]);
    }

    #[tokio::test]
    async fn test_create_without_returned_id_fails() {
        let kb = Recorder::default();
        let err = create(&kb, &config(), None).await.unwrap_err();
        assert!(err.to_string().contains("no id"));
    }

    #[tokio::test]
    async fn test_create_rejects_too_many_urls() {
        let kb = Recorder::answering("DS9");
        let urls = UrlUpdate {
            url_list: (0..=MAX_SEED_URLS)
                .map(|i| format!("https://site{}.example.com", i))
                .collect(),
            ..Default::default()
        };
        let err = create(&kb, &config(), Some(urls)).await.unwrap_err();
        assert!(err.to_string().contains("at most 10"));
        assert!(kb.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_targets_given_id() {
        let kb = Recorder::default();
        delete(&kb, &config(), "DS-OLD").await.unwrap();
        assert_eq!(
            *kb.deleted.lock().unwrap(),
            vec![("KB1".to_string(), "DS-OLD".to_string())]
        );
    }

    #[test]
    fn test_validate_update_caps_urls() {
        let mut update = UrlUpdate {
            url_list: (0..MAX_SEED_URLS)
                .map(|i| format!("https://site{}.example.com", i))
                .collect(),
            ..Default::default()
        };
        assert!(validate_update(&update).is_ok());

        update.url_list.push("https://one-too-many.example.com".to_string());
        let err = validate_update(&update).unwrap_err();
        assert!(err.to_string().contains("at most 10"));
    }

    #[test]
    fn test_empty_update_is_valid() {
        assert!(validate_update(&UrlUpdate::default()).is_ok());
    }
}
