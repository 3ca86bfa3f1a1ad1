//! Web-crawler data source configuration.
//!
//! Wire types for the managed data-source API plus the two shapes the
//! gateway exchanges with clients: [`UrlSettings`] (read) and
//! [`UrlUpdate`] (full replacement write).
//!
//! Updates are always wholesale. [`web_data_source_request`] builds a
//! complete configuration from the submitted lists and the fixed crawler
//! settings; nothing from the previous configuration is merged in.

use serde::{Deserialize, Serialize};

/// Maximum number of seed URLs a web data source accepts.
pub const MAX_SEED_URLS: usize = 10;

/// How far the crawler may wander from a seed URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CrawlScope {
    HostOnly,
    Subdomains,
    Default,
}

/// Data source as returned by the managed service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    #[serde(default)]
    pub data_source_id: Option<String>,
    #[serde(default)]
    pub knowledge_base_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub data_source_configuration: Option<DataSourceConfiguration>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceConfiguration {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_configuration: Option<WebDataSourceConfiguration>,
    /// Object-storage configuration, kept opaque.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_configuration: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WebDataSourceConfiguration {
    #[serde(default)]
    pub source_configuration: WebSourceConfiguration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crawler_configuration: Option<WebCrawlerConfiguration>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WebSourceConfiguration {
    #[serde(default)]
    pub url_configuration: UrlConfiguration,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UrlConfiguration {
    #[serde(default)]
    pub seed_urls: Vec<SeedUrl>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeedUrl {
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WebCrawlerConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crawler_limits: Option<CrawlerLimits>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<CrawlScope>,
    #[serde(default)]
    pub exclusion_filters: Vec<String>,
    #[serde(default)]
    pub inclusion_filters: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CrawlerLimits {
    pub rate_limit: u32,
}

/// Body for create and update data-source calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceRequest {
    pub name: String,
    pub data_source_configuration: DataSourceConfiguration,
    pub data_deletion_policy: String,
    /// Idempotency token; only sent on create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_token: Option<String>,
}

/// Fixed crawler settings applied to every create and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlerSettings {
    pub name: String,
    pub rate_limit: u32,
    pub scope: CrawlScope,
}

/// Current seed URLs and filters, as shown to clients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlSettings {
    pub seed_url_list: Vec<String>,
    pub exclusion_filters: Vec<String>,
    pub inclusion_filters: Vec<String>,
    /// False when the data source has no web configuration at all.
    pub web_configured: bool,
}

impl UrlSettings {
    /// Extract URL settings from a data source.
    pub fn from_data_source(data_source: &DataSource) -> Self {
        let Some(web) = data_source
            .data_source_configuration
            .as_ref()
            .and_then(|c| c.web_configuration.as_ref())
        else {
            return Self::default();
        };

        let seed_url_list = web
            .source_configuration
            .url_configuration
            .seed_urls
            .iter()
            .map(|s| s.url.clone())
            .collect();
        let (exclusion_filters, inclusion_filters) = web
            .crawler_configuration
            .as_ref()
            .map(|c| (c.exclusion_filters.clone(), c.inclusion_filters.clone()))
            .unwrap_or_default();

        Self {
            seed_url_list,
            exclusion_filters,
            inclusion_filters,
            web_configured: true,
        }
    }
}

/// Full replacement of the seed URL and filter lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlUpdate {
    #[serde(default)]
    pub url_list: Vec<String>,
    #[serde(default)]
    pub exclusion_filters: Vec<String>,
    #[serde(default)]
    pub inclusion_filters: Vec<String>,
}

/// Build a complete web data-source request from `update` and `settings`.
pub fn web_data_source_request(settings: &CrawlerSettings, update: &UrlUpdate) -> DataSourceRequest {
    DataSourceRequest {
        name: settings.name.clone(),
        data_source_configuration: DataSourceConfiguration {
            kind: "WEB".to_string(),
            web_configuration: Some(WebDataSourceConfiguration {
                source_configuration: WebSourceConfiguration {
                    url_configuration: UrlConfiguration {
                        seed_urls: update
                            .url_list
                            .iter()
                            .map(|url| SeedUrl { url: url.clone() })
                            .collect(),
                    },
                },
                crawler_configuration: Some(WebCrawlerConfiguration {
                    crawler_limits: Some(CrawlerLimits {
                        rate_limit: settings.rate_limit,
                    }),
                    scope: Some(settings.scope),
                    exclusion_filters: update.exclusion_filters.clone(),
                    inclusion_filters: update.inclusion_filters.clone(),
                }),
            }),
            s3_configuration: None,
        },
        data_deletion_policy: "DELETE".to_string(),
        client_token: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> CrawlerSettings {
        CrawlerSettings {
            name: "WebCrawlerDataSource".to_string(),
            rate_limit: 50,
            scope: CrawlScope::HostOnly,
        }
    }

    #[test]
    fn test_request_replaces_lists_verbatim() {
        let update = UrlUpdate {
            url_list: vec!["https://a.example.com".into(), "https://b.example.com".into()],
            exclusion_filters: vec![".*private.*".into()],
            inclusion_filters: vec![],
        };
        let req = web_data_source_request(&settings(), &update);
        let json = serde_json::to_value(&req).unwrap();

        let web = &json["dataSourceConfiguration"]["webConfiguration"];
        assert_eq!(json["dataSourceConfiguration"]["type"], "WEB");
        assert_eq!(web["sourceConfiguration"]["urlConfiguration"]["seedUrls"][1]["url"], "https://b.example.com");
        assert_eq!(web["crawlerConfiguration"]["crawlerLimits"]["rateLimit"], 50);
        assert_eq!(web["crawlerConfiguration"]["scope"], "HOST_ONLY");
        assert_eq!(web["crawlerConfiguration"]["exclusionFilters"][0], ".*private.*");
        assert_eq!(web["crawlerConfiguration"]["inclusionFilters"], serde_json::json!([]));
        assert_eq!(json["dataDeletionPolicy"], "DELETE");
        assert!(json.get("clientToken").is_none());
    }

    #[test]
    fn test_settings_from_web_data_source() {
        let ds: DataSource = serde_json::from_str(
            r#"{"dataSourceId":"DS1","dataSourceConfiguration":{"type":"WEB","webConfiguration":{
                "sourceConfiguration":{"urlConfiguration":{"seedUrls":[{"url":"https://a.example.com"}]}},
                "crawlerConfiguration":{"scope":"HOST_ONLY","exclusionFilters":[".*x.*"],"inclusionFilters":["^https://a.*$"]}}}}"#,
        )
        .unwrap();
        let s = UrlSettings::from_data_source(&ds);
        assert!(s.web_configured);
        assert_eq!(s.seed_url_list, vec!["https://a.example.com"]);
        assert_eq!(s.exclusion_filters, vec![".*x.*"]);
        assert_eq!(s.inclusion_filters, vec!["^https://a.*$"]);
    }

    #[test]
    fn test_settings_without_web_configuration() {
        let ds: DataSource = serde_json::from_str(
            r#"{"dataSourceId":"DS1","dataSourceConfiguration":{"type":"S3","s3Configuration":{"bucketArn":"arn:aws:s3:::docs"}}}"#,
        )
        .unwrap();
        let s = UrlSettings::from_data_source(&ds);
        assert!(!s.web_configured);
        assert!(s.seed_url_list.is_empty());
    }

    #[test]
    fn test_configured_but_empty_is_distinguished() {
        let ds: DataSource = serde_json::from_str(
            r#"{"dataSourceConfiguration":{"type":"WEB","webConfiguration":{}}}"#,
        )
        .unwrap();
        let s = UrlSettings::from_data_source(&ds);
        assert!(s.web_configured);
        assert!(s.seed_url_list.is_empty());
        assert!(s.inclusion_filters.is_empty());
    }
}
