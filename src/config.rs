//! Configuration loading.
//!
//! Configuration comes from an optional TOML file, then environment
//! variables override individual keys. Everything is read once at startup
//! and never mutated afterwards.
//!
//! # Example
//!
//! ```toml
//! [aws]
//! region = "us-east-1"
//!
//! [knowledge_base]
//! id = "KB12345678"
//! data_source_id = "WEB1234567"
//! s3_data_source_id = "DOCS123456"
//!
//! [server]
//! bind = "0.0.0.0:8787"
//! allowed_ips = ["203.0.113.0/24"]
//! ```
//!
//! # Environment overrides
//!
//! | Variable | Key |
//! |----------|-----|
//! | `AWS_REGION` | `aws.region` |
//! | `KNOWLEDGE_BASE_ID` | `knowledge_base.id` |
//! | `DATA_SOURCE_ID` | `knowledge_base.data_source_id` |
//! | `S3_DATA_SOURCE_ID` | `knowledge_base.s3_data_source_id` |
//! | `DATA_SOURCE_NAME` | `knowledge_base.data_source_name` |

use anyhow::{bail, Context, Result};
use kb_gateway_core::catalog::DEFAULT_MODEL_ID;
use kb_gateway_core::datasource::{CrawlScope, CrawlerSettings, UrlUpdate};
use serde::Deserialize;
use std::path::Path;

use crate::access::IpAllowList;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub aws: AwsConfig,
    #[serde(default)]
    pub knowledge_base: KnowledgeBaseConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AwsConfig {
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            endpoints: EndpointsConfig::default(),
        }
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}

/// Per-service endpoint overrides (emulators, VPC endpoints).
#[derive(Debug, Deserialize, Clone, Default)]
pub struct EndpointsConfig {
    pub agent: Option<String>,
    pub agent_runtime: Option<String>,
    pub bedrock: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KnowledgeBaseConfig {
    pub id: Option<String>,
    /// Web-crawler data source.
    pub data_source_id: Option<String>,
    /// Document-bucket data source.
    pub s3_data_source_id: Option<String>,
    #[serde(default = "default_data_source_name")]
    pub data_source_name: String,
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            id: None,
            data_source_id: None,
            s3_data_source_id: None,
            data_source_name: default_data_source_name(),
        }
    }
}

fn default_data_source_name() -> String {
    "WebCrawlerDataSource".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL_ID.to_string()
}
fn default_timeout_secs() -> u64 {
    29
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrawlerConfig {
    #[serde(default = "default_crawl_rate_limit")]
    pub rate_limit: u32,
    #[serde(default = "default_scope")]
    pub scope: CrawlScope,
    /// Seed URLs used when creating the data source.
    #[serde(default = "default_seed_urls")]
    pub seed_urls: Vec<String>,
    #[serde(default = "default_exclusion_filters")]
    pub exclusion_filters: Vec<String>,
    #[serde(default = "default_inclusion_filters")]
    pub inclusion_filters: Vec<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            rate_limit: default_crawl_rate_limit(),
            scope: default_scope(),
            seed_urls: default_seed_urls(),
            exclusion_filters: default_exclusion_filters(),
            inclusion_filters: default_inclusion_filters(),
        }
    }
}

fn default_crawl_rate_limit() -> u32 {
    50
}
fn default_scope() -> CrawlScope {
    CrawlScope::HostOnly
}
fn default_seed_urls() -> Vec<String> {
    vec!["https://www.aboutamazon.com/news/amazon-offices".to_string()]
}
fn default_exclusion_filters() -> Vec<String> {
    vec![".*plants.*".to_string()]
}
fn default_inclusion_filters() -> Vec<String> {
    vec!["^https?://www.aboutamazon.com/news/amazon-offices/.*$".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Interval between scheduled crawls; 0 disables the schedule.
    #[serde(default = "default_schedule_secs")]
    pub schedule_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            schedule_secs: default_schedule_secs(),
        }
    }
}

fn default_schedule_secs() -> u64 {
    86_400
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// CIDR blocks allowed to call the gateway. Everything else is denied.
    #[serde(default = "default_allowed_ips")]
    pub allowed_ips: Vec<String>,
    /// Sustained requests per second.
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,
    #[serde(default = "default_burst_limit")]
    pub burst_limit: u32,
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            allowed_ips: default_allowed_ips(),
            rate_limit: default_rate_limit(),
            burst_limit: default_burst_limit(),
            trust_forwarded_for: false,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8787".to_string()
}
fn default_allowed_ips() -> Vec<String> {
    vec!["127.0.0.1/32".to_string(), "::1/128".to_string()]
}
fn default_rate_limit() -> u32 {
    100
}
fn default_burst_limit() -> u32 {
    200
}

impl Config {
    /// Override keys from environment variables found by `lookup`.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(region) = non_empty("AWS_REGION") {
            self.aws.region = region;
        }
        if let Some(id) = non_empty("KNOWLEDGE_BASE_ID") {
            self.knowledge_base.id = Some(id);
        }
        if let Some(id) = non_empty("DATA_SOURCE_ID") {
            self.knowledge_base.data_source_id = Some(id);
        }
        if let Some(id) = non_empty("S3_DATA_SOURCE_ID") {
            self.knowledge_base.s3_data_source_id = Some(id);
        }
        if let Some(name) = non_empty("DATA_SOURCE_NAME") {
            self.knowledge_base.data_source_name = name;
        }
    }

    pub fn knowledge_base_id(&self) -> Result<&str> {
        required(&self.knowledge_base.id, "knowledge_base.id (KNOWLEDGE_BASE_ID)")
    }

    pub fn data_source_id(&self) -> Result<&str> {
        required(
            &self.knowledge_base.data_source_id,
            "knowledge_base.data_source_id (DATA_SOURCE_ID)",
        )
    }

    pub fn s3_data_source_id(&self) -> Result<&str> {
        required(
            &self.knowledge_base.s3_data_source_id,
            "knowledge_base.s3_data_source_id (S3_DATA_SOURCE_ID)",
        )
    }

    /// Fixed settings applied to every web data-source write.
    pub fn crawler_settings(&self) -> CrawlerSettings {
        CrawlerSettings {
            name: self.knowledge_base.data_source_name.clone(),
            rate_limit: self.crawler.rate_limit,
            scope: self.crawler.scope,
        }
    }

    /// Seed URLs and filters used when creating the data source.
    pub fn default_url_update(&self) -> UrlUpdate {
        UrlUpdate {
            url_list: self.crawler.seed_urls.clone(),
            exclusion_filters: self.crawler.exclusion_filters.clone(),
            inclusion_filters: self.crawler.inclusion_filters.clone(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.aws.region.trim().is_empty() {
            bail!("aws.region must not be empty");
        }
        if self.query.timeout_secs == 0 {
            bail!("query.timeout_secs must be > 0");
        }
        if self.query.default_model.trim().is_empty() {
            bail!("query.default_model must not be empty");
        }
        if !(1..=300).contains(&self.crawler.rate_limit) {
            bail!("crawler.rate_limit must be in [1, 300]");
        }
        if self.server.rate_limit == 0 {
            bail!("server.rate_limit must be > 0");
        }
        if self.server.burst_limit == 0 {
            bail!("server.burst_limit must be > 0");
        }
        IpAllowList::from_cidrs(&self.server.allowed_ips).context("invalid server.allowed_ips")?;
        Ok(())
    }
}

fn required<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str> {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => bail!("{} is not configured", key),
    }
}

/// Load configuration from `path` (if given), apply environment overrides,
/// and validate the result.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            parse_config(&content)?
        }
        None => Config::default(),
    };

    config.apply_env_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// Parse and validate TOML configuration text without consulting the
/// environment.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.aws.region, "us-east-1");
        assert_eq!(cfg.query.default_model, "anthropic.claude-instant-v1");
        assert_eq!(cfg.query.timeout_secs, 29);
        assert_eq!(cfg.crawler.rate_limit, 50);
        assert_eq!(cfg.crawler.scope, CrawlScope::HostOnly);
        assert_eq!(cfg.server.rate_limit, 100);
        assert_eq!(cfg.server.burst_limit, 200);
        assert_eq!(cfg.ingest.schedule_secs, 86_400);
        assert!(cfg.knowledge_base_id().is_err());
    }

    #[test]
    fn test_full_file() {
        let cfg = parse_config(
            r#"
[aws]
region = "eu-west-1"

[aws.endpoints]
agent_runtime = "http://localhost:4566"

[knowledge_base]
id = "KB1"
data_source_id = "DS1"
s3_data_source_id = "DS2"

[crawler]
rate_limit = 20
scope = "SUBDOMAINS"
seed_urls = ["https://docs.example.com"]

[server]
bind = "0.0.0.0:9000"
allowed_ips = ["10.0.0.0/8"]
"#,
        )
        .unwrap();
        assert_eq!(cfg.aws.region, "eu-west-1");
        assert_eq!(cfg.aws.endpoints.agent_runtime.as_deref(), Some("http://localhost:4566"));
        assert_eq!(cfg.knowledge_base_id().unwrap(), "KB1");
        assert_eq!(cfg.data_source_id().unwrap(), "DS1");
        assert_eq!(cfg.s3_data_source_id().unwrap(), "DS2");
        assert_eq!(cfg.crawler_settings().scope, CrawlScope::Subdomains);
        assert_eq!(cfg.crawler_settings().rate_limit, 20);
        assert_eq!(cfg.default_url_update().url_list, vec!["https://docs.example.com"]);
        // Filters not given fall back to the defaults.
        assert_eq!(cfg.crawler.exclusion_filters, vec![".*plants.*"]);
    }

    #[test]
    fn test_env_overrides_file() {
        let mut cfg = parse_config("[knowledge_base]\nid = \"KB-file\"\n").unwrap();
        cfg.apply_env_overrides(|key| match key {
            "KNOWLEDGE_BASE_ID" => Some("KB-env".to_string()),
            "AWS_REGION" => Some("ap-southeast-2".to_string()),
            "DATA_SOURCE_ID" => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(cfg.knowledge_base_id().unwrap(), "KB-env");
        assert_eq!(cfg.aws.region, "ap-southeast-2");
        assert!(cfg.data_source_id().is_err());
    }

    #[test]
    fn test_rejects_bad_rate_limit() {
        let err = parse_config("[crawler]\nrate_limit = 0\n").unwrap_err();
        assert!(err.to_string().contains("crawler.rate_limit"));
    }

    #[test]
    fn test_rejects_bad_cidr() {
        assert!(parse_config("[server]\nallowed_ips = [\"10.0.0.0/40\"]\n").is_err());
    }

    #[test]
    fn test_example_config_parses() {
        let cfg = parse_config(include_str!("../config/kbg.example.toml")).unwrap();
        assert_eq!(cfg.knowledge_base_id().unwrap(), "KB12345678");
        assert_eq!(cfg.server.allowed_ips.len(), 2);
    }

    #[test]
    fn test_rejects_unknown_scope() {
        assert!(parse_config("[crawler]\nscope = \"EVERYWHERE\"\n").is_err());
    }
}
