//! Client-side editor for seed URLs and crawl filters.
//!
//! Holds editable rows for the seed URL list and the exclusion and
//! inclusion filter lists. Rows may be blank or malformed while editing;
//! [`UrlSourcesForm::submission`] produces the cleaned [`UrlUpdate`] that
//! is sent as a full replacement.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::datasource::{UrlSettings, UrlUpdate, MAX_SEED_URLS};

static URL_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)^(https?://)?",
        r"((([a-z\d]([a-z\d-]*[a-z\d])*)\.?)+[a-z]{2,}|",
        r"((\d{1,3}\.){3}\d{1,3}))",
        r"(:\d+)?(/[-a-z\d%_.~+]*)*",
        r"(\?[;&a-z\d%_.~+=-]*)?",
        r"(#[-a-z\d_]*)?$",
    ))
    .expect("URL shape pattern is valid")
});

/// Permissive URL-shape check: optional http(s) scheme, a domain or IPv4
/// host, then optional port, path, query, and fragment.
pub fn validate_url(url: &str) -> bool {
    URL_SHAPE.is_match(url)
}

/// Which filter list an edit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Exclusion,
    Inclusion,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlSourcesForm {
    urls: Vec<String>,
    exclusion_filters: Vec<String>,
    inclusion_filters: Vec<String>,
}

impl UrlSourcesForm {
    /// Seed the form from the currently stored settings.
    ///
    /// Stored lists longer than [`MAX_SEED_URLS`] are kept as-is; the cap
    /// only prevents adding rows.
    pub fn from_settings(settings: &UrlSettings) -> Self {
        Self {
            urls: settings.seed_url_list.clone(),
            exclusion_filters: settings.exclusion_filters.clone(),
            inclusion_filters: settings.inclusion_filters.clone(),
        }
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn filters(&self, kind: FilterKind) -> &[String] {
        match kind {
            FilterKind::Exclusion => &self.exclusion_filters,
            FilterKind::Inclusion => &self.inclusion_filters,
        }
    }

    fn filters_mut(&mut self, kind: FilterKind) -> &mut Vec<String> {
        match kind {
            FilterKind::Exclusion => &mut self.exclusion_filters,
            FilterKind::Inclusion => &mut self.inclusion_filters,
        }
    }

    pub fn is_at_capacity(&self) -> bool {
        self.urls.len() >= MAX_SEED_URLS
    }

    /// Append a URL row. Returns `false` (no-op) at capacity.
    pub fn add_url(&mut self, url: impl Into<String>) -> bool {
        if self.is_at_capacity() {
            return false;
        }
        self.urls.push(url.into());
        true
    }

    /// Remove the last URL row, if any.
    pub fn remove_last_url(&mut self) -> Option<String> {
        self.urls.pop()
    }

    /// Replace the URL row at `index`. Returns `false` if out of range.
    pub fn set_url(&mut self, index: usize, url: impl Into<String>) -> bool {
        match self.urls.get_mut(index) {
            Some(slot) => {
                *slot = url.into();
                true
            }
            None => false,
        }
    }

    pub fn add_filter(&mut self, kind: FilterKind, filter: impl Into<String>) {
        self.filters_mut(kind).push(filter.into());
    }

    pub fn remove_last_filter(&mut self, kind: FilterKind) -> Option<String> {
        self.filters_mut(kind).pop()
    }

    pub fn set_filter(&mut self, kind: FilterKind, index: usize, filter: impl Into<String>) -> bool {
        match self.filters_mut(kind).get_mut(index) {
            Some(slot) => {
                *slot = filter.into();
                true
            }
            None => false,
        }
    }

    /// Cleaned full-replacement payload.
    ///
    /// URLs are trimmed, malformed ones are dropped silently, and
    /// duplicates are removed keeping the first occurrence. Filters are
    /// trimmed with blank rows and duplicates removed.
    pub fn submission(&self) -> UrlUpdate {
        UrlUpdate {
            url_list: dedup(self.urls.iter().map(|u| u.trim()).filter(|u| validate_url(u))),
            exclusion_filters: dedup(clean_filters(&self.exclusion_filters)),
            inclusion_filters: dedup(clean_filters(&self.inclusion_filters)),
        }
    }
}

fn clean_filters(filters: &[String]) -> impl Iterator<Item = &str> {
    filters.iter().map(|f| f.trim()).filter(|f| !f.is_empty())
}

fn dedup<'a>(items: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .filter(|item| seen.insert(*item))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url_accepts_common_shapes() {
        assert!(validate_url("https://www.aboutamazon.com/news/amazon-offices"));
        assert!(validate_url("http://example.com:8080/a/b?x=1&y=2#top"));
        assert!(validate_url("example.com"));
        assert!(validate_url("HTTPS://EXAMPLE.COM/Path"));
        assert!(validate_url("192.168.0.1/status"));
    }

    #[test]
    fn test_validate_url_rejects_malformed() {
        assert!(!validate_url(""));
        assert!(!validate_url("not a url"));
        assert!(!validate_url("ftp://example.com"));
        assert!(!validate_url("https://"));
        assert!(!validate_url("https://example.com/has space"));
    }

    #[test]
    fn test_add_url_capped_at_ten() {
        let mut form = UrlSourcesForm::default();
        for i in 0..MAX_SEED_URLS {
            assert!(form.add_url(format!("https://site{}.example.com", i)));
        }
        assert!(form.is_at_capacity());
        assert!(!form.add_url("https://eleventh.example.com"));
        assert_eq!(form.urls().len(), MAX_SEED_URLS);
    }

    #[test]
    fn test_remove_last_url_on_empty_is_noop() {
        let mut form = UrlSourcesForm::default();
        assert_eq!(form.remove_last_url(), None);
        assert!(form.urls().is_empty());
    }

    #[test]
    fn test_filter_edits_touch_only_their_list() {
        let mut form = UrlSourcesForm::default();
        form.add_filter(FilterKind::Exclusion, ".*a.*");
        form.add_filter(FilterKind::Inclusion, ".*b.*");
        form.add_filter(FilterKind::Inclusion, ".*c.*");

        assert_eq!(form.remove_last_filter(FilterKind::Inclusion), Some(".*c.*".to_string()));
        assert_eq!(form.filters(FilterKind::Exclusion), [".*a.*".to_string()]);
        assert_eq!(form.filters(FilterKind::Inclusion), [".*b.*".to_string()]);

        assert!(form.set_filter(FilterKind::Exclusion, 0, ".*z.*"));
        assert!(!form.set_filter(FilterKind::Exclusion, 3, ".*z.*"));
        assert_eq!(form.filters(FilterKind::Exclusion), [".*z.*".to_string()]);
    }

    #[test]
    fn test_submission_filters_and_dedups() {
        let mut form = UrlSourcesForm::from_settings(&UrlSettings {
            seed_url_list: vec!["https://a.example.com".into()],
            exclusion_filters: vec![".*x.*".into()],
            inclusion_filters: vec![],
            web_configured: true,
        });
        form.add_url("  https://b.example.com  ");
        form.add_url("not a url");
        form.add_url("https://a.example.com");
        form.add_url("");
        form.add_filter(FilterKind::Exclusion, "");
        form.add_filter(FilterKind::Exclusion, ".*x.*");
        form.add_filter(FilterKind::Inclusion, " ^https://a.*$ ");

        let update = form.submission();
        assert_eq!(update.url_list, vec!["https://a.example.com", "https://b.example.com"]);
        assert_eq!(update.exclusion_filters, vec![".*x.*"]);
        assert_eq!(update.inclusion_filters, vec!["^https://a.*$"]);
    }

    #[test]
    fn test_set_url_edits_row() {
        let mut form = UrlSourcesForm::default();
        form.add_url("");
        assert!(form.set_url(0, "https://edited.example.com"));
        assert!(!form.set_url(1, "https://nope.example.com"));
        assert_eq!(form.submission().url_list, vec!["https://edited.example.com"]);
    }
}
