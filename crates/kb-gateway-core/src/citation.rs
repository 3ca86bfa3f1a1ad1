//! Citation resolution.
//!
//! A retrieve-and-generate response may carry many citations, each with
//! many retrieved references, and each reference location is polymorphic
//! (object storage, web page, or something else). The gateway surfaces a
//! single [`Citation`] resolved from the **first** reference of the
//! **first** citation; later citations are ignored.

use crate::generate::{CitationEntry, ReferenceLocation};

/// The source backing a generated answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Citation {
    None,
    /// Storage object URI, e.g. `s3://docs/policy.pdf`.
    Object(String),
    /// Web page URL.
    Web(String),
}

impl Citation {
    /// The address as a plain string, `None` when there is no citation.
    pub fn into_string(self) -> Option<String> {
        match self {
            Citation::None => None,
            Citation::Object(s) | Citation::Web(s) => Some(s),
        }
    }
}

/// Resolve the citation to surface from a response's citation list.
pub fn resolve_citation(citations: &[CitationEntry]) -> Citation {
    citations
        .first()
        .and_then(|c| c.retrieved_references.first())
        .and_then(|r| r.location.as_ref())
        .map(resolve_location)
        .unwrap_or(Citation::None)
}

fn resolve_location(location: &ReferenceLocation) -> Citation {
    let object = || {
        location
            .s3_location
            .as_ref()
            .and_then(|l| l.uri.clone())
            .map(Citation::Object)
    };
    let web = || {
        location
            .web_location
            .as_ref()
            .and_then(|l| l.url.clone())
            .map(Citation::Web)
    };

    let resolved = match location.kind.as_deref() {
        Some("S3") => object(),
        Some("WEB") => web(),
        Some(_) => None,
        // Untagged: whichever address is present.
        None => object().or_else(web),
    };
    resolved.unwrap_or(Citation::None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::RetrieveAndGenerateResponse;

    fn parse(json: &str) -> RetrieveAndGenerateResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_s3_reference_yields_object_uri() {
        let resp = parse(
            r#"{"output":{"text":"a"},"citations":[{"retrievedReferences":[
                {"location":{"type":"S3","s3Location":{"uri":"s3://docs/policy.pdf"}}}]}]}"#,
        );
        assert_eq!(
            resolve_citation(&resp.citations),
            Citation::Object("s3://docs/policy.pdf".to_string())
        );
    }

    #[test]
    fn test_web_reference_yields_url() {
        let resp = parse(
            r#"{"citations":[{"retrievedReferences":[
                {"location":{"type":"WEB","webLocation":{"url":"https://example.com/policy"}}}]}]}"#,
        );
        assert_eq!(
            resolve_citation(&resp.citations),
            Citation::Web("https://example.com/policy".to_string())
        );
    }

    #[test]
    fn test_no_citations_is_none() {
        let resp = parse(r#"{"output":{"text":"a"},"citations":[]}"#);
        assert_eq!(resolve_citation(&resp.citations), Citation::None);
    }

    #[test]
    fn test_first_citation_without_references_is_none() {
        // Only the first citation is consulted, even if a later one has a reference.
        let resp = parse(
            r#"{"citations":[{"retrievedReferences":[]},{"retrievedReferences":[
                {"location":{"type":"WEB","webLocation":{"url":"https://later.example.com"}}}]}]}"#,
        );
        assert_eq!(resolve_citation(&resp.citations), Citation::None);
    }

    #[test]
    fn test_only_first_reference_is_used() {
        let resp = parse(
            r#"{"citations":[{"retrievedReferences":[
                {"location":{"type":"WEB","webLocation":{"url":"https://first.example.com"}}},
                {"location":{"type":"S3","s3Location":{"uri":"s3://b/second"}}}]}]}"#,
        );
        assert_eq!(
            resolve_citation(&resp.citations),
            Citation::Web("https://first.example.com".to_string())
        );
    }

    #[test]
    fn test_unknown_location_type_is_none() {
        let resp = parse(
            r#"{"citations":[{"retrievedReferences":[
                {"location":{"type":"CONFLUENCE","s3Location":{"uri":"s3://b/k"}}}]}]}"#,
        );
        assert_eq!(resolve_citation(&resp.citations), Citation::None);
    }

    #[test]
    fn test_untagged_location_falls_back_to_present_field() {
        let resp = parse(
            r#"{"citations":[{"retrievedReferences":[
                {"location":{"webLocation":{"url":"https://example.com"}}}]}]}"#,
        );
        assert_eq!(
            resolve_citation(&resp.citations).into_string(),
            Some("https://example.com".to_string())
        );
    }

    #[test]
    fn test_tag_without_address_is_none() {
        let resp = parse(r#"{"citations":[{"retrievedReferences":[{"location":{"type":"S3"}}]}]}"#);
        assert_eq!(resolve_citation(&resp.citations), Citation::None);
    }
}
