//! # Request Classifier
//!
//! Maps a request onto one of a fixed set of labels. The label becomes the
//! suffix of every metric name recorded for the request, so the set must stay
//! small no matter what the request path contains.

use std::fmt;
use url::Url;

/// Operational category of a monitored request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    /// Any editing action on an open document.
    Edit,
    /// Opening a document.
    DocLoad,
    /// Every other API request.
    Others,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Edit => "edit",
            Label::DocLoad => "doc-load",
            Label::Others => "others",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// # Request Classifier
///
/// Holds the route prefixes the labels are derived from. Route prefixes are
/// relative to the deployment context path.
#[derive(Debug, Clone)]
pub struct RequestClassifier {
    context_path: String,
    api_root: String,
    edit_route: String,
    doc_load_route: String,
}

impl RequestClassifier {
    pub fn new(
        context_path: impl Into<String>,
        api_root: impl Into<String>,
        edit_route: impl Into<String>,
        doc_load_route: impl Into<String>,
    ) -> Self {
        Self {
            context_path: trim_trailing_slash(context_path.into()),
            api_root: trim_trailing_slash(api_root.into()),
            edit_route: edit_route.into(),
            doc_load_route: doc_load_route.into(),
        }
    }

    pub fn context_path(&self) -> &str {
        &self.context_path
    }

    /// The part of `path` below the API root, if any.
    ///
    /// `/ctx/rest/v1/edit/x` yields `Some("/v1/edit/x")`; `/ctx/rest`,
    /// `/ctx/rest/` and `/ctx/static/app.js` yield `None`.
    pub fn path_info<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path
            .strip_prefix(self.context_path.as_str())?
            .strip_prefix(self.api_root.as_str())?;
        if rest.len() > 1 && rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }

    /// Classify a request from its extra path information, the deployment
    /// context path and the full request URL.
    ///
    /// Returns `None` when there is no path information: such requests are
    /// static traffic and are never monitored. A URL that cannot be parsed
    /// is classified as [`Label::Others`].
    pub fn classify(&self, path_info: Option<&str>, context_path: &str, full_url: &str) -> Option<Label> {
        path_info?;

        let url = match Url::parse(full_url) {
            Ok(url) => url,
            Err(_) => return Some(Label::Others),
        };
        let path = url.path();

        if starts_with_route(path, context_path, &self.edit_route) {
            Some(Label::Edit)
        } else if starts_with_route(path, context_path, &self.doc_load_route) {
            Some(Label::DocLoad)
        } else {
            Some(Label::Others)
        }
    }

    /// Classify a request given its path and its reconstructed URL.
    pub fn classify_request(&self, path: &str, full_url: &str) -> Option<Label> {
        self.classify(self.path_info(path), &self.context_path, full_url)
    }
}

fn starts_with_route(path: &str, context_path: &str, route: &str) -> bool {
    path.strip_prefix(context_path)
        .map_or(false, |rest| rest.starts_with(route))
}

fn trim_trailing_slash(mut value: String) -> String {
    while value.ends_with('/') {
        value.pop();
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> RequestClassifier {
        RequestClassifier::new("/webapp", "/rest", "/rest/v22/edit", "/rest/v22/doc/load")
    }

    #[test]
    fn test_edit_label() {
        let label = classifier().classify(
            Some("edit/doc1/insert"),
            "/webapp",
            "http://localhost/webapp/rest/v22/edit/doc1/insert",
        );
        assert_eq!(label, Some(Label::Edit));
    }

    #[test]
    fn test_doc_load_label() {
        let label = classifier().classify(
            Some("/doc/load/url1"),
            "/webapp",
            "http://localhost/webapp/rest/v22/doc/load/url1",
        );
        assert_eq!(label, Some(Label::DocLoad));
    }

    #[test]
    fn test_static_request_has_no_label() {
        let label = classifier().classify(None, "/webapp", "http://localhost/webapp/static/oxygen.html");
        assert_eq!(label, None);
    }

    #[test]
    fn test_other_api_requests_share_one_label() {
        let label = classifier().classify(
            Some("/v22/plugins/list"),
            "/webapp",
            "http://localhost/webapp/rest/v22/plugins/list?x=1",
        );
        assert_eq!(label, Some(Label::Others));
    }

    #[test]
    fn test_malformed_url_falls_back_to_others() {
        let label = classifier().classify(Some("/v22/edit/doc1"), "/webapp", "not a url");
        assert_eq!(label, Some(Label::Others));
    }

    #[test]
    fn test_path_info_extraction() {
        let classifier = classifier();
        assert_eq!(classifier.path_info("/webapp/rest/v22/edit/d"), Some("/v22/edit/d"));
        assert_eq!(classifier.path_info("/webapp/rest"), None);
        assert_eq!(classifier.path_info("/webapp/rest/"), None);
        assert_eq!(classifier.path_info("/webapp/static/app.js"), None);
        assert_eq!(classifier.path_info("/other/rest/v22/edit"), None);
    }

    #[test]
    fn test_classify_request_end_to_end() {
        let classifier = classifier();
        assert_eq!(
            classifier.classify_request(
                "/webapp/rest/v22/edit/doc1",
                "http://host/webapp/rest/v22/edit/doc1"
            ),
            Some(Label::Edit)
        );
        assert_eq!(
            classifier.classify_request("/webapp/index.html", "http://host/webapp/index.html"),
            None
        );
    }

    #[test]
    fn test_empty_context_path() {
        let classifier = RequestClassifier::new("", "/rest", "/rest/v1/edit", "/rest/v1/doc/load");
        assert_eq!(
            classifier.classify_request("/rest/v1/doc/load/a", "http://h/rest/v1/doc/load/a"),
            Some(Label::DocLoad)
        );
    }
}
