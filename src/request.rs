//! Canonical resource requests
//!
//! A [`Request`] is the unit of work for the crawler: a page URL plus the
//! query arguments, stored in a canonical (sorted) form so that two URLs
//! that differ only in parameter order are the same request. The full URL
//! including the query is produced by the `Display` implementation.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use url::form_urlencoded;
use url::Url;

use crate::RequestError;

/// A resource request consisting of a page URL plus query arguments.
#[derive(Clone, Debug)]
pub struct Request {
    page_url: String,
    query: Vec<(String, String)>,
    maybe_bad: bool,
}

impl Request {
    /// Creates a request from a page URL (without query) and query pairs.
    ///
    /// The pairs are stored sorted, so the order in which they are passed
    /// does not matter for equality or hashing.
    pub fn new(page_url: impl Into<String>, query: Vec<(String, String)>) -> Self {
        let mut query = query;
        query.sort();
        Self {
            page_url: page_url.into(),
            query,
            maybe_bad: false,
        }
    }

    /// Creates a speculative request: one synthesized by the crawler itself
    /// rather than found on a page. A client error (HTTP 400) in response
    /// to a speculative request is not reported as an application defect.
    pub fn speculative(page_url: impl Into<String>, query: Vec<(String, String)>) -> Self {
        let mut request = Self::new(page_url, query);
        request.maybe_bad = true;
        request
    }

    /// Creates a request from a full URL.
    ///
    /// The query string is split on `&`, each segment on the first `=`, and
    /// both halves are percent-decoded with `+` treated as a space. Fails
    /// with [`RequestError::InvalidQuery`] if a segment lacks `=`: such a
    /// URL may be valid, but it does not correspond to
    /// `application/x-www-form-urlencoded`, which is what a typical web
    /// framework expects to receive.
    pub fn from_url(url: &str) -> Result<Self, RequestError> {
        let mut parsed = Url::parse(url)?;

        let query = match parsed.query() {
            None | Some("") => Vec::new(),
            Some(query_str) => {
                for part in query_str.split('&') {
                    if !part.contains('=') {
                        return Err(RequestError::InvalidQuery {
                            url: url.to_string(),
                            part: part.to_string(),
                        });
                    }
                }
                form_urlencoded::parse(query_str.as_bytes())
                    .map(|(key, value)| (key.into_owned(), value.into_owned()))
                    .collect()
            }
        };

        parsed.set_query(None);
        parsed.set_fragment(None);
        Ok(Self::new(parsed.to_string(), query))
    }

    /// URL without the query.
    pub fn page_url(&self) -> &str {
        &self.page_url
    }

    /// The query part of the URL, as a sorted sequence of key-value pairs.
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// `true` iff this request is speculative.
    pub fn maybe_bad(&self) -> bool {
        self.maybe_bad
    }
}

// Equality, ordering and hashing are defined over the page URL and the
// sorted query only; the speculative flag does not affect identity.

impl PartialEq for Request {
    fn eq(&self, other: &Self) -> bool {
        self.page_url == other.page_url && self.query == other.query
    }
}

impl Eq for Request {}

impl PartialOrd for Request {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Request {
    fn cmp(&self, other: &Self) -> Ordering {
        self.page_url
            .cmp(&other.page_url)
            .then_with(|| self.query.cmp(&other.query))
    }
}

impl Hash for Request {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.page_url.hash(state);
        self.query.hash(state);
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.query.is_empty() {
            write!(f, "{}", self.page_url)
        } else {
            let encoded = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(self.query.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                .finish();
            write!(f, "{}?{}", self.page_url, encoded)
        }
    }
}
