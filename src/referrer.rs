//! Sources of requests discovered on a page
//!
//! A [`Referrer`] is any page element that can produce one or more
//! [`Request`]s to check next: an HTTP redirect, a set of hyperlinks to the
//! same page, or an HTML form. The spider records referrers in the site
//! graph so that it can later answer "what links here" queries through
//! [`Referrer::has_request`].

use std::collections::BTreeSet;

use crate::control::Control;
use crate::request::Request;

/// A page element that refers to one or more requests.
#[derive(Clone, Debug)]
pub enum Referrer {
    /// An HTTP redirect; wraps exactly one request.
    Redirect(Request),

    /// Hyperlinks to one page, possibly with differing queries.
    Links(LinkSet),

    /// An HTML form, from which submissions are synthesized.
    Form(Form),
}

impl Referrer {
    /// The URL (without query) of the page this referrer points at.
    pub fn page_url(&self) -> &str {
        match self {
            Referrer::Redirect(request) => request.page_url(),
            Referrer::Links(links) => links.page_url(),
            Referrer::Form(form) => form.submit_url(),
        }
    }

    /// Enumerates the requests this referrer produces.
    ///
    /// Every call produces a fresh, finite sequence in deterministic order.
    pub fn requests(&self) -> Vec<Request> {
        match self {
            Referrer::Redirect(request) => vec![request.clone()],
            Referrer::Links(links) => links.requests().cloned().collect(),
            Referrer::Form(form) => form.requests(),
        }
    }

    /// Returns `true` iff this referrer could produce the given request.
    pub fn has_request(&self, request: &Request) -> bool {
        match self {
            Referrer::Redirect(target) => target == request,
            Referrer::Links(links) => links.has_request(request),
            Referrer::Form(form) => form.has_request(request),
        }
    }
}

/// An accumulating set of requests that share a page URL but may differ
/// in their queries, discovered through hyperlink attributes.
#[derive(Clone, Debug)]
pub struct LinkSet {
    page_url: String,
    requests: BTreeSet<Request>,
}

impl LinkSet {
    /// Creates an empty link set for the given page URL.
    pub fn new(page_url: impl Into<String>) -> Self {
        Self {
            page_url: page_url.into(),
            requests: BTreeSet::new(),
        }
    }

    /// The page URL shared by all requests in this set.
    pub fn page_url(&self) -> &str {
        &self.page_url
    }

    /// Inserts a request; duplicates collapse by request equality.
    pub fn add(&mut self, request: Request) {
        debug_assert_eq!(request.page_url(), self.page_url);
        self.requests.insert(request);
    }

    /// Iterates the collected requests in deterministic order.
    pub fn requests(&self) -> impl Iterator<Item = &Request> {
        self.requests.iter()
    }

    pub fn has_request(&self, request: &Request) -> bool {
        self.requests.contains(request)
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

/// An HTML form, modeled as its submit URL, method and controls in
/// document order.
///
/// Only `method == "get"` forms produce requests; POST submission is not
/// supported and such forms are skipped while parsing the document.
#[derive(Clone, Debug)]
pub struct Form {
    submit_url: String,
    method: String,
    controls: Vec<Control>,
}

impl Form {
    pub fn new(
        submit_url: impl Into<String>,
        method: impl Into<String>,
        controls: Vec<Control>,
    ) -> Self {
        Self {
            submit_url: submit_url.into(),
            method: method.into(),
            controls,
        }
    }

    pub fn submit_url(&self) -> &str {
        &self.submit_url
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn controls(&self) -> &[Control] {
        &self.controls
    }

    /// Synthesizes a bounded sample of form submissions.
    ///
    /// The full Cartesian product of control alternatives is intractable for
    /// multi-control forms, so instead every control is held at its first
    /// alternative while one control at a time is swept through its own
    /// alternatives. This keeps the number of requests linear in the number
    /// of controls and always includes the all-defaults baseline.
    ///
    /// All synthesized requests are speculative: a 400 response to them must
    /// not be reported as an application defect.
    pub fn requests(&self) -> Vec<Request> {
        if self.method != "get" {
            return Vec::new();
        }

        let per_control: Vec<Vec<crate::control::Alternative>> = self
            .controls
            .iter()
            .map(|control| control.alternatives())
            .collect();
        let defaults: Vec<crate::control::Alternative> = per_control
            .iter()
            .map(|alts| alts.first().cloned().unwrap_or(None))
            .collect();

        // A set collapses duplicates (a sweep step that happens to equal the
        // baseline) and keeps the order deterministic.
        let mut requests = BTreeSet::new();
        requests.insert(self.build_request(&defaults, None));
        for (index, alternatives) in per_control.iter().enumerate() {
            for alternative in alternatives.iter().skip(1) {
                requests.insert(self.build_request(&defaults, Some((index, alternative))));
            }
        }
        requests.into_iter().collect()
    }

    fn build_request(
        &self,
        defaults: &[crate::control::Alternative],
        varied: Option<(usize, &crate::control::Alternative)>,
    ) -> Request {
        let mut query = Vec::new();
        for (index, default) in defaults.iter().enumerate() {
            let chosen = match varied {
                Some((varied_index, alternative)) if varied_index == index => alternative,
                _ => default,
            };
            if let Some((name, value)) = chosen {
                query.push((name.clone(), value.clone()));
            }
        }
        Request::speculative(self.submit_url.clone(), query)
    }

    /// Returns `true` iff this form could have produced the given request:
    /// the page URL matches the submit URL and every query pair is accepted
    /// by some control.
    pub fn has_request(&self, request: &Request) -> bool {
        request.page_url() == self.submit_url
            && request.query().iter().all(|(name, value)| {
                self.controls
                    .iter()
                    .any(|control| control.has_alternative(name, value))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(url: &str) -> Request {
        Request::from_url(url).unwrap()
    }

    #[test]
    fn test_redirect_wraps_one_request() {
        let referrer = Referrer::Redirect(req("http://example.com/next"));
        assert_eq!(referrer.page_url(), "http://example.com/next");
        assert_eq!(referrer.requests().len(), 1);
        assert!(referrer.has_request(&req("http://example.com/next")));
        assert!(!referrer.has_request(&req("http://example.com/other")));
    }

    #[test]
    fn test_link_set_collapses_duplicates() {
        let mut links = LinkSet::new("http://example.com/page");
        links.add(req("http://example.com/page?a=1"));
        links.add(req("http://example.com/page?a=1"));
        links.add(req("http://example.com/page?a=2"));
        let referrer = Referrer::Links(links);
        assert_eq!(referrer.requests().len(), 2);
        assert!(referrer.has_request(&req("http://example.com/page?a=2")));
    }

    #[test]
    fn test_post_form_produces_no_requests() {
        let form = Form::new(
            "http://example.com/submit",
            "post",
            vec![Control::TextField { name: "q".into(), value: String::new() }],
        );
        assert!(form.requests().is_empty());
    }

    #[test]
    fn test_form_sampling_is_linear() {
        // Three selects with four options each: the Cartesian product would
        // be 125 submissions, the one-at-a-time sweep far fewer.
        let controls: Vec<Control> = (0..3)
            .map(|i| Control::SelectSingle {
                name: format!("s{i}"),
                options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            })
            .collect();
        let form = Form::new("http://example.com/f", "get", controls);
        let requests = form.requests();
        // Baseline (all omitted) plus 4 non-default alternatives per control.
        assert_eq!(requests.len(), 13);
        assert!(requests.iter().all(Request::maybe_bad));
    }

    #[test]
    fn test_form_includes_baseline() {
        let form = Form::new(
            "http://example.com/f",
            "get",
            vec![
                Control::HiddenInput { name: "page".into(), value: "1".into() },
                Control::Checkbox { name: "flag".into(), value: "on".into() },
            ],
        );
        let requests = form.requests();
        // Baseline: hidden input present, checkbox unchecked.
        let baseline = Request::new(
            "http://example.com/f",
            vec![("page".into(), "1".into())],
        );
        assert!(requests.contains(&baseline));
        // Sweep: checkbox checked.
        let checked = Request::new(
            "http://example.com/f",
            vec![("page".into(), "1".into()), ("flag".into(), "on".into())],
        );
        assert!(requests.contains(&checked));
        assert_eq!(requests.len(), 2);
    }

    #[test]
    fn test_form_has_request_checks_every_pair() {
        let form = Form::new(
            "http://example.com/f",
            "get",
            vec![
                Control::TextField { name: "q".into(), value: String::new() },
                Control::SelectSingle {
                    name: "size".into(),
                    options: vec!["s".into(), "l".into()],
                },
            ],
        );
        // Free text accepts any value for its own name.
        assert!(form.has_request(&Request::new(
            "http://example.com/f",
            vec![("q".into(), "anything".into()), ("size".into(), "l".into())],
        )));
        // Unknown select value is rejected.
        assert!(!form.has_request(&Request::new(
            "http://example.com/f",
            vec![("size".into(), "xl".into())],
        )));
        // Different page is rejected.
        assert!(!form.has_request(&Request::new(
            "http://example.com/other",
            vec![("q".into(), "x".into())],
        )));
    }
}
