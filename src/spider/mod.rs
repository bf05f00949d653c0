//! Crawl bookkeeping
//!
//! The [`Spider`] tracks which requests have been discovered, which have
//! been checked and the links between them. Call [`Spider::next_request`]
//! to receive requests to check and [`Spider::add_requests`] to feed back
//! the referrers found while checking. At any point the site graph can be
//! queried for the requests that refer to a given request.

use std::collections::{BTreeSet, HashMap, HashSet};

use url::Url;

use crate::fetch::Fetcher;
use crate::referrer::Referrer;
use crate::report::Report;
use crate::request::Request;
use crate::robots::{path_allowed, robots_rules_for, RobotsRule};

/// Maximum number of queries to check with the same page URL.
///
/// For pages with many arguments, the number of possible queries can
/// become so large that it is not feasible to check them all.
const MAX_QUERIES_PER_PAGE: usize = 100;

/// Tracks discovered and checked requests and the links between them.
pub struct Spider {
    base_url: String,
    rules: Vec<RobotsRule>,
    to_check: BTreeSet<Request>,
    checked: HashSet<Request>,
    queries_per_page: HashMap<String, usize>,
    /// Maps source request to the referrers found on it.
    site_graph: HashMap<Request, Vec<Referrer>>,
    /// Maps destination page URL to the requests that refer to it.
    page_referred_from: HashMap<String, BTreeSet<Request>>,
}

impl Spider {
    /// Creates a spider that starts at `first_req` and follows the given
    /// exclusion rules.
    ///
    /// In most cases, use [`spider_for`] instead, which fetches the
    /// exclusion rules from the site.
    pub fn new(first_req: Request, rules: Vec<RobotsRule>) -> Self {
        let base_url = first_req.page_url().to_string();
        let mut to_check = BTreeSet::new();
        to_check.insert(first_req);
        Self {
            base_url,
            rules,
            to_check,
            checked: HashSet::new(),
            queries_per_page: HashMap::new(),
            site_graph: HashMap::new(),
            page_referred_from: HashMap::new(),
        }
    }

    /// Takes the next request to check, marking it as checked.
    ///
    /// Requests come out smallest-first, so a crawl visits them in a
    /// deterministic order regardless of discovery order. It is fine to
    /// add new requests between calls.
    pub fn next_request(&mut self) -> Option<Request> {
        let request = self.to_check.pop_first()?;
        tracing::info!(
            "checked: {}, to check: {}",
            self.checked.len(),
            self.to_check.len() + 1
        );
        self.checked.insert(request.clone());
        Some(request)
    }

    /// Returns `true` iff this spider is allowed to visit the resources
    /// referenced by `referrer`.
    pub fn referrer_allowed(&self, referrer: &Referrer) -> bool {
        let mut path = url_path(referrer.page_url());
        if self.base_url.starts_with("file:") {
            // The crawl is rooted at the directory holding the first page,
            // so a seed of /site/index.html covers the /site/ tree.
            let base_path = url_path(&self.base_url);
            let dir_end = base_path.rfind('/').unwrap_or(0);
            if !path.starts_with(&base_path[..=dir_end]) {
                // Path is outside the tree rooted at our base directory.
                return false;
            }
            // Judge local paths relative to the base directory.
            path = path[dir_end..].to_string();
        }
        path_allowed(&path, &self.rules)
    }

    /// Records the referrers discovered while checking `source_req` and
    /// queues their requests for checking.
    ///
    /// Referrers pointing outside the allowed crawl space are dropped.
    /// Requests seen before are not queued again, and no page URL gets
    /// more than [`MAX_QUERIES_PER_PAGE`] queries queued in total.
    ///
    /// # Panics
    ///
    /// Panics if called twice for the same source request: each request
    /// is checked exactly once, so its outgoing links are recorded
    /// exactly once.
    pub fn add_requests(&mut self, source_req: &Request, referrers: Vec<Referrer>) {
        let allowed: Vec<Referrer> = referrers
            .into_iter()
            .filter(|referrer| self.referrer_allowed(referrer))
            .collect();

        assert!(
            !self.site_graph.contains_key(source_req),
            "links of {source_req} recorded twice"
        );

        for referrer in &allowed {
            let url = referrer.page_url().to_string();
            self.page_referred_from
                .entry(url.clone())
                .or_default()
                .insert(source_req.clone());

            for request in referrer.requests() {
                if self.checked.contains(&request) || self.to_check.contains(&request) {
                    continue;
                }
                let queries = self.queries_per_page.entry(url.clone()).or_insert(0);
                if *queries >= MAX_QUERIES_PER_PAGE {
                    tracing::info!("maximum number of queries reached for \"{url}\"");
                    break;
                }
                *queries += 1;
                self.to_check.insert(request);
            }
        }

        self.site_graph.insert(source_req.clone(), allowed);
    }

    /// Iterates through the requests that refer to the given request.
    pub fn iter_referring_requests<'a>(
        &'a self,
        dest_req: &'a Request,
    ) -> impl Iterator<Item = &'a Request> {
        self.page_referred_from
            .get(dest_req.page_url())
            .into_iter()
            .flatten()
            .filter(move |source_req| {
                self.site_graph
                    .get(source_req)
                    .is_some_and(|referrers| {
                        referrers.iter().any(|referrer| referrer.has_request(dest_req))
                    })
            })
    }
}

fn url_path(url: &str) -> String {
    let path = Url::parse(url).map(|url| url.path().to_string()).unwrap_or_default();
    if path.is_empty() {
        "/".to_string()
    } else {
        path
    }
}

/// Creates a [`Spider`] that starts at the given request, honoring the
/// robots.txt of the server or base directory it points into.
///
/// Also returns the report on the robots.txt check, if there was a file
/// to check.
pub async fn spider_for(first_req: Request, fetcher: &Fetcher) -> (Spider, Option<Report>) {
    let (rules, report) = robots_rules_for(fetcher, first_req.page_url()).await;
    (Spider::new(first_req, rules), report)
}
