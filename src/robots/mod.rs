//! Robot exclusion ("robots.txt") support
//!
//! [`parser`] implements the file format; [`robots_rules_for`] fetches
//! and parses the robots.txt that governs a crawl and extracts the rules
//! addressed to us.

pub mod parser;

use url::Url;

use crate::fetch::{Fetcher, USER_AGENT_PREFIX};
use crate::report::{Checked, Report};

pub use parser::{
    lookup_robots_rules, parse_robots_txt, path_allowed, scan_robots_txt, RobotsRule,
};

/// Fetches the robots.txt governing `base_url` and returns the rules that
/// apply to us, plus a report on the file if there was one to check.
///
/// For HTTP the file lives at the server root; for a local tree it is
/// looked up next to the start document instead, since there is no server
/// root to speak of. A missing file is not an error and yields no report,
/// just an unrestricted crawl. A file that cannot be fetched or decoded
/// for any other reason also yields no rules, but does yield a report
/// describing the problem.
pub async fn robots_rules_for(
    fetcher: &Fetcher,
    base_url: &str,
) -> (Vec<RobotsRule>, Option<Report>) {
    let robots_path = if base_url.starts_with("file:") {
        "robots.txt"
    } else {
        "/robots.txt"
    };
    let robots_url = match Url::parse(base_url).and_then(|base| base.join(robots_path)) {
        Ok(url) => url.to_string(),
        Err(err) => {
            let mut report = Report::new(base_url);
            report.error(format!("Cannot determine robots.txt location: {err}"));
            return (Vec::new(), Some(report));
        }
    };

    tracing::info!("fetching \"robots.txt\"...");
    let (mut report, resource, lines) = fetcher.load_text(&robots_url).await;
    let Some(lines) = lines else {
        if resource.map(|resource| resource.status) == Some(404) {
            // It is not an error if "robots.txt" does not exist.
            tracing::info!("no \"robots.txt\" was found");
            return (Vec::new(), None);
        }
        return (Vec::new(), Some(report));
    };

    let records = scan_robots_txt(lines.iter().map(String::as_str), &mut report);
    let rules_map = parse_robots_txt(&records, &mut report);
    let rules = lookup_robots_rules(&rules_map, USER_AGENT_PREFIX);
    report.checked = Checked::Checked;
    (rules, Some(report))
}
