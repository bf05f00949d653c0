//! Diagnostics gathering and presentation
//!
//! Check results for a single request are collected in a [`Report`]. If a
//! page could not be fetched at all, the problems are collected in a
//! [`FetchFailure`], which is a report that can also be used as an error
//! value. A [`Scribe`] collects the reports of a whole crawl and renders a
//! combined summary.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

/// Importance of one logged message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// The content check status of a document.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Checked {
    /// The content has not been checked yet.
    NotChecked,
    /// No content was available for checking.
    NoContent,
    /// Content check was skipped because of the HTTP status code.
    HttpStatusSkip,
    /// The content has been checked.
    Checked,
}

/// One logged message.
#[derive(Clone, Debug)]
pub struct Entry {
    pub severity: Severity,
    pub message: String,
}

/// Gathers check results for the document produced by one request.
#[derive(Clone, Debug)]
pub struct Report {
    url: String,
    entries: Vec<Entry>,
    ok: bool,
    /// The content check status of the document. Initialized to
    /// [`Checked::NotChecked`]; a checker sets it once it has run.
    pub checked: Checked,
}

impl Report {
    /// Creates a report that will collect results for the document at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            entries: Vec::new(),
            ok: true,
            checked: Checked::NotChecked,
        }
    }

    /// The request URL this report applies to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// `true` iff nothing above info level was logged.
    pub fn ok(&self) -> bool {
        self.ok
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Logs a message at the given severity.
    ///
    /// Messages above info level mark the report as not ok. Everything is
    /// mirrored to the tracing subscriber for live output.
    pub fn log(&mut self, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Info => tracing::info!(url = %self.url, "{message}"),
            Severity::Warning => tracing::warn!(url = %self.url, "{message}"),
            Severity::Error => tracing::error!(url = %self.url, "{message}"),
        }
        if severity > Severity::Info {
            self.ok = false;
        }
        self.entries.push(Entry { severity, message });
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.log(Severity::Info, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.log(Severity::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.log(Severity::Error, message);
    }
}

/// A report for a resource that could not be fetched.
///
/// Carries the failing URL and a human-readable cause, and can be passed
/// around both as a report and as an error value.
#[derive(Debug)]
pub struct FetchFailure {
    pub report: Report,
    message: String,
}

impl FetchFailure {
    pub fn new(url: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut report = Report::new(url);
        report.error(message.clone());
        Self { report, message }
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to fetch \"{}\": {}", self.report.url(), self.message)
    }
}

impl Error for FetchFailure {}

/// Collects the reports of one crawl and renders a combined summary.
pub struct Scribe {
    base_url: String,
    reports: Vec<Report>,
}

impl Scribe {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            reports: Vec::new(),
        }
    }

    /// Adds the report for one checked request.
    pub fn add_report(&mut self, report: Report) {
        self.reports.push(report);
    }

    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    /// Renders the collected reports as a simple HTML document, grouped by
    /// page URL.
    pub fn present(&self) -> String {
        let mut by_page: BTreeMap<&str, Vec<&Report>> = BTreeMap::new();
        for report in &self.reports {
            let page = report.url().split('?').next().unwrap_or(report.url());
            by_page.entry(page).or_default().push(report);
        }

        let failed = self.reports.iter().filter(|r| !r.ok()).count();
        let mut out = String::new();
        out.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
        out.push_str(&format!(
            "<title>Check results for {}</title>\n",
            escape(&self.base_url)
        ));
        out.push_str("</head>\n<body>\n");
        out.push_str(&format!(
            "<h1>Check results for {}</h1>\n<p>{} requests checked, {} with problems</p>\n",
            escape(&self.base_url),
            self.reports.len(),
            failed
        ));
        for (page, reports) in &by_page {
            out.push_str(&format!("<h2>{}</h2>\n", escape(page)));
            for report in reports {
                out.push_str(&format!(
                    "<h3>{} &mdash; {}</h3>\n",
                    escape(report.url()),
                    if report.ok() { "ok" } else { "problems found" }
                ));
                if !report.entries().is_empty() {
                    out.push_str("<ul>\n");
                    for entry in report.entries() {
                        out.push_str(&format!(
                            "<li class=\"{:?}\">{}</li>\n",
                            entry.severity,
                            escape(&entry.message)
                        ));
                    }
                    out.push_str("</ul>\n");
                }
            }
        }
        out.push_str("</body>\n</html>\n");
        out
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
