//! Resource loading
//!
//! [`Fetcher::load_page`] fetches arbitrary resources as bytes, while
//! [`Fetcher::load_text`] fetches and decodes plain text documents.
//! `file:` URLs are served with web-server semantics so local site trees
//! can be checked before deployment.
//!
//! Redirects are not followed transparently: the crawler wants to check
//! both ends of a redirect, so a 3xx response is returned to the caller
//! as a non-error outcome carrying the target location.

pub mod decode;
mod file;

use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE, LOCATION, RETRY_AFTER};
use reqwest::redirect::Policy;
use reqwest::StatusCode;
use url::Url;

use crate::report::{FetchFailure, Report};

pub use decode::{decode_and_report, encoding_from_bom, try_decode};

/// The first word of our user agent string, used to find the rules that
/// apply to us in robots.txt files.
pub const USER_AGENT_PREFIX: &str = "SiteCheck";

/// Full user agent string sent with every request.
pub const USER_AGENT: &str = concat!("SiteCheck/", env!("CARGO_PKG_VERSION"));

/// How often to retry a request that got a 503 "service unavailable"
/// response before giving up.
const SERVICE_RETRY_LIMIT: u32 = 25;

/// Seconds to wait before retrying when the server did not send a usable
/// `Retry-After` value.
const DEFAULT_RETRY_DELAY: u64 = 5;

/// How many redirects [`Fetcher::load_text`] follows before giving up.
const REDIRECT_LIMIT: u32 = 10;

/// A response, or what could be salvaged of one.
///
/// Unlike a raw HTTP response this is a plain value: the body has been
/// read in full (or failed to) and a redirect target has been resolved to
/// an absolute URL.
#[derive(Clone, Debug)]
pub struct FetchedResource {
    /// The URL that was requested.
    pub url: String,
    /// HTTP status code, or the emulated one for `file:` URLs.
    pub status: u16,
    /// Absolute target URL of a 3xx response.
    pub redirect_location: Option<String>,
    /// Raw value of the Content-Type header, if any.
    pub content_type: Option<String>,
    /// The response body, or `None` if reading it failed.
    pub body: Option<Vec<u8>>,
}

/// Splits a Content-Type header value into the media type and the value
/// of its `charset` parameter, both lower case.
pub fn split_content_type(value: &str) -> (String, Option<String>) {
    let mut parts = value.split(';');
    let media_type = parts.next().unwrap_or("").trim().to_lowercase();
    let charset = parts.filter_map(|part| part.split_once('=')).find_map(|(name, value)| {
        if name.trim().eq_ignore_ascii_case("charset") {
            Some(value.trim().trim_matches('"').to_lowercase())
        } else {
            None
        }
    });
    (media_type, charset)
}

/// Splits text into lines, accepting DOS, Mac and Unix line endings.
fn split_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\n' => lines.push(std::mem::take(&mut current)),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                lines.push(std::mem::take(&mut current));
            }
            ch => current.push(ch),
        }
    }
    lines.push(current);
    lines
}

/// Issues HTTP GET requests and emulates them for `file:` URLs.
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            // Redirects are reported back to the caller, not followed.
            .redirect(Policy::none())
            .gzip(true)
            .brotli(true)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }

    /// Loads the contents of a resource via HTTP GET.
    ///
    /// The report may already have messages logged to it. The resource is
    /// `None` only if no response was received at all; an error status
    /// still produces a resource, with the problem logged in the report.
    ///
    /// If `ignore_client_error` is set, an HTTP 400 response is not
    /// reported as an error. This avoids false positives on speculative
    /// requests, where 400 can be the correct response.
    pub async fn load_page(
        &self,
        url: &str,
        ignore_client_error: bool,
        accept_header: &str,
    ) -> (Report, Option<FetchedResource>) {
        if url.starts_with("file:") {
            return file::load_file(url);
        }

        let mut retries = 0;
        loop {
            let response = match self
                .client
                .get(url)
                .header(ACCEPT, accept_header)
                .send()
                .await
            {
                Ok(response) => response,
                Err(err) => {
                    let failure = FetchFailure::new(url, err.to_string());
                    return (failure.report, None);
                }
            };

            let status = response.status();
            if status == StatusCode::SERVICE_UNAVAILABLE && retries < SERVICE_RETRY_LIMIT {
                retries += 1;
                let seconds = retry_delay(&response);
                tracing::info!(url, "Server not ready yet, trying again in {seconds} seconds");
                tokio::time::sleep(Duration::from_secs(seconds)).await;
                continue;
            }

            let mut report = Report::new(url);
            let redirect_location = if status.is_redirection() {
                resolve_location(url, &response)
            } else {
                None
            };
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);

            let tolerated = status.is_success()
                || status.is_redirection()
                || (status == StatusCode::BAD_REQUEST && ignore_client_error);
            if !tolerated {
                report.error(format!(
                    "HTTP error {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("unknown status")
                ));
            }

            let body = match response.bytes().await {
                Ok(bytes) => Some(bytes.to_vec()),
                Err(err) => {
                    report.error(format!("Failed to read contents: {err}"));
                    None
                }
            };

            let resource = FetchedResource {
                url: url.to_string(),
                status: status.as_u16(),
                redirect_location,
                content_type,
                body,
            };
            return (report, Some(resource));
        }
    }

    /// Loads and decodes a text document, following redirects.
    ///
    /// Unlike [`Fetcher::load_page`] this follows redirects, because the
    /// caller wants the document itself rather than a crawl step. The
    /// content is decoded using the BOM and HTTP header hints and split
    /// into lines.
    pub async fn load_text(
        &self,
        url: &str,
    ) -> (Report, Option<FetchedResource>, Option<Vec<String>>) {
        let mut url = url.to_string();
        let mut redirects = 0;
        let (mut report, resource) = loop {
            let (report, resource) = self.load_page(&url, false, "text/plain").await;
            let Some(resource) = resource else {
                return (report, None, None);
            };
            match resource.status {
                200 => break (report, resource),
                301 | 302 | 303 | 307 | 308 => {
                    if let Some(location) = resource.redirect_location.clone() {
                        redirects += 1;
                        if redirects <= REDIRECT_LIMIT {
                            url = location;
                            continue;
                        }
                        let mut report = report;
                        report.warning("Redirect limit exceeded");
                        return (report, Some(resource), None);
                    }
                    return (report, Some(resource), None);
                }
                _ => return (report, Some(resource), None),
            }
        };

        let Some(body) = resource.body.clone() else {
            return (report, Some(resource), None);
        };
        let bom_encoding = encoding_from_bom(&body);
        let http_encoding = resource
            .content_type
            .as_deref()
            .and_then(|value| split_content_type(value).1);
        let options = [
            (bom_encoding, "Byte Order Mark"),
            (http_encoding.as_deref(), "HTTP header"),
        ];
        match decode_and_report(&body, &options, &mut report) {
            Ok((text, _)) => {
                let lines = split_lines(&text);
                (report, Some(resource), Some(lines))
            }
            Err(err) => {
                report.error(format!("Failed to decode text document: {err}"));
                (report, Some(resource), None)
            }
        }
    }
}

fn retry_delay(response: &reqwest::Response) -> u64 {
    match response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
    {
        Some(value) => match value.trim().parse() {
            Ok(seconds) => seconds,
            Err(_) => {
                // TODO: The HTTP spec also allows a date string here.
                tracing::warn!("Parsing of \"Retry-After\" dates is not yet implemented");
                DEFAULT_RETRY_DELAY
            }
        },
        None => DEFAULT_RETRY_DELAY,
    }
}

/// Resolves the Location header of a redirect against the request URL.
fn resolve_location(url: &str, response: &reqwest::Response) -> Option<String> {
    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    match Url::parse(url).and_then(|base| base.join(location)) {
        Ok(target) => Some(target.to_string()),
        Err(_) => Some(location.to_string()),
    }
}
