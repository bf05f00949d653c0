//! Checking documents and finding links
//!
//! The [`PageChecker`] fetches one request at a time, checks what came
//! back for problems and extracts the referrers (redirects, links and
//! forms) that tell the spider where to go next.

mod forms;

use std::collections::BTreeMap;

use scraper::{Html, Selector};
use url::Url;

use crate::fetch::decode::{decode_and_report, encoding_from_bom};
use crate::fetch::{split_content_type, FetchedResource, Fetcher};
use crate::plugin::PluginCollection;
use crate::referrer::{LinkSet, Referrer};
use crate::report::{Checked, Report};
use crate::request::Request;

/// The types of documents that we tell the server we accept.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Accept {
    /// Accept both HTML and XHTML.
    Any,
    /// Accept only HTML.
    Html,
}

impl Accept {
    /// The HTTP Accept header value sent with page requests.
    ///
    /// XHTML is preferred over HTML because it is stricter, which gives
    /// the checks more to work with.
    fn header(self) -> &'static str {
        match self {
            Accept::Any => "text/html; q=0.8, application/xhtml+xml; q=1.0",
            Accept::Html => "text/html; q=1.0",
        }
    }
}

/// Strips the XML declaration from the start of the given text, if there
/// is one.
fn strip_xml_decl(text: &str) -> &str {
    if text.starts_with("<?xml") {
        if let Some(end) = text.find("?>") {
            return &text[end + 2..];
        }
    }
    text
}

/// Looks for an XML declaration with an `encoding` attribute at the start
/// of the given text and returns the attribute value, lower case.
fn encoding_from_xml_decl(text: &str) -> Option<String> {
    if !text.starts_with("<?xml") {
        return None;
    }
    let decl = &text[5..text.find("?>")?];

    let mut rest = decl;
    while let Some(assign) = rest.find('=') {
        let name = rest[..assign].trim();
        let after = rest[assign + 1..].trim_start();
        let quote = after.chars().next()?;
        if quote != '"' && quote != '\'' {
            return None;
        }
        let value_and_rest = &after[1..];
        let close = value_and_rest.find(quote)?;
        if name == "encoding" {
            return Some(value_and_rest[..close].to_lowercase());
        }
        rest = &value_and_rest[close + 1..];
    }
    None
}

/// Decodes the first chunk of a document leniently, so that it can be
/// searched for encoding clues before the real decode happens.
fn sniff_head(content: &[u8], bom_encoding: Option<&str>) -> String {
    let head = &content[..content.len().min(1024)];
    match bom_encoding {
        Some("utf-16") => {
            let be = head.starts_with(&[0xFE, 0xFF]);
            let units: Vec<u16> = head
                .chunks_exact(2)
                .map(|pair| {
                    let pair = [pair[0], pair[1]];
                    if be {
                        u16::from_be_bytes(pair)
                    } else {
                        u16::from_le_bytes(pair)
                    }
                })
                .collect();
            String::from_utf16_lossy(&units)
        }
        Some("utf-32") => {
            let be = head.starts_with(&[0x00, 0x00, 0xFE, 0xFF]);
            head.chunks_exact(4)
                .map(|quad| {
                    let quad = [quad[0], quad[1], quad[2], quad[3]];
                    let value = if be {
                        u32::from_be_bytes(quad)
                    } else {
                        u32::from_le_bytes(quad)
                    };
                    char::from_u32(value).unwrap_or(char::REPLACEMENT_CHARACTER)
                })
                .collect()
        }
        _ => String::from_utf8_lossy(head).into_owned(),
    }
}

/// Elements whose attribute can link to another document.
const LINK_ATTRIBUTES: [(&str, &str); 6] = [
    ("a", "href"),
    ("link", "href"),
    ("img", "src"),
    ("script", "src"),
    // SVG 2 image and script elements use a native 'href' attribute.
    ("image", "href"),
    ("script", "href"),
];

fn find_urls(document: &Html) -> Vec<String> {
    let any_element = Selector::parse("*").expect("selector literal");
    let mut urls = Vec::new();
    for element in document.select(&any_element) {
        let value = element.value();
        for (tag, attr) in LINK_ATTRIBUTES {
            if value.name() == tag {
                if let Some(url) = value.attr(attr) {
                    urls.push(url.to_string());
                }
            }
        }
        // SVG 1.1 links through XLink.
        if let Some(url) = value.attr("xlink:href") {
            urls.push(url.to_string());
        }
    }
    urls
}

/// Turns the URLs found in a document into link set referrers, one per
/// page, resolved against the document's own URL.
fn find_link_referrers(document: &Html, tree_url: &str, report: &mut Report) -> Vec<Referrer> {
    let base = match Url::parse(tree_url) {
        Ok(base) => base,
        Err(err) => {
            report.warning(format!("{err}"));
            return Vec::new();
        }
    };

    let mut links: BTreeMap<String, LinkSet> = BTreeMap::new();
    for mut url in find_urls(document) {
        tracing::debug!("Found URL: {url}");
        if url.starts_with('?') {
            // A bare query applies to the document's own path.
            url = format!("{}{}", base.path(), url);
        }
        let joined = match base.join(&url) {
            Ok(joined) => joined.to_string(),
            Err(err) => {
                report.warning(format!("{err}"));
                continue;
            }
        };
        match Request::from_url(&joined) {
            Ok(request) => links
                .entry(request.page_url().to_string())
                .or_insert_with(|| LinkSet::new(request.page_url()))
                .add(request),
            Err(err) => report.warning(err.to_string()),
        }
    }
    links.into_values().map(Referrer::Links).collect()
}

/// Retrieves pages, checks their contents and finds references to other
/// pages.
pub struct PageChecker {
    accept: Accept,
    fetcher: Fetcher,
    plugins: PluginCollection,
}

impl PageChecker {
    pub fn new(accept: Accept, fetcher: Fetcher, plugins: PluginCollection) -> Self {
        Self {
            accept,
            fetcher,
            plugins,
        }
    }

    pub fn plugins(&mut self) -> &mut PluginCollection {
        &mut self.plugins
    }

    /// Checks a single request and returns the report plus the referrers
    /// that were discovered.
    pub async fn check(&mut self, req: &Request) -> (Report, Vec<Referrer>) {
        let req_url = req.to_string();
        tracing::info!("Checking page: {req_url}");

        let (mut report, resource) = self
            .fetcher
            .load_page(&req_url, req.maybe_bad(), self.accept.header())
            .await;

        let mut referrers = Vec::new();
        if let Some(resource) = &resource {
            if (300..400).contains(&resource.status) {
                if let Some(location) = resource.redirect_location.clone() {
                    if location != req_url {
                        if !location.starts_with("file:") {
                            report.info(format!("Redirected to: {location}"));
                        }
                        match Request::from_url(&location) {
                            Ok(request) => referrers.push(Referrer::Redirect(request)),
                            Err(err) => report.warning(err.to_string()),
                        }
                    }
                }
            }
        }

        match resource {
            Some(resource) if resource.body.is_some() => {
                self.check_response(&req_url, &mut report, &resource, &mut referrers);
            }
            _ => {
                report.info("Could not get any content to check");
                report.checked = Checked::NoContent;
            }
        }

        (report, referrers)
    }

    fn check_response(
        &mut self,
        req_url: &str,
        report: &mut Report,
        resource: &FetchedResource,
        referrers: &mut Vec<Referrer>,
    ) {
        let body = resource.body.as_deref().unwrap_or_default();

        if resource.status != 200 {
            // Web servers produce their own error and redirect notices,
            // which only reflect on the application under test if it
            // generated them itself.
            report.info(format!(
                "Skipping content check because of HTTP status {}",
                resource.status
            ));
            report.checked = Checked::HttpStatusSkip;
            return;
        }

        let Some(content_type_header) = resource.content_type.clone() else {
            report.error("Missing Content-Type header");
            return;
        };
        let (mut content_type, http_encoding) = split_content_type(&content_type_header);
        let mut content_type_header = content_type_header;

        let is_html = content_type == "text/html" || content_type == "application/xhtml+xml";
        let mut is_xml = content_type.ends_with("/xml") || content_type.ends_with("+xml");

        // Speculatively decode the first chunk, so we can look inside the
        // document for encoding clues.
        let bom_encoding = encoding_from_bom(body);
        let content_head = sniff_head(body, bom_encoding);

        if !is_xml && content_head.starts_with("<?xml") {
            is_xml = true;
            if req_url.starts_with("file:") {
                // The content type of a local file was guessed from its
                // name, so a mismatch is ours to correct, not the user's.
                if content_type == "text/html" {
                    content_type = "application/xhtml+xml".to_string();
                }
            } else {
                report.warning(format!(
                    "Document is served with content type \"{content_type}\" \
                     but starts with an XML declaration"
                ));
            }
        }

        if is_html && is_xml && self.accept == Accept::Html {
            report.warning(
                "HTML document is serialized as XML, while the HTTP Accept \
                 header did not include \"application/xhtml+xml\"",
            );
        }

        if is_xml || content_type.starts_with("text/") {
            // This looks like a text document, now figure out the encoding.
            // W3C recommends giving the BOM, if present, precedence over
            // the HTTP header.
            let decl_encoding = encoding_from_xml_decl(&content_head);
            let options = [
                (bom_encoding, "Byte Order Mark"),
                (decl_encoding.as_deref(), "XML declaration"),
                (http_encoding.as_deref(), "HTTP header"),
            ];
            match decode_and_report(body, &options, report) {
                Err(err) => report.error(format!("Failed to decode contents: {err}")),
                Ok((content, used_encoding)) => {
                    if req_url.starts_with("file:") {
                        // Construct a header that is likely more accurate.
                        content_type_header = format!("{content_type}; charset={used_encoding}");
                    }

                    if is_html || is_xml {
                        // The parser recovers from errors, so even a
                        // broken document yields links to follow.
                        let document = Html::parse_document(strip_xml_decl(&content));
                        if is_xml {
                            for error in &document.errors {
                                report.error(error.to_string());
                            }
                            check_xhtml_namespace(&document, &content_type, report);
                        }
                        referrers.extend(find_link_referrers(&document, req_url, report));
                        if is_html {
                            if let Ok(base) = Url::parse(req_url) {
                                referrers.extend(
                                    forms::find_forms(&document, &base)
                                        .into_iter()
                                        .map(Referrer::Form),
                                );
                            }
                        }
                    }
                    report.checked = Checked::Checked;
                }
            }
        }

        self.plugins
            .resource_loaded(body, &content_type_header, report);
    }
}

/// An XHTML document must put its root element in the XHTML namespace.
fn check_xhtml_namespace(document: &Html, content_type: &str, report: &mut Report) {
    if content_type != "application/xhtml+xml" {
        return;
    }
    let xmlns = document.root_element().value().attr("xmlns");
    if xmlns != Some("http://www.w3.org/1999/xhtml") {
        report.error("The root element does not use the XHTML namespace.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_headers() {
        assert!(Accept::Any.header().contains("application/xhtml+xml"));
        assert!(!Accept::Html.header().contains("application/xhtml+xml"));
    }

    #[test]
    fn test_strip_xml_decl() {
        assert_eq!(
            strip_xml_decl("<?xml version=\"1.0\"?><root/>"),
            "<root/>"
        );
        assert_eq!(strip_xml_decl("<root/>"), "<root/>");
        assert_eq!(strip_xml_decl("<?xml unterminated"), "<?xml unterminated");
    }

    #[test]
    fn test_encoding_from_xml_decl() {
        assert_eq!(
            encoding_from_xml_decl("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"),
            Some("utf-8".to_string())
        );
        assert_eq!(
            encoding_from_xml_decl("<?xml version='1.0' encoding='Latin-1'?>"),
            Some("latin-1".to_string())
        );
        assert_eq!(encoding_from_xml_decl("<?xml version=\"1.0\"?>"), None);
        assert_eq!(encoding_from_xml_decl("<html>"), None);
    }

    #[test]
    fn test_sniff_head_utf16() {
        let bytes = b"\xFF\xFE<\x00?\x00x\x00m\x00l\x00";
        assert!(sniff_head(bytes, Some("utf-16")).contains("<?xml"));
    }

    #[test]
    fn test_find_urls_in_document() {
        let document = Html::parse_document(
            r#"<html><body>
                 <a href="one.html">one</a>
                 <img src="pic.png">
                 <script src="app.js"></script>
                 <link href="style.css">
                 <p href="not-a-link.html">text</p>
               </body></html>"#,
        );
        let urls = find_urls(&document);
        assert_eq!(urls.len(), 4);
        assert!(urls.contains(&"one.html".to_string()));
        assert!(urls.contains(&"pic.png".to_string()));
        assert!(!urls.contains(&"not-a-link.html".to_string()));
    }

    #[test]
    fn test_link_referrers_group_by_page() {
        let document = Html::parse_document(
            r#"<a href="page?a=1">x</a>
               <a href="page?a=2">y</a>
               <a href="other.html">z</a>"#,
        );
        let mut report = Report::new("http://example.com/index.html");
        let referrers =
            find_link_referrers(&document, "http://example.com/index.html", &mut report);
        assert_eq!(referrers.len(), 2);
        assert!(report.ok());
        let pages: Vec<&str> = referrers.iter().map(Referrer::page_url).collect();
        assert_eq!(
            pages,
            vec!["http://example.com/other.html", "http://example.com/page"]
        );
    }

    #[test]
    fn test_bare_query_link_points_at_own_path() {
        let document = Html::parse_document(r#"<a href="?lang=en">english</a>"#);
        let mut report = Report::new("http://example.com/dir/doc");
        let referrers = find_link_referrers(&document, "http://example.com/dir/doc", &mut report);
        assert_eq!(referrers.len(), 1);
        assert_eq!(referrers[0].page_url(), "http://example.com/dir/doc");
        let requests = referrers[0].requests();
        assert_eq!(
            requests[0].query(),
            &[("lang".to_string(), "en".to_string())]
        );
    }

    #[test]
    fn test_invalid_link_query_logged_not_fatal() {
        let document = Html::parse_document(
            r#"<a href="page?broken">bad</a>
               <a href="good.html">good</a>"#,
        );
        let mut report = Report::new("http://example.com/");
        let referrers = find_link_referrers(&document, "http://example.com/", &mut report);
        assert_eq!(referrers.len(), 1);
        assert!(!report.ok());
        assert!(report.entries()[0].message.contains("invalid part"));
    }

    #[test]
    fn test_xhtml_namespace_check() {
        let good = Html::parse_document(
            r#"<html xmlns="http://www.w3.org/1999/xhtml"><body/></html>"#,
        );
        let mut report = Report::new("x");
        check_xhtml_namespace(&good, "application/xhtml+xml", &mut report);
        assert!(report.ok());

        let bad = Html::parse_document(r#"<html><body/></html>"#);
        check_xhtml_namespace(&bad, "application/xhtml+xml", &mut report);
        assert!(!report.ok());
    }
}
