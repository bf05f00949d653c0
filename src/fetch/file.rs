//! Fetching `file:` URLs
//!
//! Local files are served the way a web server would serve them, so that
//! a site can be checked straight from a build tree before deployment:
//! a missing file becomes a 404 response, a directory redirects to the
//! slash-terminated URL and a slash-terminated URL serves the
//! `index.html` beneath it. Queries and fragments are dropped.

use std::path::Path;

use percent_encoding::percent_decode_str;
use url::Url;

use super::FetchedResource;
use crate::report::Report;

/// Guesses a media type from the file name extension.
fn guess_content_type(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?;
    match extension.to_lowercase().as_str() {
        "html" | "htm" => Some("text/html"),
        "xhtml" => Some("application/xhtml+xml"),
        "xml" => Some("text/xml"),
        "txt" => Some("text/plain"),
        "css" => Some("text/css"),
        "js" => Some("application/javascript"),
        "json" => Some("application/json"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "svg" => Some("image/svg+xml"),
        "ico" => Some("image/x-icon"),
        "pdf" => Some("application/pdf"),
        _ => None,
    }
}

/// Loads the resource behind a `file:` URL with web-server semantics.
pub(super) fn load_file(url: &str) -> (Report, Option<FetchedResource>) {
    let mut report = Report::new(url);

    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(err) => {
            report.error(format!("Bad file URL: {err}"));
            return (report, None);
        }
    };
    let path = percent_decode_str(parsed.path())
        .decode_utf8_lossy()
        .into_owned();

    load_path(url, &parsed, Path::new(&path), report)
}

fn load_path(
    url: &str,
    parsed: &Url,
    path: &Path,
    mut report: Report,
) -> (Report, Option<FetchedResource>) {
    if path.is_dir() {
        if parsed.path().ends_with('/') {
            return load_path(url, parsed, &path.join("index.html"), report);
        }
        // Redirect to add a trailing slash, like a web server would.
        let mut target = parsed.clone();
        target.set_query(None);
        target.set_fragment(None);
        target.set_path(&format!("{}/", parsed.path()));
        let resource = FetchedResource {
            url: url.to_string(),
            status: 301,
            redirect_location: Some(target.to_string()),
            content_type: Some("text/plain".to_string()),
            body: Some(Vec::new()),
        };
        return (report, Some(resource));
    }

    match std::fs::read(path) {
        Ok(body) => {
            let resource = FetchedResource {
                url: url.to_string(),
                status: 200,
                redirect_location: None,
                content_type: guess_content_type(path).map(str::to_string),
                body: Some(body),
            };
            (report, Some(resource))
        }
        Err(err) => {
            // Report file-not-found as an HTTP 404 status; other OS errors
            // (permissions and the like) count as fetch failures.
            if err.kind() == std::io::ErrorKind::NotFound {
                report.error(format!("HTTP error 404: {err}"));
                let resource = FetchedResource {
                    url: url.to_string(),
                    status: 404,
                    redirect_location: None,
                    content_type: Some("text/plain".to_string()),
                    body: Some(Vec::new()),
                };
                (report, Some(resource))
            } else {
                report.error(format!("Failed to read contents: {err}"));
                (report, None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_url(path: &Path) -> String {
        Url::from_file_path(path).unwrap().to_string()
    }

    #[test]
    fn test_load_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        std::fs::write(&path, "<html></html>").unwrap();

        let (report, resource) = load_file(&file_url(&path));
        let resource = resource.unwrap();
        assert!(report.ok());
        assert_eq!(resource.status, 200);
        assert_eq!(resource.content_type.as_deref(), Some("text/html"));
        assert_eq!(resource.body.as_deref(), Some("<html></html>".as_bytes()));
    }

    #[test]
    fn test_missing_file_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let url = file_url(&dir.path().join("nothing.html"));

        let (report, resource) = load_file(&url);
        let resource = resource.unwrap();
        assert!(!report.ok());
        assert_eq!(resource.status, 404);
        assert!(report.entries()[0].message.starts_with("HTTP error 404"));
    }

    #[test]
    fn test_directory_redirects_to_slash() {
        let dir = tempfile::tempdir().unwrap();
        let url = file_url(dir.path());
        assert!(!url.ends_with('/'));

        let (report, resource) = load_file(&url);
        let resource = resource.unwrap();
        assert!(report.ok());
        assert_eq!(resource.status, 301);
        assert_eq!(resource.redirect_location.as_deref(), Some(&*format!("{url}/")));
    }

    #[test]
    fn test_directory_with_slash_serves_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "home").unwrap();
        let url = format!("{}/", file_url(dir.path()));

        let (_, resource) = load_file(&url);
        let resource = resource.unwrap();
        assert_eq!(resource.status, 200);
        assert_eq!(resource.body.as_deref(), Some("home".as_bytes()));
    }

    #[test]
    fn test_query_and_fragment_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.txt");
        std::fs::write(&path, "text").unwrap();
        let url = format!("{}?version=2#top", file_url(&path));

        let (_, resource) = load_file(&url);
        assert_eq!(resource.unwrap().status, 200);
    }
}
