//! Robots.txt scanning and parsing
//!
//! There is no finalized standard for robot exclusion files: the original
//! proposal was never finished as an RFC and search engines have since
//! invented their own extensions. This module implements the original
//! proposal plus the widely deployed extensions: `allow` rules,
//! percent-encoded UTF-8 in paths, and longest-prefix matching.
//!
//! Not implemented: non-group records such as `sitemap`, `crawl-delay`,
//! and wildcards in paths. Unknown fields are reported once and ignored,
//! so extension records do not break parsing.
//!
//! The scanner takes decoded lines as input; decoding the file itself is
//! the caller's job.

use std::collections::HashSet;

use crate::report::Report;
use crate::EscapeError;

/// One allow/disallow rule: `allowed` applies to every path starting with
/// `path_prefix`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RobotsRule {
    pub allowed: bool,
    pub path_prefix: String,
}

impl RobotsRule {
    pub fn new(allowed: bool, path_prefix: impl Into<String>) -> Self {
        Self {
            allowed,
            path_prefix: path_prefix.into(),
        }
    }
}

/// One scanned `field: value` line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RobotsToken {
    pub lineno: usize,
    pub field: String,
    pub value: String,
}

/// A record: a run of non-blank lines.
pub type RobotsRecord = Vec<RobotsToken>;

/// Rules per user agent name (case-folded), in file order.
///
/// File order matters for lookup, so this is an association list rather
/// than a map.
pub type RulesMap = Vec<(String, Vec<RobotsRule>)>;

/// Tokenizes the contents of a robots.txt file into records.
///
/// Blank lines end records; comment-only lines are discarded and do not
/// end records. Each remaining line is split on the first `:` into a
/// case-folded field name and a value; a line lacking `:` is reported and
/// dropped.
pub fn scan_robots_txt<'a>(
    lines: impl IntoIterator<Item = &'a str>,
    report: &mut Report,
) -> Vec<RobotsRecord> {
    let mut records = Vec::new();
    let mut record = RobotsRecord::new();

    for (lineno, line) in lines.into_iter().enumerate() {
        let lineno = lineno + 1;
        let stripped = line.trim_start();
        if stripped.starts_with('#') {
            // Comment-only lines are discarded and do not end records.
            continue;
        }
        if stripped.is_empty() {
            // Empty lines end records.
            if !record.is_empty() {
                records.push(std::mem::take(&mut record));
            }
            continue;
        }
        if stripped.len() != line.len() {
            report.warning(format!("Line {lineno} has whitespace before field"));
        }

        let nocomment = stripped.split('#').next().unwrap_or(stripped);
        match nocomment.split_once(':') {
            Some((field, value)) => record.push(RobotsToken {
                lineno,
                field: field.to_lowercase(),
                value: value.trim().to_string(),
            }),
            None => report.error(format!("Line {lineno} contains no \":\"; ignoring line")),
        }
    }

    if !record.is_empty() {
        records.push(record);
    }
    records
}

/// Parses scanned records into a rules map.
///
/// Consecutive `user-agent` lines share the rules that follow them. A
/// `user-agent` line appearing after rules starts a new record; a user
/// agent that was already addressed in an earlier record is ignored
/// (first occurrence wins). Rules appearing before any `user-agent` line
/// are dropped. All of these problems are reported but none aborts
/// parsing.
pub fn parse_robots_txt(records: &[RobotsRecord], report: &mut Report) -> RulesMap {
    let mut result: RulesMap = Vec::new();
    let mut unknowns: HashSet<String> = HashSet::new();

    for record in records {
        let mut seen_user_agent = false;
        let mut have_rules = false;
        // Indices into `result` of the agents the current rules apply to.
        let mut active: Vec<usize> = Vec::new();

        for token in record {
            match token.field.as_str() {
                "user-agent" => {
                    if have_rules {
                        report.error(format!(
                            "Line {} specifies user agent after rules; assuming new record",
                            token.lineno
                        ));
                        active.clear();
                        have_rules = false;
                    }
                    seen_user_agent = true;
                    let name = token.value.to_lowercase();
                    if result.iter().any(|(existing, _)| *existing == name) {
                        report.error(format!(
                            "Line {} specifies user agent \"{}\", which was already \
                             addressed in an earlier record; ignoring new record",
                            token.lineno, token.value
                        ));
                    } else {
                        result.push((name, Vec::new()));
                        active.push(result.len() - 1);
                    }
                }
                "allow" | "disallow" => {
                    if seen_user_agent {
                        match unescape_path(&token.value) {
                            Ok(path) => {
                                // A directive without a path carries no rule
                                // and does not end the user-agent group.
                                if !path.is_empty() {
                                    have_rules = true;
                                    let allowed = token.field == "allow";
                                    for &index in &active {
                                        result[index].1.push(RobotsRule::new(allowed, &path));
                                    }
                                }
                            }
                            Err(err) => report.error(format!(
                                "Bad escape in {} URL on line {}: {}",
                                token.field, token.lineno, err
                            )),
                        }
                    } else {
                        report.error(format!(
                            "Line {} specifies {} rule without a preceding user agent line; \
                             ignoring line",
                            token.lineno, token.field
                        ));
                    }
                }
                field => {
                    // Unknown fields are allowed for extensions; mention each
                    // field name only once.
                    if unknowns.insert(field.to_string()) {
                        report.info(format!(
                            "Unknown field \"{}\" (line {})",
                            field, token.lineno
                        ));
                    }
                }
            }
        }
    }
    result
}

/// Decodes a percent-encoded URL path.
///
/// Percent escaping can be used for UTF-8 paths; the continuation-byte
/// structure is validated. An encoded path separator (`%2f`) is left
/// escaped so it cannot be mistaken for a real `/`.
pub fn unescape_path(path: &str) -> Result<String, EscapeError> {
    let src = path.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(src.len());
    let mut idx = 0;

    while idx < src.len() {
        if src[idx] != b'%' {
            out.push(src[idx]);
            idx += 1;
            continue;
        }

        let first = parse_escape(src, idx)?;
        idx += 3;

        if first == 0x2F {
            // Path separator should remain escaped.
            out.extend_from_slice(b"%2f");
            continue;
        }
        if first < 0x80 {
            out.push(first);
            continue;
        }
        if !(0xC0..0xF8).contains(&first) {
            return Err(EscapeError::InvalidLeadByte(first));
        }

        let mut sequence = vec![first];
        let mut remaining = match first {
            0xC0..=0xDF => 1,
            0xE0..=0xEF => 2,
            _ => 3,
        };
        while remaining > 0 {
            if idx >= src.len() || src[idx] != b'%' {
                return Err(EscapeError::TruncatedSequence(remaining));
            }
            let value = parse_escape(src, idx)?;
            idx += 3;
            if value & 0xC0 != 0x80 {
                return Err(EscapeError::InvalidContinuationByte(value));
            }
            sequence.push(value);
            remaining -= 1;
        }
        let decoded =
            std::str::from_utf8(&sequence).map_err(|_| EscapeError::InvalidLeadByte(first))?;
        out.extend_from_slice(decoded.as_bytes());
    }

    // Only valid UTF-8 fragments were appended.
    Ok(String::from_utf8(out).expect("unescaped path is valid UTF-8"))
}

/// Parses the two hex digits following the `%` at `src[idx]`.
fn parse_escape(src: &[u8], idx: usize) -> Result<u8, EscapeError> {
    let hex = src
        .get(idx + 1..idx + 3)
        .ok_or(EscapeError::IncompleteEscape)?;
    let hex = std::str::from_utf8(hex).map_err(|_| EscapeError::IncompleteEscape)?;
    u8::from_str_radix(hex, 16).map_err(|_| EscapeError::NonHexDigits(hex.to_string()))
}

/// Looks up the rules that apply to the given user agent.
///
/// Matches case-insensitively on entries whose name starts with the agent
/// name, in file order; falls back to the `*` entry, or no rules at all.
pub fn lookup_robots_rules(rules_map: &RulesMap, user_agent: &str) -> Vec<RobotsRule> {
    let agent = user_agent.to_lowercase();
    for (name, rules) in rules_map {
        if name.starts_with(&agent) {
            return rules.clone();
        }
    }
    rules_map
        .iter()
        .find(|(name, _)| name == "*")
        .map(|(_, rules)| rules.clone())
        .unwrap_or_default()
}

/// Checks whether the given rules allow visiting the given path.
///
/// The draft RFC specifies first-match, but both Google and Bing use the
/// longest (most specific) matching prefix, so sites are written against
/// that behavior and we follow it. The default is allowed.
pub fn path_allowed(path: &str, rules: &[RobotsRule]) -> bool {
    let mut result = true;
    let mut longest = 0;
    for rule in rules {
        if path.starts_with(&rule.path_prefix) && rule.path_prefix.len() > longest {
            result = rule.allowed;
            longest = rule.path_prefix.len();
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    // Modified example from the Internet-Draft.
    const EXAMPLE: &str = "\
User-agent: unhipbot
Disallow: /

User-agent: webcrawler
User-agent: excite      # comment
Disallow:

User-agent: *
Disallow: /org/plans.html
Allow: /org/
Allow: /serv
# Comment-only lines do not end record.
Allow: /~mak
Disallow: /
";

    fn scan(text: &str) -> (Vec<RobotsRecord>, Report) {
        let mut report = Report::new("http://example.com/robots.txt");
        let records = scan_robots_txt(text.lines(), &mut report);
        (records, report)
    }

    fn example_map() -> RulesMap {
        let (records, mut report) = scan(EXAMPLE);
        let map = parse_robots_txt(&records, &mut report);
        assert!(report.ok());
        map
    }

    #[test]
    fn test_scan_empty_inputs() {
        for text in ["", "\n", "\n\n", " \n\t\n", "#comment\n"] {
            let (records, report) = scan(text);
            assert!(records.is_empty(), "scanning {text:?}");
            assert!(report.entries().is_empty());
        }
    }

    #[test]
    fn test_scan_example() {
        let (records, report) = scan(EXAMPLE);
        assert!(report.entries().is_empty());
        assert_eq!(records.len(), 3);
        assert_eq!(
            records[1],
            vec![
                RobotsToken { lineno: 4, field: "user-agent".into(), value: "webcrawler".into() },
                RobotsToken { lineno: 5, field: "user-agent".into(), value: "excite".into() },
                RobotsToken { lineno: 6, field: "disallow".into(), value: String::new() },
            ]
        );
    }

    #[test]
    fn test_scan_warns_about_leading_whitespace() {
        let (records, report) = scan(" User-agent: *\nDisallow: /\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].len(), 2);
        assert!(!report.ok());
        assert!(report.entries()[0].message.contains("whitespace before field"));
    }

    #[test]
    fn test_scan_drops_line_without_colon() {
        let (records, report) = scan("User-agent: *\nFoo\nDisallow: /\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].len(), 2);
        assert!(report.entries()[0].message.contains("no \":\""));
    }

    #[test]
    fn test_parse_example() {
        let map = example_map();
        assert_eq!(
            map,
            vec![
                ("unhipbot".to_string(), vec![RobotsRule::new(false, "/")]),
                ("webcrawler".to_string(), vec![]),
                ("excite".to_string(), vec![]),
                (
                    "*".to_string(),
                    vec![
                        RobotsRule::new(false, "/org/plans.html"),
                        RobotsRule::new(true, "/org/"),
                        RobotsRule::new(true, "/serv"),
                        RobotsRule::new(true, "/~mak"),
                        RobotsRule::new(false, "/"),
                    ]
                ),
            ]
        );
    }

    #[test]
    fn test_parse_unknown_field_reported_once() {
        let (records, _) = scan("User-agent: *\nFoo: bar\nFoo: baz\nDisallow: /\n");
        let mut report = Report::new("x");
        let map = parse_robots_txt(&records, &mut report);
        assert_eq!(map, vec![("*".to_string(), vec![RobotsRule::new(false, "/")])]);
        let mentions = report
            .entries()
            .iter()
            .filter(|e| e.message.contains("Unknown field \"foo\""))
            .count();
        assert_eq!(mentions, 1);
    }

    #[test]
    fn test_parse_user_agent_after_rules_starts_new_record() {
        let (records, _) = scan(
            "User-agent: smith\nDisallow: /m\nUser-agent: bender\nDisallow: /casino\n",
        );
        let mut report = Report::new("x");
        let map = parse_robots_txt(&records, &mut report);
        assert_eq!(
            map,
            vec![
                ("smith".to_string(), vec![RobotsRule::new(false, "/m")]),
                ("bender".to_string(), vec![RobotsRule::new(false, "/casino")]),
            ]
        );
        assert!(report.entries()[0].message.contains("assuming new record"));
    }

    #[test]
    fn test_parse_empty_rule_does_not_start_new_record() {
        // An empty disallow carries no rule, so the two agents still form
        // one group sharing the rules that follow.
        let (records, _) =
            scan("User-agent: smith\nDisallow:\nUser-agent: bender\nDisallow: /casino\n");
        let mut report = Report::new("x");
        let map = parse_robots_txt(&records, &mut report);
        assert_eq!(
            map,
            vec![
                ("smith".to_string(), vec![RobotsRule::new(false, "/casino")]),
                ("bender".to_string(), vec![RobotsRule::new(false, "/casino")]),
            ]
        );
        assert!(report.ok());
    }

    #[test]
    fn test_parse_rules_before_user_agent_dropped() {
        let (records, _) =
            scan("Disallow: /m\nUser-agent: smith\nUser-agent: bender\nDisallow: /casino\n");
        let mut report = Report::new("x");
        let map = parse_robots_txt(&records, &mut report);
        assert_eq!(
            map,
            vec![
                ("smith".to_string(), vec![RobotsRule::new(false, "/casino")]),
                ("bender".to_string(), vec![RobotsRule::new(false, "/casino")]),
            ]
        );
        assert!(report.entries()[0]
            .message
            .contains("without a preceding user agent line"));
    }

    #[test]
    fn test_parse_duplicate_user_agent_ignored() {
        let (records, _) =
            scan("User-agent: smith\nDisallow: /m2\n\nUser-agent: smith\nDisallow: /m3\n");
        let mut report = Report::new("x");
        let map = parse_robots_txt(&records, &mut report);
        assert_eq!(
            map,
            vec![("smith".to_string(), vec![RobotsRule::new(false, "/m2")])]
        );
        assert!(report.entries()[0].message.contains("already addressed"));
    }

    #[test]
    fn test_unescape_valid_paths() {
        assert_eq!(unescape_path("/plain").unwrap(), "/plain");
        assert_eq!(unescape_path("/a%3cd.html").unwrap(), "/a<d.html");
        assert_eq!(unescape_path("/%7Ejoe/").unwrap(), "/~joe/");
        assert_eq!(unescape_path("/%C2%A2").unwrap(), "/\u{a2}");
        assert_eq!(unescape_path("/%e2%82%ac").unwrap(), "/\u{20ac}");
        assert_eq!(unescape_path("/%F0%90%8d%88").unwrap(), "/\u{10348}");
    }

    #[test]
    fn test_unescape_keeps_encoded_slash() {
        assert_eq!(unescape_path("/a%2fb.html").unwrap(), "/a%2fb.html");
        assert_eq!(unescape_path("/a%2Fb.html").unwrap(), "/a%2fb.html");
    }

    #[test]
    fn test_unescape_invalid_paths() {
        assert!(matches!(
            unescape_path("/%"),
            Err(EscapeError::IncompleteEscape)
        ));
        assert!(matches!(
            unescape_path("/%1"),
            Err(EscapeError::IncompleteEscape)
        ));
        assert!(matches!(
            unescape_path("/%1x"),
            Err(EscapeError::NonHexDigits(ref got)) if got == "1x"
        ));
        assert!(matches!(
            unescape_path("/%-3"),
            Err(EscapeError::NonHexDigits(ref got)) if got == "-3"
        ));
        assert!(matches!(
            unescape_path("/%80"),
            Err(EscapeError::InvalidLeadByte(0x80))
        ));
        assert!(matches!(
            unescape_path("/%e2%e3"),
            Err(EscapeError::InvalidContinuationByte(0xE3))
        ));
        assert!(matches!(
            unescape_path("/%e2%82"),
            Err(EscapeError::TruncatedSequence(1))
        ));
        assert!(matches!(
            unescape_path("/%e2%82%a"),
            Err(EscapeError::IncompleteEscape)
        ));
        assert!(matches!(
            unescape_path("/%e2%82ac"),
            Err(EscapeError::TruncatedSequence(1))
        ));
    }

    #[test]
    fn test_bad_escape_drops_rule_but_not_record() {
        let (records, _) = scan("User-agent: *\nDisallow: /%80\nAllow: /good\n");
        let mut report = Report::new("x");
        let map = parse_robots_txt(&records, &mut report);
        assert_eq!(
            map,
            vec![("*".to_string(), vec![RobotsRule::new(true, "/good")])]
        );
        assert!(report.entries()[0].message.contains("Bad escape in disallow URL"));
    }

    #[test]
    fn test_lookup_rules() {
        let map = example_map();
        // Exact match.
        assert_eq!(lookup_robots_rules(&map, "excite"), map[2].1);
        // Prefix match.
        assert_eq!(lookup_robots_rules(&map, "web"), map[1].1);
        // Case-insensitive match.
        assert_eq!(lookup_robots_rules(&map, "UnHipBot"), map[0].1);
        // Default.
        assert_eq!(lookup_robots_rules(&map, "unknown-bot"), map[3].1);
        // No rules at all.
        assert_eq!(lookup_robots_rules(&Vec::new(), "anybot"), Vec::new());
    }

    #[test]
    fn test_path_allowed_longest_prefix_wins() {
        let map = example_map();
        let wildcard = &map[3].1;
        let cases = [
            ("/", false),
            ("/index.html", false),
            ("/server.html", true),
            ("/services/fast.html", true),
            ("/orgo.gif", false),
            ("/org/about.html", true),
            ("/org/plans.html", false),
            ("/~jim/jim.html", false),
            ("/~mak/mak.html", true),
        ];
        for (path, expected) in cases {
            assert_eq!(path_allowed(path, wildcard), expected, "path {path}");
            // Empty rules allow everything; a bare disallow-all denies it.
            assert!(path_allowed(path, &map[2].1));
            assert!(!path_allowed(path, &map[0].1));
        }
    }
}
