//! Detection of XSS-shaped payloads in inbound requests.
//!
//! The lab observes and records suspicious payloads; it never blocks them.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::audit::snippet;

/// Match snippets kept per scan
const MAX_MATCHES: usize = 20;

/// Characters kept of each match snippet
const MATCH_SNIPPET_CHARS: usize = 100;

fn patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            Regex::new(r"(?is)<script\b[^>]*>.*?</script>").expect("Invalid Regex"),
            Regex::new(r#"(?i)\bon\w+\s*=\s*['"]?"#).expect("Invalid Regex"),
            Regex::new(r"(?i)javascript:").expect("Invalid Regex"),
            Regex::new(r"(?i)<img[^>]+src[^>]*onerror").expect("Invalid Regex"),
            Regex::new(r"(?i)\balert\s*\(").expect("Invalid Regex"),
            Regex::new(r"(?i)\beval\s*\(").expect("Invalid Regex"),
        ]
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadScanner;

impl PayloadScanner {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Capped snippets of every pattern hit in the text.
    #[must_use]
    pub fn scan_text(&self, text: &str) -> Vec<String> {
        let mut matches = Vec::new();
        self.collect(text, &mut matches);
        matches
    }

    /// Walk a JSON document and scan every string value. Scanning the
    /// decoded strings (not the raw body) keeps `<script`-style
    /// escapes from slipping past the patterns.
    #[must_use]
    pub fn scan_json(&self, value: &Value) -> Vec<String> {
        let mut matches = Vec::new();
        self.walk(value, &mut matches);
        matches
    }

    fn walk(&self, value: &Value, matches: &mut Vec<String>) {
        if matches.len() >= MAX_MATCHES {
            return;
        }
        match value {
            Value::String(s) => self.collect(s, matches),
            Value::Array(items) => {
                for item in items {
                    self.walk(item, matches);
                }
            }
            Value::Object(map) => {
                for item in map.values() {
                    self.walk(item, matches);
                }
            }
            _ => {}
        }
    }

    fn collect(&self, text: &str, matches: &mut Vec<String>) {
        for pattern in patterns() {
            for hit in pattern.find_iter(text) {
                if matches.len() >= MAX_MATCHES {
                    return;
                }
                matches.push(snippet(hit.as_str(), MATCH_SNIPPET_CHARS));
            }
        }
    }
}

/// Strip control characters and escape HTML-sensitive ones so a payload can
/// be embedded in logs without forging entries or markup.
#[must_use]
pub fn sanitize_for_log(payload: &str) -> String {
    let stripped: String = payload
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    html_escape::encode_safe(&stripped).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_classic_payloads() {
        let scanner = PayloadScanner::new();

        assert!(!scanner.scan_text("<script>alert(1)</script>").is_empty());
        assert!(!scanner.scan_text(r#"<div onclick="steal()">"#).is_empty());
        assert!(!scanner.scan_text("javascript:void(0)").is_empty());
        assert!(!scanner.scan_text("<img src=x onerror=alert(1)>").is_empty());
        assert!(!scanner.scan_text("eval(atob('...'))").is_empty());
    }

    #[test]
    fn clean_text_produces_no_matches() {
        let scanner = PayloadScanner::new();
        assert!(scanner.scan_text("an ordinary comment about scripts").is_empty());
        assert!(scanner.scan_text("evaluation of results").is_empty());
    }

    #[test]
    fn match_count_is_capped() {
        let scanner = PayloadScanner::new();
        let payload = "alert(1) ".repeat(100);
        assert_eq!(scanner.scan_text(&payload).len(), MAX_MATCHES);
    }

    #[test]
    fn match_snippets_are_capped() {
        let scanner = PayloadScanner::new();
        let long = format!("<script>{}</script>", "a".repeat(500));
        let matches = scanner.scan_text(&long);
        assert!(matches[0].len() <= MATCH_SNIPPET_CHARS + "...[truncated]".len());
    }

    #[test]
    fn scans_nested_json_strings() {
        let scanner = PayloadScanner::new();
        let body = json!({
            "name": "ok",
            "nested": { "values": ["fine", "<script>document.cookie</script>"] }
        });
        assert!(!scanner.scan_json(&body).is_empty());
    }

    #[test]
    fn sanitize_strips_control_characters_and_escapes_markup() {
        let out = sanitize_for_log("line1\r\nFAKE ENTRY <b>bold</b>");
        assert!(!out.contains('\n'));
        assert!(!out.contains('\r'));
        assert!(!out.contains('<'));
        assert!(out.contains("&lt;b&gt;"));
    }

    #[test]
    fn sanitize_leaves_plain_text_unchanged() {
        assert_eq!(sanitize_for_log("just a note"), "just a note");
    }
}
