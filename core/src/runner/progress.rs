use regex::Regex;
use serde::Deserialize;

use super::events::ProgressUpdate;

pub const PROGRESS_PREFIX: &str = "@@PROGRESS@@";

/// Recognises progress markers in script output:
///
/// - `@@PROGRESS@@ {"percent": 40, "activity": "Scanning", "status": "disk C:"}`
/// - `##progress 40 Scanning disk C:`
///
/// Anything else is ordinary output.
pub struct ProgressParser {
    prefix: &'static str,
    plain: Regex,
}

#[derive(Deserialize)]
struct WireProgress {
    #[serde(default)]
    percent: Option<f64>,
    #[serde(default)]
    activity: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self {
            prefix: PROGRESS_PREFIX,
            plain: Regex::new(r"(?i)^##progress\s+(\d{1,3})(?:\s+(.+))?$")
                .expect("valid progress pattern"),
        }
    }

    pub fn parse_line(&self, line: &str) -> Option<ProgressUpdate> {
        let s = line.trim();
        if let Some(rest) = s.strip_prefix(self.prefix) {
            let json_part = rest.trim();
            if json_part.is_empty() {
                return None;
            }
            let wire: WireProgress = serde_json::from_str(json_part).ok()?;
            return Some(ProgressUpdate {
                percent: wire.percent.map(clamp_percent),
                activity: wire.activity,
                status: wire.status,
            });
        }

        let caps = self.plain.captures(s)?;
        let percent = caps.get(1)?.as_str().parse::<f64>().ok().map(clamp_percent);
        Some(ProgressUpdate {
            percent,
            activity: caps.get(2).map(|m| m.as_str().trim().to_string()),
            status: None,
        })
    }
}

impl Default for ProgressParser {
    fn default() -> Self {
        Self::new()
    }
}

fn clamp_percent(p: f64) -> u8 {
    p.clamp(0.0, 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn json_marker_is_parsed() {
        let p = ProgressParser::new();
        let got = p
            .parse_line(r#"@@PROGRESS@@ {"percent": 42.4, "activity": "Scanning", "status": "C:"}"#)
            .unwrap();
        assert_eq!(
            got,
            ProgressUpdate {
                percent: Some(42),
                activity: Some("Scanning".into()),
                status: Some("C:".into()),
            }
        );
    }

    #[test]
    fn plain_marker_is_parsed_and_clamped() {
        let p = ProgressParser::new();
        let got = p.parse_line("##progress 250 Copying files").unwrap();
        assert_eq!(got.percent, Some(100));
        assert_eq!(got.activity.as_deref(), Some("Copying files"));

        let bare = p.parse_line("##PROGRESS 5").unwrap();
        assert_eq!(bare.percent, Some(5));
        assert_eq!(bare.activity, None);
    }

    #[test]
    fn ordinary_lines_are_ignored() {
        let p = ProgressParser::new();
        assert!(p.parse_line("progress 40").is_none());
        assert!(p.parse_line("@@PROGRESS@@").is_none());
        assert!(p.parse_line("@@PROGRESS@@ not json").is_none());
        assert!(p.parse_line("##progress abc").is_none());
    }
}
