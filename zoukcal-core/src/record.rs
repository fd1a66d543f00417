//! Event records as authored: front matter plus an optional markdown body.

use serde::{Deserialize, Deserializer};

use crate::error::{ZoukError, ZoukResult};

/// Legacy marker that kept an event out of the monthly summary.
pub const SUMMARY_SKIP_MARKER: &str = "#SUMMARY_SKIP";

const SEPARATOR: &str = "---";

/// Front matter fields exactly as written by the author.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawRecord {
    pub title: Option<String>,
    pub location: Option<String>,
    pub city: Option<String>,
    #[serde(rename = "URL", alias = "url")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    pub price: Option<String>,
    #[serde(rename = "time", default, deserialize_with = "scalar_string")]
    pub hour: Option<String>,
    pub image: Option<String>,

    // Date specification, at most one of these
    pub date: Option<String>,
    pub dates: Option<Vec<String>>,
    pub rrule: Option<String>,

    /// Custom schedule label ("every Tuesday"), replaces the date in summaries.
    pub schedule: Option<String>,
    pub size: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub summary_skip: bool,
    #[serde(default)]
    pub slots: Vec<String>,
}

/// A record split into its typed front matter and free-text body.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecord {
    pub raw: RawRecord,
    pub body: Option<String>,
}

/// Accept YAML numbers where we want text (`price: 20`, `time: 1930`).
fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<serde_yaml::Value>::deserialize(deserializer)? {
        None | Some(serde_yaml::Value::Null) => Ok(None),
        Some(serde_yaml::Value::String(s)) => Ok(Some(s)),
        Some(serde_yaml::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected a string or number, got {other:?}"
        ))),
    }
}

/// Split `content` at the `---` separator line and decode the front matter.
///
/// A leading `---` fence is tolerated; any further separator is an error.
pub fn parse_record(content: &str) -> ZoukResult<ParsedRecord> {
    let content = content.replace("\r\n", "\n");
    let mut lines: Vec<&str> = content.lines().collect();

    let first = lines.iter().position(|l| !l.trim().is_empty());
    if let Some(i) = first {
        if lines[i].trim_end() == SEPARATOR {
            lines.drain(..=i);
        }
    }

    let separators: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| l.trim_end() == SEPARATOR)
        .map(|(i, _)| i)
        .collect();

    let (front, body) = match separators.as_slice() {
        [] => (lines.join("\n"), None),
        [at] => {
            let body = lines[at + 1..].join("\n").trim().to_string();
            (lines[..*at].join("\n"), Some(body).filter(|b| !b.is_empty()))
        }
        _ => {
            return Err(ZoukError::Parse(format!(
                "expected at most one '{SEPARATOR}' separator, found {}",
                separators.len()
            )));
        }
    };

    let raw = if front.trim().is_empty() {
        RawRecord::default()
    } else {
        serde_yaml::from_str(&front)
            .map_err(|e| ZoukError::Parse(format!("bad front matter: {e}")))?
    };

    Ok(ParsedRecord { raw, body })
}

impl ParsedRecord {
    /// Title and description, taking the title from a leading `# heading` when
    /// the front matter has none.
    pub fn title_and_description(&self) -> (Option<String>, Option<String>) {
        let Some(body) = self.body.as_deref() else {
            return (self.raw.title.clone(), None);
        };

        if self.raw.title.is_some() {
            return (self.raw.title.clone(), Some(body.to_string()));
        }

        let mut lines = body.lines();
        match lines.next().and_then(heading) {
            Some(title) => {
                let rest = lines.collect::<Vec<_>>().join("\n").trim().to_string();
                (Some(title.to_string()), Some(rest).filter(|r| !r.is_empty()))
            }
            None => (None, Some(body.to_string())),
        }
    }
}

fn heading(line: &str) -> Option<&str> {
    line.strip_prefix("# ").map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_front_matter_only() {
        let record = parse_record("title: Salsa Night\nlocation: Plaza\ndate: 2024-03-01\n").unwrap();

        assert_eq!(record.raw.title.as_deref(), Some("Salsa Night"));
        assert_eq!(record.raw.date.as_deref(), Some("2024-03-01"));
        assert_eq!(record.body, None);
    }

    #[test]
    fn test_parse_front_matter_and_body() {
        let content = "location: Plaza\r\ntime: \"20:00\"\r\n---\r\n# Bachata Night\r\n\r\nBring shoes.\r\n";
        let record = parse_record(content).unwrap();

        assert_eq!(record.raw.hour.as_deref(), Some("20:00"));
        assert_eq!(record.body.as_deref(), Some("# Bachata Night\n\nBring shoes."));

        let (title, description) = record.title_and_description();
        assert_eq!(title.as_deref(), Some("Bachata Night"));
        assert_eq!(description.as_deref(), Some("Bring shoes."));
    }

    #[test]
    fn test_leading_fence_is_tolerated() {
        let record = parse_record("---\ntitle: Social\n---\nSome text").unwrap();
        assert_eq!(record.raw.title.as_deref(), Some("Social"));
        assert_eq!(record.body.as_deref(), Some("Some text"));
    }

    #[test]
    fn test_two_separators_is_parse_error() {
        let result = parse_record("title: A\n---\nbody\n---\nmore");
        assert!(matches!(result, Err(ZoukError::Parse(_))));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let result = parse_record("title: A\nlocaton: typo\n");
        match result {
            Err(ZoukError::Parse(msg)) => assert!(msg.contains("locaton"), "{msg}"),
            other => panic!("Expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_numeric_price_is_text() {
        let record = parse_record("price: 20\nURL: example.org\n").unwrap();
        assert_eq!(record.raw.price.as_deref(), Some("20"));
        assert_eq!(record.raw.url.as_deref(), Some("example.org"));
    }

    #[test]
    fn test_date_list_and_flags() {
        let record =
            parse_record("dates: [2024-05-01, 2024-06-01]\nhidden: true\nslots: [\"20:00 class\"]\n").unwrap();
        assert_eq!(
            record.raw.dates,
            Some(vec!["2024-05-01".to_string(), "2024-06-01".to_string()])
        );
        assert!(record.raw.hidden);
        assert_eq!(record.raw.slots, vec!["20:00 class".to_string()]);
    }

    #[test]
    fn test_front_matter_title_wins_over_heading() {
        let record = parse_record("title: Given\n---\n# Heading\ntext").unwrap();
        let (title, description) = record.title_and_description();
        assert_eq!(title.as_deref(), Some("Given"));
        assert_eq!(description.as_deref(), Some("# Heading\ntext"));
    }
}
