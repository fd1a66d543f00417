//! Normalized events and their dated occurrences.

use std::fmt;
use std::sync::Arc;

use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;

use crate::store::SourceId;

/// How prominently an event is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Size {
    Small,
    Big,
}

impl Size {
    pub fn is_priority(self) -> bool {
        self == Size::Big
    }
}

/// A validated, normalized event record. Shared by all of its occurrences.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub title: String,
    pub location: String,
    pub city_code: String,
    /// Display name from the city registry
    pub city: String,
    pub url: Option<String>,
    pub price: Option<String>,
    /// `H:MM` or `HH:MM`
    pub hour: String,
    pub image: Option<String>,
    pub schedule: Option<String>,
    pub size: Size,
    pub hidden: bool,
    pub summary_skip: bool,
    pub slots: Vec<String>,
    /// Markdown body, rendered elsewhere
    pub description: Option<String>,
    pub source: SourceId,
}

/// One concrete dated instance of an event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Occurrence {
    pub event: Arc<Event>,
    pub date: DateTime<Tz>,
}

impl Occurrence {
    pub fn new(event: Arc<Event>, date: DateTime<Tz>) -> Self {
        Occurrence { event, date }
    }

    /// Fan a normalized event out into one occurrence per date.
    pub fn fan_out(event: Event, dates: &[DateTime<Tz>]) -> Vec<Occurrence> {
        let event = Arc::new(event);
        dates
            .iter()
            .map(|date| Occurrence::new(Arc::clone(&event), *date))
            .collect()
    }

    /// `Mar 1`
    pub fn nice_date(&self) -> String {
        self.date.format("%b %-d").to_string()
    }

    /// `19:30, Mar 1`
    pub fn time_and_date(&self) -> String {
        format!("{}, {}", self.event.hour, self.nice_date())
    }

    /// `2024-03-01`
    pub fn iso_date(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    /// Host name of the event URL, or the raw URL if it does not parse.
    pub fn domain(&self) -> Option<String> {
        let raw = self.event.url.as_deref()?;
        match url::Url::parse(raw) {
            Ok(parsed) => Some(parsed.host_str().unwrap_or(raw).to_string()),
            Err(_) => Some(raw.to_string()),
        }
    }
}

impl fmt::Display for Occurrence {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.event.title, self.time_and_date())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::Berlin;

    pub(crate) fn make_test_event(title: &str) -> Event {
        Event {
            title: title.to_string(),
            location: "Plaza".to_string(),
            city_code: "zrh".to_string(),
            city: "Zürich".to_string(),
            url: Some("https://www.example.org/salsa?x=1".to_string()),
            price: Some("20 CHF".to_string()),
            hour: "19:30".to_string(),
            image: None,
            schedule: None,
            size: Size::Big,
            hidden: false,
            summary_skip: false,
            slots: vec![],
            description: None,
            source: SourceId::new(format!("{}.md", title.to_lowercase().replace(' ', "-"))),
        }
    }

    #[test]
    fn test_fan_out_shares_event() {
        let dates = vec![
            Berlin.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            Berlin.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        ];
        let occurrences = Occurrence::fan_out(make_test_event("Salsa Night"), &dates);

        assert_eq!(occurrences.len(), 2);
        assert!(Arc::ptr_eq(&occurrences[0].event, &occurrences[1].event));
        assert_ne!(occurrences[0].date, occurrences[1].date);
    }

    #[test]
    fn test_presentation_helpers() {
        let date = Berlin.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let occurrence = Occurrence::new(Arc::new(make_test_event("Salsa Night")), date);

        assert_eq!(occurrence.nice_date(), "Mar 1");
        assert_eq!(occurrence.time_and_date(), "19:30, Mar 1");
        assert_eq!(occurrence.iso_date(), "2024-03-01");
        assert_eq!(occurrence.domain().as_deref(), Some("www.example.org"));
    }
}
