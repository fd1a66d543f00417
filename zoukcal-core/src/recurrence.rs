//! Date specifications and their expansion into concrete dates.
//!
//! A record carries exactly one of: a single date, an explicit date list, or an
//! iCalendar recurrence rule (`DTSTART` + `RRULE` lines). Rules are fully
//! materialized up front, so they must terminate (COUNT or UNTIL).

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Tz;
use rrule::RRuleSet;

use crate::error::{ZoukError, ZoukResult};
use crate::record::RawRecord;

/// The date part of a record, exactly one form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateSpec {
    Single(String),
    List(Vec<String>),
    Rule(String),
}

impl DateSpec {
    /// Pick the one date form present on `raw`.
    pub fn from_raw(raw: &RawRecord) -> ZoukResult<Self> {
        let present: Vec<&str> = [
            raw.date.as_ref().map(|_| "date"),
            raw.dates.as_ref().map(|_| "dates"),
            raw.rrule.as_ref().map(|_| "rrule"),
        ]
        .into_iter()
        .flatten()
        .collect();

        if present.len() > 1 {
            return Err(ZoukError::invalid(
                "date",
                present.join(", "),
                "only one of date, dates and rrule may be given",
            ));
        }

        if let Some(date) = &raw.date {
            Ok(DateSpec::Single(date.clone()))
        } else if let Some(dates) = &raw.dates {
            Ok(DateSpec::List(dates.clone()))
        } else if let Some(rule) = &raw.rrule {
            Ok(DateSpec::Rule(rule.clone()))
        } else {
            Err(ZoukError::invalid("date", "", "no date"))
        }
    }
}

/// Turns date specifications into dates in one civil time zone.
#[derive(Debug, Clone)]
pub struct Expander {
    tz: Tz,
    limit: u16,
}

impl Expander {
    pub fn new(tz: Tz, limit: u16) -> Self {
        Expander { tz, limit }
    }

    /// Ordered, deduplicated dates for `spec`. Never empty.
    pub fn expand(&self, spec: &DateSpec) -> ZoukResult<Vec<DateTime<Tz>>> {
        let dates = match spec {
            DateSpec::Single(s) => vec![self.parse_date(s)?],
            DateSpec::List(list) => list
                .iter()
                .map(|s| self.parse_date(s))
                .collect::<ZoukResult<Vec<_>>>()?,
            DateSpec::Rule(rule) => self.materialize(rule)?,
        };

        let mut unique: Vec<DateTime<Tz>> = Vec::with_capacity(dates.len());
        for date in dates {
            if !unique.contains(&date) {
                unique.push(date);
            }
        }

        if unique.is_empty() {
            return Err(ZoukError::Recurrence("no dates".to_string()));
        }
        Ok(unique)
    }

    /// Parse `YYYY-MM-DD` as local midnight.
    pub fn parse_date(&self, s: &str) -> ZoukResult<DateTime<Tz>> {
        let s = s.trim();
        let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|e| ZoukError::invalid("date", s, format!("expected YYYY-MM-DD: {e}")))?;

        self.tz
            .from_local_datetime(&date.and_time(NaiveTime::MIN))
            .earliest()
            .ok_or_else(|| ZoukError::invalid("date", s, format!("does not exist in {}", self.tz)))
    }

    fn materialize(&self, rule: &str) -> ZoukResult<Vec<DateTime<Tz>>> {
        let anchored = anchor_rule(rule, self.tz);

        let rrule_set: RRuleSet = anchored
            .parse()
            .map_err(|e| ZoukError::Recurrence(format!("Failed to parse rule {rule:?}: {e}")))?;

        // One past the limit tells a rule that stops at the limit from one that keeps going.
        let result = rrule_set.all(self.limit.saturating_add(1));
        if result.dates.len() > usize::from(self.limit) {
            return Err(ZoukError::Recurrence(format!(
                "rule yields more than {} dates; add COUNT or UNTIL",
                self.limit
            )));
        }

        Ok(result
            .dates
            .iter()
            .map(|dt| dt.with_timezone(&self.tz))
            .collect())
    }
}

/// Pin a floating or date-only `DTSTART` to `tz` so expansion does not depend
/// on the host's local zone.
fn anchor_rule(rule: &str, tz: Tz) -> String {
    rule.trim()
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|line| match line.strip_prefix("DTSTART:") {
            Some(value) if !value.ends_with('Z') => {
                let value = if value.len() == 8 {
                    format!("{value}T000000")
                } else {
                    value.to_string()
                };
                format!("DTSTART;TZID={tz}:{value}")
            }
            _ => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use chrono_tz::Europe::Berlin;

    fn expander() -> Expander {
        Expander::new(Berlin, 365)
    }

    #[test]
    fn test_single_date_is_local_midnight() {
        let dates = expander()
            .expand(&DateSpec::Single("2024-03-01".to_string()))
            .unwrap();

        assert_eq!(dates, vec![Berlin.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()]);
    }

    #[test]
    fn test_date_list_keeps_authored_order_and_drops_duplicates() {
        let spec = DateSpec::List(vec![
            "2024-06-01".to_string(),
            "2024-05-01".to_string(),
            "2024-06-01".to_string(),
        ]);
        let dates = expander().expand(&spec).unwrap();

        assert_eq!(dates.len(), 2);
        assert_eq!(dates[0].month(), 6);
        assert_eq!(dates[1].month(), 5);
    }

    #[test]
    fn test_empty_date_list_has_no_dates() {
        let result = expander().expand(&DateSpec::List(vec![]));
        assert!(matches!(result, Err(ZoukError::Recurrence(_))));
    }

    #[test]
    fn test_malformed_date_names_value() {
        let result = expander().expand(&DateSpec::Single("2024-13-01".to_string()));
        match result {
            Err(ZoukError::Validation { field, value, .. }) => {
                assert_eq!(field, "date");
                assert_eq!(value, "2024-13-01");
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_weekly_rule_materializes_all_dates() {
        let rule = "DTSTART:20240507T193000\nRRULE:FREQ=WEEKLY;COUNT=4";
        let dates = expander().expand(&DateSpec::Rule(rule.to_string())).unwrap();

        let expected: Vec<_> = [7, 14, 21, 28]
            .into_iter()
            .map(|d| Berlin.with_ymd_and_hms(2024, 5, d, 19, 30, 0).unwrap())
            .collect();
        assert_eq!(dates, expected);
    }

    #[test]
    fn test_date_only_dtstart_with_until() {
        let rule = "DTSTART:20240501\nRRULE:FREQ=MONTHLY;UNTIL=20240715T000000Z";
        let dates = expander().expand(&DateSpec::Rule(rule.to_string())).unwrap();

        let months: Vec<u32> = dates.iter().map(|d| d.month()).collect();
        assert_eq!(months, vec![5, 6, 7]);
    }

    #[test]
    fn test_open_ended_rule_is_rejected() {
        let rule = "DTSTART:20240501T190000\nRRULE:FREQ=DAILY";
        let result = Expander::new(Berlin, 10).expand(&DateSpec::Rule(rule.to_string()));
        assert!(matches!(result, Err(ZoukError::Recurrence(_))));
    }

    #[test]
    fn test_rule_ending_exactly_at_limit_is_accepted() {
        let rule = "DTSTART:20240501T190000\nRRULE:FREQ=DAILY;COUNT=10";
        let dates = Expander::new(Berlin, 10)
            .expand(&DateSpec::Rule(rule.to_string()))
            .unwrap();
        assert_eq!(dates.len(), 10);
    }

    #[test]
    fn test_rule_one_past_limit_is_rejected() {
        let rule = "DTSTART:20240501T190000\nRRULE:FREQ=DAILY;COUNT=11";
        let result = Expander::new(Berlin, 10).expand(&DateSpec::Rule(rule.to_string()));
        assert!(matches!(result, Err(ZoukError::Recurrence(_))));
    }

    #[test]
    fn test_rule_with_no_dates_is_rejected() {
        let rule = "DTSTART:20240501T190000\nRRULE:FREQ=WEEKLY;UNTIL=20240401T000000Z";
        let result = expander().expand(&DateSpec::Rule(rule.to_string()));
        assert!(matches!(result, Err(ZoukError::Recurrence(_))));
    }

    #[test]
    fn test_two_date_forms_is_validation_error() {
        let raw = RawRecord {
            dates: Some(vec!["2024-05-01".to_string()]),
            rrule: Some("RRULE:FREQ=WEEKLY;COUNT=2".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            DateSpec::from_raw(&raw),
            Err(ZoukError::Validation { field: "date", .. })
        ));
    }

    #[test]
    fn test_missing_date_is_validation_error() {
        assert!(DateSpec::from_raw(&RawRecord::default()).is_err());
    }

    #[test]
    fn test_anchor_rule_keeps_explicit_zones() {
        assert_eq!(
            anchor_rule("DTSTART:20240501T190000Z\nRRULE:FREQ=DAILY;COUNT=2", Berlin),
            "DTSTART:20240501T190000Z\nRRULE:FREQ=DAILY;COUNT=2"
        );
        assert_eq!(
            anchor_rule("  DTSTART:20240501\n  RRULE:FREQ=DAILY;COUNT=2\n", Berlin),
            "DTSTART;TZID=Europe/Berlin:20240501T000000\nRRULE:FREQ=DAILY;COUNT=2"
        );
    }
}
