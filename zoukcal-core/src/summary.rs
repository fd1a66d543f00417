//! Monthly per-city digests.
//!
//! The scan runs over a [`Listing`], which is chronological by construction.
//! Repeats of the same (title, schedule) within a city and month collapse into
//! one entry that tracks the next instance that has not passed yet.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;
use serde::{Serialize, Serializer};

use crate::event::Occurrence;
use crate::listing::{Listing, month_name};

/// Identity of a logical event within a bucket.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SummaryKey {
    pub title: String,
    /// Custom schedule label, or the formatted date.
    pub schedule: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryEntry {
    pub title: String,
    pub schedule: String,
    pub first_date: DateTime<Tz>,
    pub priority: bool,
    pub image: Option<String>,
}

/// Everything happening in one calendar month, grouped by city display name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthBucket {
    pub year: i32,
    pub month: u32,
    /// `March 2024`
    pub label: String,
    #[serde(serialize_with = "serialize_cities")]
    pub cities: BTreeMap<String, BTreeMap<SummaryKey, SummaryEntry>>,
}

impl MonthBucket {
    fn new(year: i32, month: u32) -> Self {
        MonthBucket {
            year,
            month,
            label: format!("{} {}", month_name(month), year),
            cities: BTreeMap::new(),
        }
    }

    /// Entries for `city`, earliest first.
    pub fn entries(&self, city: &str) -> Vec<&SummaryEntry> {
        let mut entries: Vec<&SummaryEntry> = self
            .cities
            .get(city)
            .map(|m| m.values().collect())
            .unwrap_or_default();
        entries.sort_by_key(|e| e.first_date);
        entries
    }

    pub fn len(&self) -> usize {
        self.cities.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn serialize_cities<S>(
    cities: &BTreeMap<String, BTreeMap<SummaryKey, SummaryEntry>>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    use serde::ser::SerializeMap;

    let mut map = serializer.serialize_map(Some(cities.len()))?;
    for (city, entries) in cities {
        let mut entries: Vec<&SummaryEntry> = entries.values().collect();
        entries.sort_by_key(|e| e.first_date);
        map.serialize_entry(city, &entries)?;
    }
    map.end()
}

/// Fold a listing into month buckets, relative to `now`.
pub fn summarize(listing: &Listing, now: DateTime<Utc>) -> Vec<MonthBucket> {
    let mut buckets = Vec::new();
    let mut current: Option<MonthBucket> = None;

    for occurrence in listing.occurrences() {
        let (year, month) = (occurrence.date.year(), occurrence.date.month());

        let bucket = match current.take() {
            Some(bucket) if (bucket.year, bucket.month) == (year, month) => bucket,
            Some(closed) => {
                buckets.push(closed);
                MonthBucket::new(year, month)
            }
            None => MonthBucket::new(year, month),
        };
        let bucket = current.insert(bucket);

        if occurrence.event.summary_skip {
            continue;
        }

        let today = now.with_timezone(&occurrence.date.timezone()).date_naive();
        let (key, entry) = summary_entry(occurrence);

        bucket
            .cities
            .entry(occurrence.event.city.clone())
            .or_default()
            .entry(key)
            .and_modify(|existing| {
                // Later instance wins only while the kept one has already passed.
                let passed = existing.first_date.date_naive() < today;
                if passed && entry.first_date > existing.first_date {
                    *existing = entry.clone();
                }
            })
            .or_insert_with(|| entry.clone());
    }

    buckets.extend(current);
    buckets
}

fn summary_entry(occurrence: &Occurrence) -> (SummaryKey, SummaryEntry) {
    let event = &occurrence.event;
    let schedule = event
        .schedule
        .clone()
        .unwrap_or_else(|| occurrence.nice_date());

    let key = SummaryKey {
        title: event.title.clone(),
        schedule: schedule.clone(),
    };
    let entry = SummaryEntry {
        title: event.title.clone(),
        schedule,
        first_date: occurrence.date,
        priority: event.size.is_priority(),
        image: event.image.clone(),
    };
    (key, entry)
}
