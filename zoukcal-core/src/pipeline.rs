//! One full rebuild pass: read, validate, expand, prune, order, summarize.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::SiteConfig;
use crate::error::{RecordError, ZoukResult};
use crate::event::Occurrence;
use crate::listing::Listing;
use crate::record::parse_record;
use crate::staleness::StalenessPolicy;
use crate::store::{ContentStore, SourceId};
use crate::summary::{MonthBucket, summarize};
use crate::validate::{Normalized, Normalizer};

/// Result of one pass, ready for rendering.
#[derive(Debug, Default)]
pub struct Build {
    pub listing: Listing,
    pub months: Vec<MonthBucket>,
    /// Records that failed and were left out.
    pub skipped: Vec<RecordError>,
    /// Exhausted records (deleted when pruning is on).
    pub retired: Vec<SourceId>,
}

pub struct Pipeline<S> {
    store: S,
    normalizer: Normalizer,
    staleness: StalenessPolicy,
}

impl<S: ContentStore> Pipeline<S> {
    pub fn new(store: S, normalizer: Normalizer, staleness: StalenessPolicy) -> Self {
        Pipeline {
            store,
            normalizer,
            staleness,
        }
    }

    pub fn from_config(store: S, config: &SiteConfig) -> ZoukResult<Self> {
        Ok(Self::new(
            store,
            Normalizer::from_config(config)?,
            StalenessPolicy::new(config.stale_after_hours, config.prune_stale),
        ))
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run a pass as of `now`. Broken records are logged and skipped; only
    /// infrastructure errors from the store fail the pass.
    pub fn run(&self, now: DateTime<Utc>) -> ZoukResult<Build> {
        let mut build = Build::default();
        let mut occurrences = Vec::new();

        for id in self.store.list()? {
            let normalized = match self.load(&id) {
                Ok(normalized) => normalized,
                Err(error) if !error.is_record_scoped() => return Err(error),
                Err(error) => {
                    let skipped = RecordError { source: id, error };
                    warn!("{skipped}");
                    build.skipped.push(skipped);
                    continue;
                }
            };

            if self.staleness.is_exhausted(&normalized.dates, now) {
                self.retire(&id);
                build.retired.push(id);
                continue;
            }

            info!("Loaded {} ({})", id, normalized.event.title);
            occurrences.extend(Occurrence::fan_out(normalized.event, &normalized.dates));
        }

        build.listing = Listing::new(occurrences);
        build.months = summarize(&build.listing, now);
        Ok(build)
    }

    fn load(&self, id: &SourceId) -> ZoukResult<Normalized> {
        let content = self.store.read(id)?;
        let record = parse_record(&content)?;
        self.normalizer.normalize(&record, id)
    }

    fn retire(&self, id: &SourceId) {
        if !self.staleness.prune {
            info!("Retired {id}: all dates have passed");
            return;
        }

        match self.store.delete(id) {
            Ok(()) => info!("Deleted {id}: all dates have passed"),
            Err(e) => warn!("Could not delete exhausted record {id}: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CityRegistry;
    use crate::recurrence::Expander;
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use chrono_tz::Europe::Berlin;

    fn pipeline(store: MemoryStore, prune: bool) -> Pipeline<MemoryStore> {
        Pipeline::new(
            store,
            Normalizer::new(
                CityRegistry::default(),
                Expander::new(Berlin, 365),
                "CHF",
                vec!["donations".to_string()],
                "/nonexistent",
            ),
            StalenessPolicy::new(24, prune),
        )
    }

    fn record(title: &str, date_line: &str) -> String {
        format!("title: {title}\nlocation: Plaza\ncity: zrh\ntime: \"20:00\"\n{date_line}\n")
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_bad_record_is_skipped_not_fatal() {
        let store = MemoryStore::new();
        store.insert("good.md", &record("Good", "date: 2024-03-01"));
        store.insert("bad.md", &record("Bad", "date: 2024-03-99"));

        let build = pipeline(store, true).run(now()).unwrap();

        assert_eq!(build.listing.len(), 1);
        assert_eq!(build.skipped.len(), 1);
        assert_eq!(build.skipped[0].source, SourceId::new("bad.md"));
    }

    #[test]
    fn test_exhausted_record_is_deleted() {
        let store = MemoryStore::new();
        store.insert("old.md", &record("Old", "dates: [2024-01-01, 2024-02-01]"));
        store.insert("mixed.md", &record("Mixed", "dates: [2024-01-01, 2024-03-01]"));

        let pipeline = pipeline(store, true);
        let build = pipeline.run(now()).unwrap();

        assert_eq!(build.retired, vec![SourceId::new("old.md")]);
        assert!(!pipeline.store().contains("old.md"));
        assert!(pipeline.store().contains("mixed.md"));
        // Past dates of a live record still pass through.
        assert_eq!(build.listing.len(), 2);
    }

    #[test]
    fn test_retire_without_pruning_keeps_source() {
        let store = MemoryStore::new();
        store.insert("old.md", &record("Old", "date: 2024-01-01"));

        let pipeline = pipeline(store, false);
        let build = pipeline.run(now()).unwrap();

        assert_eq!(build.retired.len(), 1);
        assert!(build.listing.is_empty());
        assert!(pipeline.store().contains("old.md"));
    }

    #[test]
    fn test_invalid_record_is_never_deleted() {
        let store = MemoryStore::new();
        store.insert("broken.md", "title: Old\ndate: 2020-01-01\n");

        let pipeline = pipeline(store, true);
        let build = pipeline.run(now()).unwrap();

        assert_eq!(build.skipped.len(), 1);
        assert!(pipeline.store().contains("broken.md"));
    }
}
