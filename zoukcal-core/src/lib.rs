//! Core pipeline for the zoukcal event site.
//!
//! Event records (front matter plus markdown body) are read from a content
//! store, validated, expanded into dated occurrences, pruned once exhausted,
//! sorted into a listing with month separators and folded into monthly
//! per-city summaries. A scheduler reruns the whole pass on every change.

pub mod config;
pub mod error;
pub mod event;
pub mod listing;
pub mod output;
pub mod pipeline;
pub mod record;
pub mod recurrence;
pub mod scheduler;
pub mod staleness;
pub mod store;
pub mod summary;
pub mod validate;

pub use config::{CityRegistry, SiteConfig};
pub use error::{RecordError, ZoukError, ZoukResult};
pub use event::{Event, Occurrence, Size};
pub use listing::{ListedOccurrence, Listing};
pub use output::{JsonSnapshot, Renderer};
pub use pipeline::{Build, Pipeline};
pub use scheduler::{Rebuilder, Scheduler, WatchSignal};
pub use store::{ContentStore, DirStore, MemoryStore, SourceId};
pub use summary::{MonthBucket, SummaryEntry, SummaryKey};
