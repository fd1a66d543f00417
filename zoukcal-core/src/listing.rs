//! Chronological listing with month separators.

use chrono::Datelike;
use serde::Serialize;

use crate::event::Occurrence;

/// An occurrence in the listing, plus a rendering hint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListedOccurrence {
    #[serde(flatten)]
    pub occurrence: Occurrence,
    /// Set on the last entry of a month: the name of the month that follows.
    pub separator_below: Option<String>,
}

/// Occurrences sorted by date, ascending.
///
/// Only constructible through [`Listing::new`], so anything holding a
/// `Listing` can rely on the chronological order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Listing {
    entries: Vec<ListedOccurrence>,
}

impl Listing {
    /// Stable sort by date, then mark month boundaries.
    pub fn new(mut occurrences: Vec<Occurrence>) -> Self {
        occurrences.sort_by_key(|o| o.date);

        let months: Vec<(i32, u32)> = occurrences
            .iter()
            .map(|o| (o.date.year(), o.date.month()))
            .collect();

        let entries = occurrences
            .into_iter()
            .enumerate()
            .map(|(i, occurrence)| {
                let separator_below = match months.get(i + 1) {
                    Some(next) if *next != months[i] => Some(month_name(next.1).to_string()),
                    _ => None,
                };
                ListedOccurrence {
                    occurrence,
                    separator_below,
                }
            })
            .collect();

        Listing { entries }
    }

    pub fn entries(&self) -> &[ListedOccurrence] {
        &self.entries
    }

    pub fn occurrences(&self) -> impl Iterator<Item = &Occurrence> {
        self.entries.iter().map(|e| &e.occurrence)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        _ => "December",
    }
}
