//! Validation and normalization of parsed records.

use std::path::{Component, Path, PathBuf};

use chrono::DateTime;
use chrono_tz::Tz;
use url::Url;

use crate::config::{CityRegistry, SiteConfig};
use crate::error::{ZoukError, ZoukResult};
use crate::event::{Event, Size};
use crate::record::{ParsedRecord, SUMMARY_SKIP_MARKER};
use crate::recurrence::{DateSpec, Expander};
use crate::store::SourceId;

/// A normalized event together with all of its dates.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub event: Event,
    pub dates: Vec<DateTime<Tz>>,
}

/// Checks every field of a record and canonicalizes it.
#[derive(Debug, Clone)]
pub struct Normalizer {
    cities: CityRegistry,
    expander: Expander,
    currency: String,
    free_prices: Vec<String>,
    asset_root: PathBuf,
}

impl Normalizer {
    pub fn new(
        cities: CityRegistry,
        expander: Expander,
        currency: &str,
        free_prices: Vec<String>,
        asset_root: impl Into<PathBuf>,
    ) -> Self {
        Normalizer {
            cities,
            expander,
            currency: currency.to_string(),
            free_prices,
            asset_root: asset_root.into(),
        }
    }

    pub fn from_config(config: &SiteConfig) -> ZoukResult<Self> {
        Ok(Self::new(
            config.city_registry(),
            Expander::new(config.timezone()?, config.recurrence_limit),
            &config.currency,
            config.free_prices.clone(),
            config.asset_root(),
        ))
    }

    /// Validate `record` read from `source`. Checks run in a fixed order.
    pub fn normalize(&self, record: &ParsedRecord, source: &SourceId) -> ZoukResult<Normalized> {
        let raw = &record.raw;
        let (title, description) = record.title_and_description();

        let title = required("title", title.as_deref(), "no title")?;
        let location = required("location", raw.location.as_deref(), "no location")?;

        let (city_code, city) = self.resolve_city(raw.city.as_deref(), source)?;

        let spec = DateSpec::from_raw(raw)?;
        let dates = self.expander.expand(&spec)?;

        let hour = normalize_hour(raw.hour.as_deref().unwrap_or(""))?;
        let price = raw.price.as_deref().and_then(|p| self.normalize_price(p));
        let url = raw.url.as_deref().and_then(normalize_url);

        let (schedule, legacy_skip) = split_schedule(raw.schedule.as_deref());
        let size = parse_size(raw.size.as_deref(), schedule.is_some())?;

        let image = match raw.image.as_deref().map(str::trim).filter(|i| !i.is_empty()) {
            Some(image) => Some(self.check_image(image)?),
            None => None,
        };

        Ok(Normalized {
            event: Event {
                title,
                location,
                city_code,
                city,
                url,
                price,
                hour,
                image,
                schedule,
                size,
                hidden: raw.hidden,
                summary_skip: raw.summary_skip || legacy_skip,
                slots: raw.slots.iter().map(|s| s.trim().to_string()).collect(),
                description,
                source: source.clone(),
            },
            dates,
        })
    }

    /// Resolve the city code, falling back to the record's folder name.
    fn resolve_city(&self, city: Option<&str>, source: &SourceId) -> ZoukResult<(String, String)> {
        let code = city
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .or_else(|| source.folder_name())
            .unwrap_or("")
            .to_lowercase();

        match self.cities.display_name(&code) {
            Some(name) => Ok((code.clone(), name.to_string())),
            None => Err(ZoukError::invalid(
                "city",
                code,
                format!("unknown city, try one of: {}", self.cities.codes().join(", ")),
            )),
        }
    }

    /// Append the currency unless it is already there or the price is a free-text exception.
    fn normalize_price(&self, price: &str) -> Option<String> {
        let price = price.trim();
        if price.is_empty() {
            return None;
        }

        let exempt = price.ends_with(&self.currency)
            || self.free_prices.iter().any(|p| p.eq_ignore_ascii_case(price));
        if exempt {
            Some(price.to_string())
        } else {
            Some(format!("{} {}", price, self.currency))
        }
    }

    /// The image must be a readable file inside the asset root.
    fn check_image(&self, image: &str) -> ZoukResult<String> {
        let relative = Path::new(image.trim_start_matches('/'));
        if relative.components().any(|c| !matches!(c, Component::Normal(_))) {
            return Err(ZoukError::Resource(format!(
                "image {image:?} must stay inside {}",
                self.asset_root.display()
            )));
        }

        let path = self.asset_root.join(relative);
        std::fs::File::open(&path)
            .and_then(|f| f.metadata())
            .ok()
            .filter(|m| m.is_file())
            .ok_or_else(|| ZoukError::Resource(format!("cannot read image {}", path.display())))?;

        Ok(relative.to_string_lossy().into_owned())
    }
}

fn required(field: &'static str, value: Option<&str>, reason: &str) -> ZoukResult<String> {
    let value = value.unwrap_or("").trim();
    if value.is_empty() {
        return Err(ZoukError::invalid(field, value, reason));
    }
    Ok(value.to_string())
}

/// `H:MM` or `HH:MM`.
pub fn normalize_hour(hour: &str) -> ZoukResult<String> {
    let hour = hour.trim();
    let valid = match hour.split_once(':') {
        Some((h, m)) => {
            (1..=2).contains(&h.len())
                && m.len() == 2
                && h.bytes().chain(m.bytes()).all(|b| b.is_ascii_digit())
        }
        None => false,
    };

    if valid {
        Ok(hour.to_string())
    } else {
        Err(ZoukError::invalid("time", hour, "expected H:MM or HH:MM"))
    }
}

/// Prepend `https://` unless the URL already parses as absolute with a host.
pub fn normalize_url(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        None
    } else if Url::parse(url).is_ok_and(|u| u.host_str().is_some_and(|h| !h.is_empty())) {
        Some(url.to_string())
    } else {
        Some(format!("https://{url}"))
    }
}

/// Strip the legacy skip marker out of a schedule label.
fn split_schedule(schedule: Option<&str>) -> (Option<String>, bool) {
    let Some(schedule) = schedule else {
        return (None, false);
    };

    let skip = schedule.contains(SUMMARY_SKIP_MARKER);
    let label = schedule.replace(SUMMARY_SKIP_MARKER, "").trim().to_string();
    (Some(label).filter(|l| !l.is_empty()), skip)
}

/// Custom-labelled events default to small, everything else to big.
fn parse_size(size: Option<&str>, has_schedule: bool) -> ZoukResult<Size> {
    match size.map(|s| s.trim().to_lowercase()).as_deref() {
        None | Some("") => Ok(if has_schedule { Size::Small } else { Size::Big }),
        Some("small") => Ok(Size::Small),
        Some("big") => Ok(Size::Big),
        Some(other) => Err(ZoukError::invalid("size", other, "expected small or big")),
    }
}
