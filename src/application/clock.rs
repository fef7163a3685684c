//! Wall-clock boundary and fixed-zone timestamp labels.

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Wall-clock capability the pipeline depends on by interface.
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

/// System clock used in production wiring.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Preformatted display labels for one card, fixed at submission time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeLabels {
    /// 24-hour `HH:MM`.
    pub time: String,
    /// `DD/MM/YYYY`.
    pub date: String,
}

impl TimeLabels {
    /// Localize an instant into the target zone and format both labels.
    pub fn compute(now: DateTime<Utc>, tz: Tz) -> Self {
        let localized = tz.from_utc_datetime(&now.naive_utc());
        Self {
            time: localized.format("%H:%M").to_string(),
            date: localized.format("%d/%m/%Y").to_string(),
        }
    }
}
