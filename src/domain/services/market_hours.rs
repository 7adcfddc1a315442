//! Market-hours gate for the autopilot's "active hours only" setting.
//!
//! Two independent windows: XETRA (Frankfurt) and NYSE regular sessions,
//! weekdays only. Exchange holidays are not modeled; the gate is already
//! conservative outside session hours.

use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;

#[derive(Debug, Clone, Copy)]
pub struct MarketWindow {
    pub tz: Tz,
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl MarketWindow {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let local = at.with_timezone(&self.tz);
        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        let time = local.time();
        time >= self.open && time < self.close
    }
}

pub fn xetra() -> MarketWindow {
    MarketWindow {
        tz: chrono_tz::Europe::Berlin,
        open: NaiveTime::from_hms_opt(9, 0, 0).expect("valid time"),
        close: NaiveTime::from_hms_opt(17, 30, 0).expect("valid time"),
    }
}

pub fn nyse() -> MarketWindow {
    MarketWindow {
        tz: chrono_tz::America::New_York,
        open: NaiveTime::from_hms_opt(9, 30, 0).expect("valid time"),
        close: NaiveTime::from_hms_opt(16, 0, 0).expect("valid time"),
    }
}

/// True when at least one configured exchange window is open.
pub fn any_market_open(at: DateTime<Utc>) -> bool {
    xetra().contains(at) || nyse().contains(at)
}
