//! Time source shared by the token codec and the session manager.
//!
//! All timestamps are Unix seconds. Production code uses the system clock;
//! tests pin the clock and move it explicitly to exercise expiry edges.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone, Debug, Default)]
pub struct Clock {
    fixed: Option<Arc<AtomicI64>>,
}

impl Clock {
    /// Clock backed by the system time.
    pub fn system() -> Self {
        Self { fixed: None }
    }

    /// Clock frozen at `now` until moved with [`Clock::set`] or [`Clock::advance`].
    /// Clones share the same instant.
    pub fn fixed(now: i64) -> Self {
        Self {
            fixed: Some(Arc::new(AtomicI64::new(now))),
        }
    }

    /// Current Unix time in seconds.
    pub fn now(&self) -> i64 {
        match &self.fixed {
            Some(t) => t.load(Ordering::SeqCst),
            None => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or_default(),
        }
    }

    /// Move a fixed clock to `now`. No-op on the system clock.
    pub fn set(&self, now: i64) {
        if let Some(t) = &self.fixed {
            t.store(now, Ordering::SeqCst);
        }
    }

    /// Move a fixed clock forward by `secs`. No-op on the system clock.
    pub fn advance(&self, secs: i64) {
        if let Some(t) = &self.fixed {
            t.fetch_add(secs, Ordering::SeqCst);
        }
    }
}

/// Render a Unix timestamp as RFC 3339 UTC: `YYYY-MM-DDTHH:MM:SSZ`.
pub fn format_timestamp(timestamp: i64) -> String {
    let days_since_epoch = timestamp.div_euclid(86400);
    let time_of_day = timestamp.rem_euclid(86400);
    let hours = time_of_day / 3600;
    let minutes = (time_of_day % 3600) / 60;
    let seconds = time_of_day % 60;

    let (year, month, day) = days_to_ymd(days_since_epoch);

    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        year, month, day, hours, minutes, seconds
    )
}

/// Convert days since Unix epoch to year, month, day.
fn days_to_ymd(days: i64) -> (i32, u32, u32) {
    // Algorithm from http://howardhinnant.github.io/date_algorithms.html
    let z = days + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y as i32, m, d)
}
