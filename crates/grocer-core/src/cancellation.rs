//! # Cancellation Window
//!
//! A customer may cancel a PENDING order only while fewer than
//! `window` hours have passed since it was placed.
//!
//! ```text
//! order_time            +23h59m          +24h            +24h01m
//!     │────────────────────│───────────────│──────────────│
//!     │   can_cancel = true                │  false       │
//!     │   remaining_hours: 24 … 1          │  0           │
//! ```

use chrono::{DateTime, Duration, Utc};

use crate::CANCELLATION_WINDOW_HOURS;

/// Time boundary gating customer cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancellationWindow {
    hours: i64,
}

impl Default for CancellationWindow {
    fn default() -> Self {
        CancellationWindow::new(CANCELLATION_WINDOW_HOURS)
    }
}

impl CancellationWindow {
    pub const fn new(hours: i64) -> Self {
        CancellationWindow { hours }
    }

    #[inline]
    pub const fn hours(&self) -> i64 {
        self.hours
    }

    /// Whole hours elapsed since the order was placed. A clock that reads
    /// earlier than the order counts as zero.
    pub fn elapsed_hours(order_time: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
        (now - order_time).num_hours().max(0)
    }

    /// `window - elapsed_hours`, floored at 0.
    pub fn remaining_hours(&self, order_time: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
        (self.hours - Self::elapsed_hours(order_time, now)).max(0)
    }

    /// True while `now - order_time < window`.
    pub fn can_cancel(&self, order_time: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - order_time < Duration::hours(self.hours)
    }
}
