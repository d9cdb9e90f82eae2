//! Common types used across the platform

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Planning window of a shopping list generation run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanningWindow {
    pub shop_date: DateTime<Utc>,
    pub plan_until: DateTime<Utc>,
}

impl PlanningWindow {
    pub fn new(shop_date: DateTime<Utc>, plan_until: DateTime<Utc>) -> Self {
        Self {
            shop_date,
            plan_until,
        }
    }

    /// Whether a calendar day lies inside the window, both ends inclusive
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.shop_date.date_naive() && date <= self.plan_until.date_naive()
    }

    /// Window length in (possibly fractional) days, never negative
    pub fn horizon_days(&self) -> Decimal {
        let seconds = (self.plan_until - self.shop_date).num_seconds().max(0);
        crate::rounding::round_internal(Decimal::from(seconds) / Decimal::from(86_400))
    }
}

/// Pagination parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 50,
        }
    }
}

impl Pagination {
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page.clamp(1, 500))
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.max(1) - 1) * self.limit()
    }
}
