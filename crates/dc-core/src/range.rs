//! Forecast years and inclusive year ranges.

use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

/// Calendar year.
pub type Year = i32;

/// Max year assumed for a scenario whose metadata carries no target year.
pub const MAX_YEAR_SENTINEL: Year = 9999;

/// Upper bound for the default end year of a freshly created scenario state.
pub const DEFAULT_END_YEAR: Year = 2100;

/// Resolve a scenario's max year, falling back to the sentinel.
pub fn scenario_max_year(target_year: Option<Year>) -> Year {
    target_year.unwrap_or(MAX_YEAR_SENTINEL)
}

/// Default end year for a scenario: the earlier of the caller's default and the scenario max.
pub fn default_end_year(caller_default: Year, target_year: Option<Year>) -> Year {
    caller_default.min(scenario_max_year(target_year))
}

/// Inclusive range of years displayed or fetched for a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Year,
    pub end: Year,
}

impl TimeRange {
    pub fn new(start: Year, end: Year) -> CoreResult<Self> {
        if start > end {
            return Err(CoreError::InvertedRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Clamp the end year to `max_year`. The start follows if it would overtake the end.
    pub fn clamped_to(self, max_year: Year) -> Self {
        let end = self.end.min(max_year);
        Self {
            start: self.start.min(end),
            end,
        }
    }

    pub fn with_end(self, end: Year) -> Self {
        Self {
            start: self.start.min(end),
            end,
        }
    }
}
