// File: src/filter.rs
use crate::model::LuggageSize;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortBy {
    PriceAsc,
    PriceDesc,
    TimeAsc,
    TimeDesc,
}

impl SortBy {
    /// Parses the UI value. `""` and unknown keys mean "keep the API order".
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "price_asc" => Some(SortBy::PriceAsc),
            "price_desc" => Some(SortBy::PriceDesc),
            "time_asc" => Some(SortBy::TimeAsc),
            "time_desc" => Some(SortBy::TimeDesc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::PriceAsc => "price_asc",
            SortBy::PriceDesc => "price_desc",
            SortBy::TimeAsc => "time_asc",
            SortBy::TimeDesc => "time_desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
}

impl TimeOfDay {
    /// Morning is [6,12), afternoon [12,18), evening wraps through midnight to 6.
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            6..=11 => TimeOfDay::Morning,
            12..=17 => TimeOfDay::Afternoon,
            _ => TimeOfDay::Evening,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "morning" => Some(TimeOfDay::Morning),
            "afternoon" => Some(TimeOfDay::Afternoon),
            "evening" => Some(TimeOfDay::Evening),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOfDay::Morning => "morning",
            TimeOfDay::Afternoon => "afternoon",
            TimeOfDay::Evening => "evening",
        }
    }
}

/// Client-side refinement of an already fetched result list.
///
/// Lives only as long as the results screen; `SearchFilters::default()` is the
/// "nothing selected" state the reset button returns to.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchFilters {
    pub sort_by: Option<SortBy>,
    pub time_of_day: HashSet<TimeOfDay>,
    pub max_price: Option<f64>,
    pub ladies_only: bool,
    pub no_smoking: bool,
    pub allows_music: bool,
    pub allows_pets: bool,
    pub luggage_size: Option<LuggageSize>,
}

impl SearchFilters {
    pub fn has_active_filters(&self) -> bool {
        active_filter_count(self) > 0
    }

    pub fn toggle_time_of_day(&mut self, slot: TimeOfDay) {
        if !self.time_of_day.remove(&slot) {
            self.time_of_day.insert(slot);
        }
    }

    /// Applies the raw text of the max price field.
    pub fn set_max_price_input(&mut self, text: &str) {
        self.max_price = parse_max_price(text);
    }
}

/// Number of filter dimensions away from their default. A dimension counts
/// once no matter how many time slots are ticked or how low the price cap is.
pub fn active_filter_count(filters: &SearchFilters) -> usize {
    [
        filters.sort_by.is_some(),
        !filters.time_of_day.is_empty(),
        filters.max_price.is_some(),
        filters.ladies_only,
        filters.no_smoking,
        filters.allows_music,
        filters.allows_pets,
        filters.luggage_size.is_some(),
    ]
    .iter()
    .filter(|active| **active)
    .count()
}

/// Anything that is not a finite, non-negative number means "no ceiling".
pub fn parse_max_price(text: &str) -> Option<f64> {
    text.trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|p| p.is_finite() && *p >= 0.0)
}
