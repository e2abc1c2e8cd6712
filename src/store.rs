// File: src/store.rs
use crate::filter::{SearchFilters, SortBy, TimeOfDay};
use crate::model::{GenderPreference, Ride};
use chrono::Timelike;
use std::cmp::Reverse;
use std::collections::HashSet;

// Upper bound of the price slider when nothing has been fetched yet.
pub const DEFAULT_PRICE_CEILING: f64 = 100.0;

/// Every ride fetched so far for the current search, in API order.
#[derive(Debug, Clone, Default)]
pub struct RideStore {
    rides: Vec<Ride>,
    seen: HashSet<String>,
}

impl RideStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, rides: Vec<Ride>) {
        self.clear();
        self.append(rides);
    }

    /// Appends a page. A ride already present (same id) keeps its first position.
    pub fn append(&mut self, rides: Vec<Ride>) {
        for ride in rides {
            if self.seen.insert(ride.id.clone()) {
                self.rides.push(ride);
            }
        }
    }

    pub fn clear(&mut self) {
        self.rides.clear();
        self.seen.clear();
    }

    pub fn rides(&self) -> &[Ride] {
        &self.rides
    }

    pub fn len(&self) -> usize {
        self.rides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rides.is_empty()
    }

    pub fn view(&self, filters: &SearchFilters) -> Vec<Ride> {
        apply_filters(&self.rides, filters)
    }

    pub fn max_price(&self) -> f64 {
        max_price_in_results(&self.rides)
    }
}

/// Narrows and orders the fetched rides for display.
///
/// Stages run in a fixed order (time slot, price cap, ladies only, no smoking,
/// music, pets, luggage, then sort) and each one only ever drops rides. With
/// no sort selected the API order is kept; sorting is stable.
pub fn apply_filters(rides: &[Ride], filters: &SearchFilters) -> Vec<Ride> {
    let mut result: Vec<Ride> = rides
        .iter()
        .filter(|ride| {
            if !filters.time_of_day.is_empty() {
                // Unparseable departures match no slot
                let Some(departure) = ride.departure_local() else {
                    return false;
                };
                if !filters
                    .time_of_day
                    .contains(&TimeOfDay::from_hour(departure.hour()))
                {
                    return false;
                }
            }

            if let Some(max) = filters.max_price
                && ride.price_per_seat > max
            {
                return false;
            }

            if filters.ladies_only && ride.gender_preference != GenderPreference::FemaleOnly {
                return false;
            }

            if filters.no_smoking && ride.allows_smoking {
                return false;
            }

            if filters.allows_music && !ride.allows_music {
                return false;
            }

            if filters.allows_pets && !ride.allows_pets {
                return false;
            }

            if let Some(needed) = filters.luggage_size
                && ride.luggage_size < needed
            {
                return false;
            }

            true
        })
        .cloned()
        .collect();

    match filters.sort_by {
        Some(SortBy::PriceAsc) => {
            result.sort_by(|a, b| a.price_per_seat.total_cmp(&b.price_per_seat));
        }
        Some(SortBy::PriceDesc) => {
            result.sort_by(|a, b| b.price_per_seat.total_cmp(&a.price_per_seat));
        }
        // None < Some: unparseable departures sort as the earliest
        Some(SortBy::TimeAsc) => result.sort_by_cached_key(|r| r.departure_local()),
        Some(SortBy::TimeDesc) => result.sort_by_cached_key(|r| Reverse(r.departure_local())),
        None => {}
    }

    result
}

/// Prefetch trigger: true once the last visible row is within two rows of the
/// end of what is loaded. Callers dedupe requests and stop at the last page.
pub fn should_load_more(last_visible_index: usize, total_items_count: usize) -> bool {
    // last + 1 > total - 2, rearranged so short lists cannot underflow
    last_visible_index.saturating_add(3) > total_items_count
}

pub fn max_price_in_results(rides: &[Ride]) -> f64 {
    rides
        .iter()
        .map(|r| r.price_per_seat)
        .filter(|p| p.is_finite())
        .reduce(f64::max)
        .map(f64::ceil)
        .unwrap_or(DEFAULT_PRICE_CEILING)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LuggageSize;

    fn make_ride(id: &str, price: f64, departure: &str) -> Ride {
        Ride {
            id: id.to_string(),
            origin_name: "Tunis".to_string(),
            destination_name: "Sousse".to_string(),
            departure_time: departure.to_string(),
            price_per_seat: price,
            available_seats: 3,
            total_seats: 4,
            status: Default::default(),
            gender_preference: GenderPreference::Any,
            allows_smoking: false,
            allows_music: false,
            allows_pets: false,
            luggage_size: LuggageSize::Medium,
            driver_name: None,
            driver_rating: None,
            driver_profile_picture_url: None,
            driver_email: None,
        }
    }

    fn scenario() -> Vec<Ride> {
        vec![
            make_ride("a", 10.0, "2025-05-02T08:00:00"),
            make_ride("b", 50.0, "2025-05-02T20:00:00"),
            make_ride("c", 30.0, "2025-05-02T14:00:00"),
        ]
    }

    fn prices(rides: &[Ride]) -> Vec<f64> {
        rides.iter().map(|r| r.price_per_seat).collect()
    }

    fn ids(rides: &[Ride]) -> Vec<&str> {
        rides.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_default_filters_keep_everything_in_order() {
        let rides = scenario();
        assert_eq!(apply_filters(&rides, &SearchFilters::default()), rides);
    }

    #[test]
    fn test_price_asc_then_cap() {
        let rides = scenario();
        let mut f = SearchFilters {
            sort_by: Some(SortBy::PriceAsc),
            ..Default::default()
        };
        assert_eq!(prices(&apply_filters(&rides, &f)), vec![10.0, 30.0, 50.0]);

        f.max_price = Some(30.0);
        assert_eq!(prices(&apply_filters(&rides, &f)), vec![10.0, 30.0]);
    }

    #[test]
    fn test_price_desc() {
        let f = SearchFilters {
            sort_by: Some(SortBy::PriceDesc),
            ..Default::default()
        };
        assert_eq!(prices(&apply_filters(&scenario(), &f)), vec![50.0, 30.0, 10.0]);
    }

    #[test]
    fn test_morning_only() {
        let f = SearchFilters {
            time_of_day: [TimeOfDay::Morning].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(ids(&apply_filters(&scenario(), &f)), vec!["a"]);
    }

    #[test]
    fn test_time_slots_are_ored() {
        let f = SearchFilters {
            time_of_day: [TimeOfDay::Morning, TimeOfDay::Evening].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(ids(&apply_filters(&scenario(), &f)), vec!["a", "b"]);
    }

    #[test]
    fn test_bucket_boundaries() {
        let rides = vec![
            make_ride("h0", 1.0, "2025-05-02T00:00:00"),
            make_ride("h6", 1.0, "2025-05-02T06:00:00"),
            make_ride("h12", 1.0, "2025-05-02T12:00:00"),
            make_ride("h18", 1.0, "2025-05-02T18:00:00"),
        ];
        let only = |slot| SearchFilters {
            time_of_day: [slot].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(ids(&apply_filters(&rides, &only(TimeOfDay::Morning))), vec!["h6"]);
        assert_eq!(ids(&apply_filters(&rides, &only(TimeOfDay::Afternoon))), vec!["h12"]);
        assert_eq!(ids(&apply_filters(&rides, &only(TimeOfDay::Evening))), vec!["h0", "h18"]);
    }

    #[test]
    fn test_price_cap_is_inclusive() {
        let rides = vec![make_ride("x", 30.0, "2025-05-02T08:00:00")];
        let f = SearchFilters {
            max_price: Some(30.0),
            ..Default::default()
        };
        assert_eq!(apply_filters(&rides, &f).len(), 1);
    }

    #[test]
    fn test_ladies_only_is_strict() {
        let mut any = make_ride("any", 5.0, "2025-05-02T08:00:00");
        any.gender_preference = GenderPreference::Any;
        let mut women = make_ride("women", 5.0, "2025-05-02T08:00:00");
        women.gender_preference = GenderPreference::FemaleOnly;
        let mut men = make_ride("men", 5.0, "2025-05-02T08:00:00");
        men.gender_preference = GenderPreference::MaleOnly;

        let f = SearchFilters {
            ladies_only: true,
            ..Default::default()
        };
        assert_eq!(ids(&apply_filters(&[any, women, men], &f)), vec!["women"]);
    }

    #[test]
    fn test_preference_toggles() {
        let mut smoky = make_ride("smoky", 5.0, "2025-05-02T08:00:00");
        smoky.allows_smoking = true;
        smoky.allows_music = true;
        let mut pets = make_ride("pets", 5.0, "2025-05-02T09:00:00");
        pets.allows_pets = true;
        pets.luggage_size = LuggageSize::Large;
        let small = {
            let mut r = make_ride("small", 5.0, "2025-05-02T10:00:00");
            r.luggage_size = LuggageSize::Small;
            r
        };
        let rides = vec![smoky, pets, small];

        let no_smoke = SearchFilters {
            no_smoking: true,
            ..Default::default()
        };
        assert_eq!(ids(&apply_filters(&rides, &no_smoke)), vec!["pets", "small"]);

        let music = SearchFilters {
            allows_music: true,
            ..Default::default()
        };
        assert_eq!(ids(&apply_filters(&rides, &music)), vec!["smoky"]);

        let with_pets = SearchFilters {
            allows_pets: true,
            ..Default::default()
        };
        assert_eq!(ids(&apply_filters(&rides, &with_pets)), vec!["pets"]);

        let medium_bags = SearchFilters {
            luggage_size: Some(LuggageSize::Medium),
            ..Default::default()
        };
        assert_eq!(ids(&apply_filters(&rides, &medium_bags)), vec!["smoky", "pets"]);
    }

    #[test]
    fn test_time_sort_puts_bad_dates_first() {
        let rides = vec![
            make_ride("late", 1.0, "2025-05-03T09:00:00"),
            make_ride("broken", 1.0, "not a date"),
            make_ride("early", 1.0, "2025-05-01T09:00:00"),
        ];
        let asc = SearchFilters {
            sort_by: Some(SortBy::TimeAsc),
            ..Default::default()
        };
        assert_eq!(ids(&apply_filters(&rides, &asc)), vec!["broken", "early", "late"]);

        let desc = SearchFilters {
            sort_by: Some(SortBy::TimeDesc),
            ..Default::default()
        };
        assert_eq!(ids(&apply_filters(&rides, &desc)), vec!["late", "early", "broken"]);
    }

    #[test]
    fn test_bad_dates_never_match_time_slots() {
        let rides = vec![make_ride("broken", 1.0, "")];
        for slot in [TimeOfDay::Morning, TimeOfDay::Afternoon, TimeOfDay::Evening] {
            let f = SearchFilters {
                time_of_day: [slot].into_iter().collect(),
                ..Default::default()
            };
            assert!(apply_filters(&rides, &f).is_empty());
        }
    }

    #[test]
    fn test_sort_is_stable_on_ties() {
        let rides = vec![
            make_ride("first", 20.0, "2025-05-02T08:00:00"),
            make_ride("cheap", 5.0, "2025-05-02T08:00:00"),
            make_ride("second", 20.0, "2025-05-02T08:00:00"),
        ];
        let f = SearchFilters {
            sort_by: Some(SortBy::PriceDesc),
            ..Default::default()
        };
        assert_eq!(ids(&apply_filters(&rides, &f)), vec!["first", "second", "cheap"]);
    }

    #[test]
    fn test_should_load_more() {
        assert!(should_load_more(8, 10));
        assert!(!should_load_more(5, 10));
        assert!(!should_load_more(6, 10));
        assert!(!should_load_more(7, 10));
        assert!(should_load_more(usize::MAX, 10));
        assert!(should_load_more(0, 0));
        assert!(should_load_more(0, 1));
    }

    #[test]
    fn test_store_dedupes_by_id() {
        let mut store = RideStore::new();
        store.replace(scenario());
        store.append(vec![
            make_ride("c", 99.0, "2025-05-02T14:00:00"),
            make_ride("d", 15.0, "2025-05-02T16:00:00"),
        ]);
        assert_eq!(ids(store.rides()), vec!["a", "b", "c", "d"]);
        assert_eq!(store.rides()[2].price_per_seat, 30.0);

        store.replace(vec![make_ride("a", 1.0, "2025-05-02T08:00:00")]);
        assert_eq!(store.len(), 1);
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_max_price_in_results() {
        assert_eq!(max_price_in_results(&[]), DEFAULT_PRICE_CEILING);
        let rides = vec![
            make_ride("a", 12.2, "2025-05-02T08:00:00"),
            make_ride("b", 41.5, "2025-05-02T08:00:00"),
        ];
        assert_eq!(max_price_in_results(&rides), 42.0);
    }
}
