// File: src/model.rs
use chrono::{DateTime, Local, NaiveDateTime};
use serde::de::{DeserializeOwned, Deserializer, Error as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenderPreference {
    FemaleOnly,
    MaleOnly,
    #[default]
    #[serde(other)]
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideStatus {
    #[default]
    Scheduled,
    Full,
    InProgress,
    Completed,
    Cancelled,
    // Statuses added server-side after this client shipped
    #[serde(other)]
    Unknown,
}

impl RideStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Scheduled => "SCHEDULED",
            RideStatus::Full => "FULL",
            RideStatus::InProgress => "IN_PROGRESS",
            RideStatus::Completed => "COMPLETED",
            RideStatus::Cancelled => "CANCELLED",
            RideStatus::Unknown => "UNKNOWN",
        }
    }
}

/// Luggage capacity offered by a ride. Variants are declared smallest first so
/// the derived ordering reads as "fits at most".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LuggageSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl LuggageSize {
    /// Parses the wire value ("SMALL", "medium", ...). Empty or unknown input is unset.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "SMALL" => Some(LuggageSize::Small),
            "MEDIUM" => Some(LuggageSize::Medium),
            "LARGE" => Some(LuggageSize::Large),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LuggageSize::Small => "SMALL",
            LuggageSize::Medium => "MEDIUM",
            LuggageSize::Large => "LARGE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ride {
    pub id: String,
    #[serde(default, deserialize_with = "lenient")]
    pub origin_name: String,
    #[serde(default, deserialize_with = "lenient")]
    pub destination_name: String,
    /// Raw ISO-8601 string as sent by the API; empty when missing.
    /// See [`Ride::departure_local`].
    #[serde(default, deserialize_with = "lenient")]
    pub departure_time: String,
    #[serde(default, deserialize_with = "lenient")]
    pub price_per_seat: f64,
    #[serde(default, deserialize_with = "lenient")]
    pub available_seats: u32,
    #[serde(default, deserialize_with = "lenient")]
    pub total_seats: u32,
    #[serde(default, deserialize_with = "lenient")]
    pub status: RideStatus,
    #[serde(default, deserialize_with = "lenient")]
    pub gender_preference: GenderPreference,
    #[serde(default, deserialize_with = "lenient")]
    pub allows_smoking: bool,
    #[serde(default, deserialize_with = "lenient")]
    pub allows_music: bool,
    #[serde(default, deserialize_with = "lenient")]
    pub allows_pets: bool,
    #[serde(default, deserialize_with = "lenient")]
    pub luggage_size: LuggageSize,
    #[serde(default, deserialize_with = "lenient")]
    pub driver_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub driver_rating: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub driver_profile_picture_url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub driver_email: Option<String>,
}

// Null, a wrong type or an unknown enum value falls back to the default
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default())
}

impl Ride {
    /// Departure as local wall-clock time, or `None` when the API sent something unparseable.
    pub fn departure_local(&self) -> Option<NaiveDateTime> {
        parse_departure(&self.departure_time)
    }

    /// Whether the current user may book this ride from the results list.
    pub fn can_book(&self, current_user_email: Option<&str>, booked_ride_ids: &HashSet<String>) -> bool {
        if let (Some(me), Some(driver)) = (current_user_email, self.driver_email.as_deref())
            && me.eq_ignore_ascii_case(driver)
        {
            return false;
        }
        if booked_ride_ids.contains(&self.id) {
            return false;
        }
        self.available_seats > 0 && self.status == RideStatus::Scheduled
    }
}

/// The backend sends `LocalDateTime` without an offset; those are taken as-is.
/// Offset timestamps are shifted into the device's timezone.
pub fn parse_departure(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    #[serde(default)]
    pub size: u32,
    pub total_elements: u64,
    pub total_pages: u32,
    pub number: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedResponse<T> {
    pub content: Vec<T>,
    pub total_elements: u64,
    pub total_pages: u32,
    pub size: u32,
    /// Zero-based index of this page.
    pub number: u32,
}

// Spring serializes pages either flat or with a nested `page` object (VIA_DTO).
// Entries that fail to decode are skipped so one bad record keeps the rest.
impl<'de, T: DeserializeOwned> Deserialize<'de> for PagedResponse<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut value = Value::deserialize(deserializer)?;
        let items = match value.get_mut("content").map(Value::take) {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                return Err(D::Error::custom(format!(
                    "content: expected an array, found {}",
                    other
                )));
            }
        };
        let nested = value
            .get_mut("page")
            .filter(|p| p.is_object())
            .map(Value::take);
        let meta = nested.unwrap_or(value);
        let page: PageMetadata = serde_json::from_value(meta).map_err(D::Error::custom)?;

        let content = items
            .into_iter()
            .enumerate()
            .filter_map(|(i, item)| match serde_json::from_value::<T>(item) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    log::warn!("Skipping entry {} of page {}: {}", i, page.number, e);
                    None
                }
            })
            .collect();

        Ok(Self {
            content,
            total_elements: page.total_elements,
            total_pages: page.total_pages,
            size: page.size,
            number: page.number,
        })
    }
}

impl<T> PagedResponse<T> {
    /// No further page should be requested after this one.
    pub fn is_last_page(&self) -> bool {
        self.content.is_empty() || self.number.saturating_add(1) >= self.total_pages
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub ride_id: String,
    pub seats_requested: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    #[serde(rename = "rideID", alias = "rideId", default)]
    pub ride_id: String,
    #[serde(default)]
    pub seats_booked: u32,
    #[serde(default)]
    pub price_total: f64,
    #[serde(default)]
    pub status: String,
}

/// What the user typed on the search form. Only the coordinates, date and
/// seat count reach the API; `from`/`to` are display labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    pub from: String,
    pub to: String,
    pub origin_lat: f64,
    pub origin_lon: f64,
    pub dest_lat: f64,
    pub dest_lon: f64,
    /// `YYYY-MM-DD`
    pub date: Option<String>,
    pub passengers: u32,
    pub gender_filter: Option<String>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            from: String::new(),
            to: String::new(),
            origin_lat: 0.0,
            origin_lon: 0.0,
            dest_lat: 0.0,
            dest_lon: 0.0,
            date: None,
            passengers: 1,
            gender_filter: None,
        }
    }
}

impl SearchParams {
    /// Start-of-day timestamp sent as `departureTime`.
    pub fn api_departure_time(&self) -> Option<String> {
        self.date
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(|d| format!("{}T00:00:00", d))
    }
}
