// File: ./src/mobile.rs
use crate::client::RideClient;
use crate::config::Config;
use crate::filter::{SearchFilters, SortBy, TimeOfDay};
use crate::model::{LuggageSize, PagedResponse, Ride, SearchParams};
use crate::paths::AppPaths;
use crate::session::{LoadTicket, Phase, SearchResults, SearchSession};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

#[cfg(target_os = "android")]
use android_logger::Config as LogConfig;
#[cfg(target_os = "android")]
use log::LevelFilter;

#[derive(Debug, uniffi::Error)]
#[uniffi(flat_error)]
pub enum MobileError {
    Generic(String),
}
impl From<String> for MobileError {
    fn from(e: String) -> Self {
        Self::Generic(e)
    }
}
impl From<&str> for MobileError {
    fn from(e: &str) -> Self {
        Self::Generic(e.to_string())
    }
}
impl From<anyhow::Error> for MobileError {
    fn from(e: anyhow::Error) -> Self {
        Self::Generic(e.to_string())
    }
}
impl std::fmt::Display for MobileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                MobileError::Generic(s) => s,
            }
        )
    }
}
impl std::error::Error for MobileError {}

// --- DTOs ---

#[derive(Debug, Clone, uniffi::Record)]
pub struct MobileRide {
    pub id: String,
    pub origin_name: String,
    pub destination_name: String,
    pub departure_time: String,
    pub price_per_seat: f64,
    pub available_seats: u32,
    pub total_seats: u32,
    pub status: String,
    pub ladies_only: bool,
    pub allows_smoking: bool,
    pub allows_music: bool,
    pub allows_pets: bool,
    pub luggage_size: String,
    pub driver_name: Option<String>,
    pub driver_rating: Option<f64>,
    pub driver_profile_picture_url: Option<String>,
    pub can_book: bool,
}

/// Filter sheet state as the UI holds it. Strings use the wire values
/// ("price_asc", "morning", "LARGE"); empty or unknown values mean unset.
#[derive(Debug, Clone, Default, uniffi::Record)]
pub struct MobileFilters {
    pub sort_by: String,
    pub time_of_day: Vec<String>,
    /// Raw text of the max price field.
    pub max_price: String,
    pub ladies_only: bool,
    pub no_smoking: bool,
    pub allows_music: bool,
    pub allows_pets: bool,
    pub luggage_size: String,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct MobileSearchParams {
    pub from: String,
    pub to: String,
    pub origin_lat: f64,
    pub origin_lon: f64,
    pub dest_lat: f64,
    pub dest_lon: f64,
    pub date: Option<String>,
    pub passengers: u32,
    pub gender_filter: Option<String>,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct MobileSearchView {
    /// One of "loading", "error", "no_rides", "no_matching_rides", "rides".
    pub state: String,
    pub error_message: Option<String>,
    pub rides: Vec<MobileRide>,
    pub total_elements: u64,
    pub active_filter_count: u32,
    pub max_price: f64,
    pub is_loading_more: bool,
    pub can_load_more: bool,
    pub load_more_error: Option<String>,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct MobileConfig {
    pub api_url: String,
    pub has_token: bool,
    pub allow_insecure: bool,
    pub page_size: u32,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct MobileBooking {
    pub id: String,
    pub ride_id: String,
    pub seats_booked: u32,
    pub price_total: f64,
    pub status: String,
}

impl From<MobileSearchParams> for SearchParams {
    fn from(p: MobileSearchParams) -> Self {
        SearchParams {
            from: p.from,
            to: p.to,
            origin_lat: p.origin_lat,
            origin_lon: p.origin_lon,
            dest_lat: p.dest_lat,
            dest_lon: p.dest_lon,
            date: p.date,
            passengers: p.passengers.max(1),
            gender_filter: p.gender_filter,
        }
    }
}

impl From<&MobileFilters> for SearchFilters {
    fn from(m: &MobileFilters) -> Self {
        let mut filters = SearchFilters {
            sort_by: SortBy::parse(&m.sort_by),
            time_of_day: m
                .time_of_day
                .iter()
                .filter_map(|s| TimeOfDay::parse(s))
                .collect(),
            ladies_only: m.ladies_only,
            no_smoking: m.no_smoking,
            allows_music: m.allows_music,
            allows_pets: m.allows_pets,
            luggage_size: LuggageSize::parse(&m.luggage_size),
            ..Default::default()
        };
        filters.set_max_price_input(&m.max_price);
        filters
    }
}

impl From<&SearchFilters> for MobileFilters {
    fn from(f: &SearchFilters) -> Self {
        let mut slots: Vec<TimeOfDay> = f.time_of_day.iter().copied().collect();
        slots.sort();
        MobileFilters {
            sort_by: f.sort_by.map(|s| s.as_str().to_string()).unwrap_or_default(),
            time_of_day: slots.iter().map(|s| s.as_str().to_string()).collect(),
            max_price: f.max_price.map(|p| p.to_string()).unwrap_or_default(),
            ladies_only: f.ladies_only,
            no_smoking: f.no_smoking,
            allows_music: f.allows_music,
            allows_pets: f.allows_pets,
            luggage_size: f
                .luggage_size
                .map(|l| l.as_str().to_string())
                .unwrap_or_default(),
        }
    }
}

fn ride_to_mobile(r: &Ride, user_email: Option<&str>, booked: &HashSet<String>) -> MobileRide {
    MobileRide {
        id: r.id.clone(),
        origin_name: r.origin_name.clone(),
        destination_name: r.destination_name.clone(),
        departure_time: r.departure_time.clone(),
        price_per_seat: r.price_per_seat,
        available_seats: r.available_seats,
        total_seats: r.total_seats,
        status: r.status.as_str().to_string(),
        ladies_only: r.gender_preference == crate::model::GenderPreference::FemaleOnly,
        allows_smoking: r.allows_smoking,
        allows_music: r.allows_music,
        allows_pets: r.allows_pets,
        luggage_size: r.luggage_size.as_str().to_string(),
        driver_name: r.driver_name.clone(),
        driver_rating: r.driver_rating,
        driver_profile_picture_url: r.driver_profile_picture_url.clone(),
        can_book: r.can_book(user_email, booked),
    }
}

#[derive(Debug, Default)]
struct SearchScreen {
    session: SearchSession,
    current_user_email: Option<String>,
    booked_ride_ids: HashSet<String>,
}

impl SearchScreen {
    fn view(&self) -> MobileSearchView {
        let session = &self.session;
        let phase = session.phase();
        let (state, error_message, rides) = match session.results() {
            SearchResults::Loading => ("loading", None, Vec::new()),
            SearchResults::Failed(msg) => ("error", Some(msg), Vec::new()),
            SearchResults::NoRides => ("no_rides", None, Vec::new()),
            SearchResults::NoMatchingRides => ("no_matching_rides", None, Vec::new()),
            SearchResults::Rides(rides) => ("rides", None, rides),
        };
        let email = self.current_user_email.as_deref();
        MobileSearchView {
            state: state.to_string(),
            error_message,
            rides: rides
                .iter()
                .map(|r| ride_to_mobile(r, email, &self.booked_ride_ids))
                .collect(),
            total_elements: session.total_elements(),
            active_filter_count: session.active_filter_count() as u32,
            max_price: session.store().max_price(),
            is_loading_more: *phase == Phase::LoadingMore,
            can_load_more: *phase == Phase::Ready,
            load_more_error: session.load_more_error().map(str::to_string),
        }
    }
}

// --- MAIN OBJECT ---

#[derive(uniffi::Object)]
pub struct BlassaMobile {
    client: Arc<Mutex<RideClient>>,
    page_size: Arc<Mutex<u32>>,
    screen: Arc<Mutex<SearchScreen>>,
}

#[uniffi::export(async_runtime = "tokio")]
impl BlassaMobile {
    #[uniffi::constructor]
    pub fn new(android_files_dir: String) -> Self {
        #[cfg(target_os = "android")]
        android_logger::init_once(
            LogConfig::default()
                .with_max_level(LevelFilter::Debug)
                .with_tag("BlassaRust"),
        );
        AppPaths::init_android_path(android_files_dir);

        let config = Config::load_or_default();
        let client = RideClient::from_config(&config).unwrap_or_else(|e| {
            log::warn!("Starting offline: {}", e);
            RideClient::offline()
        });
        Self::with_client(client, config.page_size)
    }

    pub fn get_config(&self) -> MobileConfig {
        let c = Config::load_or_default();
        MobileConfig {
            api_url: c.api_url,
            has_token: c.access_token.is_some_and(|t| !t.is_empty()),
            allow_insecure: c.allow_insecure_certs,
            page_size: c.page_size,
        }
    }

    /// Persists the connection settings and swaps the HTTP client. An empty
    /// token keeps the stored one.
    pub async fn save_config(
        &self,
        api_url: String,
        token: String,
        insecure: bool,
    ) -> Result<(), MobileError> {
        let mut c = Config::load_or_default();
        c.api_url = api_url;
        if !token.is_empty() {
            c.access_token = Some(token);
        }
        c.allow_insecure_certs = insecure;
        let client = RideClient::from_config(&c).map_err(MobileError::from)?;
        c.save().map_err(MobileError::from)?;

        *self.client.lock().await = client;
        *self.page_size.lock().await = c.page_size;
        Ok(())
    }

    pub async fn set_current_user(&self, email: Option<String>, booked_ride_ids: Vec<String>) {
        let mut screen = self.screen.lock().await;
        screen.current_user_email = email.filter(|e| !e.is_empty());
        screen.booked_ride_ids = booked_ride_ids.into_iter().collect();
    }

    /// Starts a new search and loads its first page. A network failure shows
    /// up as the "error" state rather than as an `Err`.
    pub async fn initialize_search(&self, params: MobileSearchParams) -> MobileSearchView {
        let ticket = self
            .screen
            .lock()
            .await
            .session
            .begin_initial_load(params.into());
        if let Some(ticket) = ticket {
            self.fetch(ticket).await;
        }
        self.get_view().await
    }

    pub async fn retry(&self) -> MobileSearchView {
        let ticket = self.screen.lock().await.session.retry();
        if let Some(ticket) = ticket {
            self.fetch(ticket).await;
        }
        self.get_view().await
    }

    /// Returns true when a new page was appended.
    pub async fn load_more(&self) -> bool {
        let ticket = self.screen.lock().await.session.begin_load_more();
        match ticket {
            Some(ticket) => self.fetch(ticket).await,
            None => false,
        }
    }

    /// Scroll callback from the results list. Fetches the next page when the
    /// last visible row gets close to the end.
    pub async fn on_scroll(&self, last_visible_index: u32, total_items_count: u32) -> bool {
        let ticket = {
            let mut screen = self.screen.lock().await;
            if !screen
                .session
                .on_scroll(last_visible_index as usize, total_items_count as usize)
            {
                return false;
            }
            screen.session.begin_load_more()
        };
        match ticket {
            Some(ticket) => self.fetch(ticket).await,
            None => false,
        }
    }

    pub async fn update_filters(&self, filters: MobileFilters) -> MobileSearchView {
        let mut screen = self.screen.lock().await;
        screen.session.update_filters(SearchFilters::from(&filters));
        screen.view()
    }

    pub async fn reset_filters(&self) -> MobileSearchView {
        let mut screen = self.screen.lock().await;
        screen.session.reset_filters();
        screen.view()
    }

    pub async fn get_filters(&self) -> MobileFilters {
        MobileFilters::from(self.screen.lock().await.session.filters())
    }

    pub async fn get_view(&self) -> MobileSearchView {
        self.screen.lock().await.view()
    }

    pub async fn create_booking(
        &self,
        ride_id: String,
        seats: u32,
    ) -> Result<MobileBooking, MobileError> {
        let client = self.client.lock().await.clone();
        let booking = client
            .create_booking(&ride_id, seats)
            .await
            .map_err(MobileError::from)?;
        self.screen
            .lock()
            .await
            .booked_ride_ids
            .insert(ride_id.clone());
        Ok(MobileBooking {
            id: booking.id,
            ride_id: if booking.ride_id.is_empty() {
                ride_id
            } else {
                booking.ride_id
            },
            seats_booked: booking.seats_booked,
            price_total: booking.price_total,
            status: booking.status,
        })
    }

    /// Screen teardown. Requests still in flight are ignored when they land.
    pub async fn close(&self) {
        self.screen.lock().await.session.close();
    }
}

impl BlassaMobile {
    pub fn with_client(client: RideClient, page_size: u32) -> Self {
        Self {
            client: Arc::new(Mutex::new(client)),
            page_size: Arc::new(Mutex::new(page_size)),
            screen: Arc::new(Mutex::new(SearchScreen::default())),
        }
    }

    // The screen lock is released while the request runs
    async fn fetch(&self, ticket: LoadTicket) -> bool {
        let client = self.client.lock().await.clone();
        let size = *self.page_size.lock().await;
        let params = self.screen.lock().await.session.params().clone();

        let result: Result<PagedResponse<Ride>, String> =
            client.search_rides(&params, ticket.page(), size).await;

        let mut screen = self.screen.lock().await;
        match result {
            Ok(page) => screen.session.complete(ticket, page),
            Err(e) => {
                screen.session.fail(ticket, e);
                false
            }
        }
    }
}
