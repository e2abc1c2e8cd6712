// File: src/client/core.rs

use crate::client::cert::NoVerifier;
use crate::config::Config;
use crate::model::{Booking, BookingRequest, PagedResponse, Ride, SearchParams};

use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::{Method, Request, Uri};
use http_body_util::BodyExt;
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;

type HttpsClient = Client<
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>,
    String,
>;

/// Source of search result pages. [`RideClient`] is the network implementation;
/// the search controller only depends on this.
pub trait RideFetcher {
    fn search_rides(
        &self,
        params: &SearchParams,
        page: u32,
        size: u32,
    ) -> impl Future<Output = Result<PagedResponse<Ride>, String>> + Send;
}

#[derive(Clone, Debug)]
struct Connection {
    http: HttpsClient,
    base_url: String,
    token: Option<String>,
}

#[derive(Clone, Debug)]
pub struct RideClient {
    // None when no API URL is configured
    conn: Option<Connection>,
}

impl RideClient {
    pub fn new(url: &str, token: Option<&str>, insecure: bool) -> Result<Self, String> {
        let url = url.trim().trim_end_matches('/');
        if url.is_empty() {
            return Ok(Self::offline());
        }

        let uri: Uri = url
            .parse()
            .map_err(|e: http::uri::InvalidUri| e.to_string())?;
        if uri.authority().is_none() {
            return Err(format!("API URL has no host: {}", url));
        }

        let https_connector = if insecure {
            let tls_config = rustls::ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoVerifier))
                .with_no_client_auth();
            HttpsConnectorBuilder::new()
                .with_tls_config(tls_config)
                .https_or_http()
                .enable_http1()
                .build()
        } else {
            let mut root_store = rustls::RootCertStore::empty();
            let result = rustls_native_certs::load_native_certs();
            root_store.add_parsable_certificates(result.certs);
            // Plain http (emulator, local backend) does not need any roots
            if root_store.is_empty() && uri.scheme_str() != Some("http") {
                return Err("No valid system certificates found.".to_string());
            }
            let tls_config = rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth();
            HttpsConnectorBuilder::new()
                .with_tls_config(tls_config)
                .https_or_http()
                .enable_http1()
                .build()
        };

        let http = Client::builder(TokioExecutor::new()).build(https_connector);
        Ok(Self {
            conn: Some(Connection {
                http,
                base_url: url.to_string(),
                token: token
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string),
            }),
        })
    }

    pub fn offline() -> Self {
        Self { conn: None }
    }

    pub fn from_config(config: &Config) -> Result<Self, String> {
        Self::new(
            &config.api_url,
            config.access_token.as_deref(),
            config.allow_insecure_certs,
        )
    }

    pub fn is_offline(&self) -> bool {
        self.conn.is_none()
    }

    pub async fn search_rides(
        &self,
        params: &SearchParams,
        page: u32,
        size: u32,
    ) -> Result<PagedResponse<Ride>, String> {
        let query = search_query(params, page, size);
        let path = format!("rides/search?{}", query);
        let result: PagedResponse<Ride> = self.send_json(Method::GET, &path, None).await?;
        log::debug!(
            "Search page {} returned {} rides ({} total, {} pages)",
            result.number,
            result.content.len(),
            result.total_elements,
            result.total_pages
        );
        Ok(result)
    }

    pub async fn create_booking(&self, ride_id: &str, seats: u32) -> Result<Booking, String> {
        if seats == 0 {
            return Err("At least one seat must be requested".to_string());
        }
        let body = serde_json::to_string(&BookingRequest {
            ride_id: ride_id.to_string(),
            seats_requested: seats,
        })
        .map_err(|e| e.to_string())?;
        self.send_json(Method::POST, "bookings", Some(body)).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
    ) -> Result<T, String> {
        let conn = self.conn.as_ref().ok_or("Offline")?;
        let url = format!("{}/{}", conn.base_url, path);
        let uri: Uri = url
            .parse()
            .map_err(|e: http::uri::InvalidUri| e.to_string())?;

        let mut builder = Request::builder()
            .method(method.clone())
            .uri(uri)
            .header(ACCEPT, "application/json");
        if body.is_some() {
            builder = builder.header(CONTENT_TYPE, "application/json");
        }
        if let Some(token) = &conn.token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = builder
            .body(body.unwrap_or_default())
            .map_err(|e| e.to_string())?;

        log::debug!("{} {}", method, url);
        let response = conn
            .http
            .request(request)
            .await
            .map_err(|e| format!("{:?}", e))?;
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| e.to_string())?
            .to_bytes();

        if !status.is_success() {
            let text = String::from_utf8_lossy(&bytes);
            log::warn!("{} {} failed with {}", method, url, status);
            return Err(format!("HTTP {}: {}", status.as_u16(), text.trim()));
        }

        serde_json::from_slice(&bytes).map_err(|e| format!("Invalid response from {}: {}", path, e))
    }
}

impl RideFetcher for RideClient {
    fn search_rides(
        &self,
        params: &SearchParams,
        page: u32,
        size: u32,
    ) -> impl Future<Output = Result<PagedResponse<Ride>, String>> + Send {
        RideClient::search_rides(self, params, page, size)
    }
}

fn search_query(params: &SearchParams, page: u32, size: u32) -> String {
    let mut pairs: Vec<(&str, String)> = vec![
        ("originLat", params.origin_lat.to_string()),
        ("originLon", params.origin_lon.to_string()),
        ("destLat", params.dest_lat.to_string()),
        ("destLon", params.dest_lon.to_string()),
    ];
    if let Some(departure) = params.api_departure_time() {
        pairs.push(("departureTime", departure));
    }
    pairs.push(("seats", params.passengers.max(1).to_string()));
    if let Some(gender) = params.gender_filter.as_deref().filter(|g| !g.is_empty()) {
        pairs.push(("genderFilter", gender.to_string()));
    }
    pairs.push(("page", page.to_string()));
    pairs.push(("size", size.to_string()));

    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, encode_query_value(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn encode_query_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b':' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
