// File: src/client.rs
mod cert;
mod core;

pub use self::core::{RideClient, RideFetcher};
