// File: src/lib.rs
pub mod client;
pub mod config;
pub mod filter;
pub mod mobile;
pub mod model;
pub mod paths;
pub mod session;
pub mod store;

uniffi::setup_scaffolding!();
