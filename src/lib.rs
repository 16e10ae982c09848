//! Geo Consensus
//!
//! Image geolocation as a background service: an external predictor proposes
//! candidate coordinates, repeated runs are clustered into consensus
//! locations, and results are labelled lazily through reverse geocoding.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
