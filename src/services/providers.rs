//! HTTP clients for the Photon and Nominatim reverse-geocoding services.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::models::location::{GeoPoint, LocationInfo};
use crate::services::geocoding::{ProviderError, ReverseGeocoder};

pub const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
pub const PHOTON_URL: &str = "https://photon.komoot.io";

fn http_client(user_agent: &str, timeout: Duration) -> Result<Client, ProviderError> {
    let http = Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()?;
    Ok(http)
}

/// First non-empty candidate, or an empty string.
fn first_of(candidates: &[&Option<String>]) -> String {
    candidates
        .iter()
        .filter_map(|candidate| candidate.as_deref())
        .find(|value| !value.trim().is_empty())
        .unwrap_or_default()
        .to_string()
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

// ── Nominatim ────────────────────────────────────────────────────────

pub struct NominatimClient {
    http: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    display_name: Option<String>,
    address: Option<NominatimAddress>,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    country: Option<String>,
    state: Option<String>,
    road: Option<String>,
    house_number: Option<String>,
    postcode: Option<String>,
    suburb: Option<String>,
    county: Option<String>,
}

impl NominatimClient {
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            http: http_client(user_agent, timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimClient {
    fn name(&self) -> &'static str {
        "nominatim"
    }

    async fn reverse(&self, point: GeoPoint) -> Result<Option<LocationInfo>, ProviderError> {
        let url = format!("{}/reverse", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("format", "json".to_string()),
                ("lat", point.lat.to_string()),
                ("lon", point.lon.to_string()),
                ("zoom", "16".to_string()),
                ("addressdetails", "1".to_string()),
            ])
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status().as_u16()));
        }

        let body: NominatimResponse = response.json().await?;
        let Some(address) = body.address else {
            return Ok(None);
        };

        Ok(Some(LocationInfo {
            full_address: text(&body.display_name),
            city: first_of(&[
                &address.city,
                &address.town,
                &address.village,
                &address.municipality,
            ]),
            country: text(&address.country),
            state: text(&address.state),
            road: text(&address.road),
            house_number: text(&address.house_number),
            postcode: text(&address.postcode),
            suburb: text(&address.suburb),
            county: text(&address.county),
        }))
    }
}

// ── Photon ───────────────────────────────────────────────────────────

pub struct PhotonClient {
    http: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct PhotonResponse {
    #[serde(default)]
    features: Vec<PhotonFeature>,
}

#[derive(Debug, Deserialize)]
struct PhotonFeature {
    #[serde(default)]
    properties: PhotonProperties,
}

#[derive(Debug, Default, Deserialize)]
struct PhotonProperties {
    name: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    country: Option<String>,
    state: Option<String>,
    street: Option<String>,
    housenumber: Option<String>,
    postcode: Option<String>,
    suburb: Option<String>,
    county: Option<String>,
}

impl PhotonClient {
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            http: http_client(user_agent, timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ReverseGeocoder for PhotonClient {
    fn name(&self) -> &'static str {
        "photon"
    }

    async fn reverse(&self, point: GeoPoint) -> Result<Option<LocationInfo>, ProviderError> {
        let url = format!("{}/reverse", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("lat", point.lat.to_string()), ("lon", point.lon.to_string())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status().as_u16()));
        }

        let body: PhotonResponse = response.json().await?;
        let Some(feature) = body.features.into_iter().next() else {
            return Ok(None);
        };
        let props = feature.properties;

        Ok(Some(LocationInfo {
            full_address: text(&props.name),
            city: first_of(&[&props.city, &props.town, &props.village]),
            country: text(&props.country),
            state: text(&props.state),
            road: text(&props.street),
            house_number: text(&props.housenumber),
            postcode: text(&props.postcode),
            suburb: text(&props.suburb),
            county: text(&props.county),
        }))
    }
}
