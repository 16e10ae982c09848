use serde::{Deserialize, Serialize};

/// A predicted or reference coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    /// Build a point, rejecting non-finite or out-of-range coordinates.
    pub fn new(lat: f64, lon: f64) -> Option<Self> {
        let valid = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);
        valid.then_some(Self { lat, lon })
    }

    /// Human-readable `Lat: .., Lon: ..` label used when no address is known.
    pub fn label(&self) -> String {
        format!("Lat: {:.6}, Lon: {:.6}", self.lat, self.lon)
    }
}

pub const LOADING_LABEL: &str = "Loading...";
pub const LOCATING_CITY: &str = "Locating...";
pub const SEARCHING_COUNTRY: &str = "Searching...";

/// Reverse-geocoded address components for a coordinate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationInfo {
    pub full_address: String,
    pub city: String,
    pub country: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub road: String,
    #[serde(default)]
    pub house_number: String,
    #[serde(default)]
    pub postcode: String,
    #[serde(default)]
    pub suburb: String,
    #[serde(default)]
    pub county: String,
}

impl LocationInfo {
    /// Placeholder attached to freshly listed results; the client fills it
    /// in later through the location details endpoint.
    pub fn loading(point: GeoPoint) -> Self {
        Self {
            full_address: point.label(),
            city: LOADING_LABEL.to_string(),
            country: LOADING_LABEL.to_string(),
            ..Self::default()
        }
    }

    /// Returned when every provider failed. Never cached.
    pub fn searching(point: GeoPoint) -> Self {
        Self {
            full_address: point.label(),
            city: LOCATING_CITY.to_string(),
            country: SEARCHING_COUNTRY.to_string(),
            ..Self::default()
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.city.as_str(), LOADING_LABEL | LOCATING_CITY)
    }
}
