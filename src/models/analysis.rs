use std::fmt::Display;
use std::str::FromStr;

use garde::Validate;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::location::{GeoPoint, LocationInfo};

pub const DEFAULT_MAX_RESULTS: usize = 65;
pub const DEFAULT_ITERATIONS: usize = 3;
pub const DEFAULT_FINAL_RESULTS: usize = 5;
pub const MAX_ITERATIONS: usize = 50;

/// Body of `POST /start_analysis`.
///
/// Numeric fields accept JSON numbers or numeric strings, since browser
/// forms submit input values as text. Empty strings count as absent.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct StartAnalysisRequest {
    /// Data URI (`data:image/...;base64,...`) or bare base64.
    #[garde(skip)]
    pub image: Option<String>,

    #[garde(skip)]
    pub model: Option<String>,

    #[serde(default, deserialize_with = "lenient")]
    #[garde(range(min = 1, max = 1000))]
    pub max_results: Option<usize>,

    #[serde(default)]
    #[garde(skip)]
    pub precision_mode: bool,

    /// Only read in precision mode; range-checked there.
    #[serde(default, deserialize_with = "lenient")]
    #[garde(skip)]
    pub iterations: Option<usize>,

    #[serde(default, deserialize_with = "lenient")]
    #[garde(range(min = 1, max = 1000))]
    pub final_results: Option<usize>,

    #[serde(default)]
    #[garde(skip)]
    pub test_mode: bool,

    #[serde(default, deserialize_with = "lenient")]
    #[garde(range(min = -90.0, max = 90.0))]
    pub true_lat: Option<f64>,

    #[serde(default, deserialize_with = "lenient")]
    #[garde(range(min = -180.0, max = 180.0))]
    pub true_lon: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartAnalysisResponse {
    pub success: bool,
    pub analysis_id: String,
}

/// Response of `GET /get_progress/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressResponse {
    pub current: usize,
    pub total: usize,
    pub status: String,
}

impl ProgressResponse {
    /// Reported for ids the store has never seen (or already evicted).
    pub fn unknown() -> Self {
        Self {
            current: 0,
            total: 1,
            status: "unknown".to_string(),
        }
    }
}

/// A consensus location: cluster centroid plus how many points agreed on it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConsensusPoint {
    pub coordinates: GeoPoint,
    pub confidence: usize,
    pub total_points: usize,
}

impl ConsensusPoint {
    pub fn single(point: GeoPoint) -> Self {
        Self {
            coordinates: point,
            confidence: 1,
            total_points: 1,
        }
    }
}

/// Distance and accuracy of one result against the true coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub predicted_lat: f64,
    pub predicted_lon: f64,
    pub distance_km: f64,
    pub accuracy_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestSummary {
    pub average_accuracy: f64,
    pub best_accuracy: f64,
    pub minimum_distance_km: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultEntry {
    pub id: usize,
    pub latitude: f64,
    pub longitude: f64,
    pub confidence: usize,
    pub total_points: usize,
    pub location_info: LocationInfo,
}

/// Final payload of a completed analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResults {
    pub success: bool,
    pub results: Vec<ResultEntry>,
    pub total_found: usize,
    pub precision_mode: bool,
    pub iterations: usize,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub test_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub true_coordinates: Option<GeoPoint>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub test_results: Option<Vec<ScoredPoint>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub test_summary: Option<TestSummary>,
}

/// Body of `POST /get_location_details`.
#[derive(Debug, Deserialize)]
pub struct LocationDetailsRequest {
    #[serde(default, deserialize_with = "lenient")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub lon: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub result_index: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LocationDetailsResponse {
    pub success: bool,
    pub location_info: LocationInfo,
    pub result_index: usize,
}

/// Error body shared by every endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
        Some(Value::String(text)) => text.trim().parse().map(Some).map_err(de::Error::custom),
        Some(Value::Number(number)) => match number.to_string().parse() {
            Ok(value) => Ok(Some(value)),
            // `3.0` for an integer field
            Err(e) => match number.as_f64() {
                Some(whole) if whole.is_finite() && whole.fract() == 0.0 => {
                    format!("{whole:.0}").parse().map(Some).map_err(de::Error::custom)
                }
                _ => Err(de::Error::custom(e)),
            },
        },
        Some(other) => Err(de::Error::custom(format!("expected a number, got {other}"))),
    }
}
