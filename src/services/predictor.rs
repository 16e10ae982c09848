use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::models::location::GeoPoint;
use crate::services::image::DecodedImage;

/// A named predictor configuration the service can run.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ModelInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub const DEFAULT_MODEL: &str = "nicolas-dufour/PLONK_YFCC";

pub const MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: "nicolas-dufour/PLONK_YFCC",
        name: "PLONK YFCC",
        description: "Trained on YFCC-100M (Yahoo Flickr). Best for general photos, \
            landscapes, cities and architecture. Weaker on street-level imagery.",
    },
    ModelInfo {
        id: "nicolas-dufour/PLONK_iNaturalist",
        name: "PLONK iNaturalist",
        description: "Trained on iNaturalist-21. Best for wildlife and plant photos. \
            Not tuned for urban architecture.",
    },
    ModelInfo {
        id: "nicolas-dufour/PLONK_OSV_5M",
        name: "PLONK Open Street View",
        description: "Trained on OpenStreetView-5M. Best for streets, signs and \
            buildings. Less suited to natural landscapes.",
    },
];

pub fn find_model(id: &str) -> Option<&'static ModelInfo> {
    MODELS.iter().find(|model| model.id == id)
}

/// Raw predictor output, classified by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictorOutput {
    /// `[[lat, lon], ...]`
    Flat(Vec<GeoPoint>),
    /// `[[[lat, lon], ...], ...]` or `[{"lat": .., "lon": ..}, ...]`; only the
    /// first element is read.
    Nested(Vec<GeoPoint>),
    /// `{"lat": .., "lon": ..}`
    Record(GeoPoint),
    Unrecognized,
}

impl PredictorOutput {
    /// Classify a JSON payload. Rows that are not valid coordinates are dropped.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Array(rows) if rows.iter().all(is_pair_row) => {
                PredictorOutput::Flat(rows.iter().filter_map(pair).collect())
            }
            Value::Array(rows) => match rows.first() {
                Some(Value::Array(inner)) => {
                    PredictorOutput::Nested(inner.iter().filter_map(pair).collect())
                }
                Some(first @ Value::Object(_)) => {
                    PredictorOutput::Nested(record(first).into_iter().collect())
                }
                _ => PredictorOutput::Unrecognized,
            },
            Value::Object(_) => match record(value) {
                Some(point) => PredictorOutput::Record(point),
                None => PredictorOutput::Unrecognized,
            },
            _ => PredictorOutput::Unrecognized,
        }
    }

    /// Flatten into at most `max` points, in predictor order.
    pub fn into_points(self, max: usize) -> Vec<GeoPoint> {
        let mut points = match self {
            PredictorOutput::Flat(points) | PredictorOutput::Nested(points) => points,
            PredictorOutput::Record(point) => vec![point],
            PredictorOutput::Unrecognized => Vec::new(),
        };
        points.truncate(max);
        points
    }
}

fn is_pair_row(value: &Value) -> bool {
    matches!(value, Value::Array(row) if row.len() >= 2 && row[0].is_number() && row[1].is_number())
}

fn pair(value: &Value) -> Option<GeoPoint> {
    let row = value.as_array()?;
    if row.len() < 2 {
        return None;
    }
    GeoPoint::new(row[0].as_f64()?, row[1].as_f64()?)
}

fn record(value: &Value) -> Option<GeoPoint> {
    let lat = value.get("lat")?.as_f64()?;
    let lon = value.get("lon")?.as_f64()?;
    GeoPoint::new(lat, lon)
}

/// An image-to-coordinates model.
#[async_trait]
pub trait Predictor: Send + Sync {
    async fn predict(
        &self,
        model: &ModelInfo,
        image: &DecodedImage,
        batch_size: usize,
    ) -> Result<PredictorOutput, PredictionError>;
}

/// Client for a predictor served over HTTP.
///
/// Sends `{model, image, mime_type, batch_size}` and accepts either the
/// coordinate payload itself or an object wrapping it under `predictions`.
pub struct HttpPredictor {
    http: Client,
    endpoint: String,
    api_token: Option<String>,
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    model: &'a str,
    image: String,
    mime_type: &'a str,
    batch_size: usize,
}

impl HttpPredictor {
    pub fn new(
        endpoint: &str,
        api_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, PredictionError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            api_token,
        })
    }
}

#[async_trait]
impl Predictor for HttpPredictor {
    async fn predict(
        &self,
        model: &ModelInfo,
        image: &DecodedImage,
        batch_size: usize,
    ) -> Result<PredictorOutput, PredictionError> {
        let body = PredictRequest {
            model: model.id,
            image: base64::engine::general_purpose::STANDARD.encode(&image.bytes),
            mime_type: image.mime_type(),
            batch_size,
        };

        let mut request = self.http.post(&self.endpoint).json(&body);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(PredictionError::Http)?;
        if !response.status().is_success() {
            return Err(PredictionError::Status(response.status().as_u16()));
        }

        let payload: Value = response.json().await.map_err(PredictionError::Http)?;
        let payload = match payload.get("predictions") {
            Some(inner) if payload.get("lat").is_none() => inner,
            _ => &payload,
        };

        Ok(PredictorOutput::from_value(payload))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PredictionError {
    #[error("Predictor request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Predictor returned HTTP {0}")]
    Status(u16),

    #[error("Predictor failed: {0}")]
    Model(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::matchers::{all_of, json_decoded, request};
    use httptest::responders::{json_encoded, status_code};
    use httptest::{Expectation, Server};
    use serde_json::json;

    fn p(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint { lat, lon }
    }

    fn tiny_image() -> DecodedImage {
        DecodedImage {
            bytes: vec![0x89, b'P', b'N', b'G'],
            format: image::ImageFormat::Png,
            width: 1,
            height: 1,
        }
    }

    #[test]
    fn test_model_catalog() {
        assert!(find_model(DEFAULT_MODEL).is_some());
        assert!(find_model("nicolas-dufour/PLONK_OSV_5M").is_some());
        assert!(find_model("someone/else").is_none());
        assert_eq!(MODELS.len(), 3);
    }

    #[test]
    fn test_flat_rows() {
        let output = PredictorOutput::from_value(&json!([[48.8, 2.3], [40.7, -74.0], [35.6, 139.7]]));
        assert_eq!(
            output,
            PredictorOutput::Flat(vec![p(48.8, 2.3), p(40.7, -74.0), p(35.6, 139.7)])
        );
    }

    #[test]
    fn test_nested_rows_use_first_batch() {
        let output = PredictorOutput::from_value(&json!([
            [[1.0, 2.0], [3.0], [5.0, 6.0, 0.9]],
            [[7.0, 8.0]]
        ]));
        assert_eq!(output, PredictorOutput::Nested(vec![p(1.0, 2.0), p(5.0, 6.0)]));
    }

    #[test]
    fn test_nested_record() {
        let output = PredictorOutput::from_value(&json!([{ "lat": 12.5, "lon": -3.25 }]));
        assert_eq!(output, PredictorOutput::Nested(vec![p(12.5, -3.25)]));
    }

    #[test]
    fn test_single_record() {
        let output = PredictorOutput::from_value(&json!({ "lat": -33.86, "lon": 151.2 }));
        assert_eq!(output, PredictorOutput::Record(p(-33.86, 151.2)));
    }

    #[test]
    fn test_unrecognized_shapes_fail_closed() {
        for value in [
            json!("48.8,2.3"),
            json!(42),
            json!({ "latitude": 1.0, "longitude": 2.0 }),
            json!(["a", "b"]),
            json!(null),
        ] {
            let output = PredictorOutput::from_value(&value);
            assert!(output.clone().into_points(10).is_empty(), "{value}");
        }
    }

    #[test]
    fn test_invalid_coordinates_dropped() {
        let output = PredictorOutput::from_value(&json!([[95.0, 0.0], [10.0, 10.0], [0.0, 200.0]]));
        assert_eq!(output.into_points(10), vec![p(10.0, 10.0)]);
    }

    #[test]
    fn test_truncates_to_max() {
        let rows: Vec<Value> = (0..100).map(|i| json!([i as f64 * 0.5, 1.0])).collect();
        let points = PredictorOutput::from_value(&Value::Array(rows)).into_points(65);
        assert_eq!(points.len(), 65);
        assert_eq!(points[0], p(0.0, 1.0));
        assert_eq!(PredictorOutput::Record(p(1.0, 1.0)).into_points(0), Vec::new());
    }

    #[tokio::test]
    async fn test_http_predictor_sends_model_and_batch_size() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/predict"),
                request::body(json_decoded(|body: &Value| {
                    body["model"] == "nicolas-dufour/PLONK_YFCC" && body["batch_size"] == 1024
                })),
            ])
            .respond_with(json_encoded(json!({ "predictions": [[1.0, 2.0], [3.0, 4.0]] }))),
        );

        let predictor = HttpPredictor::new(
            &server.url_str("/predict"),
            None,
            Duration::from_secs(5),
        )
        .unwrap();
        let model = find_model(DEFAULT_MODEL).unwrap();
        let output = predictor.predict(model, &tiny_image(), 1024).await.unwrap();
        assert_eq!(output, PredictorOutput::Flat(vec![p(1.0, 2.0), p(3.0, 4.0)]));
    }

    #[tokio::test]
    async fn test_http_predictor_maps_server_errors() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/predict"))
                .respond_with(status_code(503)),
        );

        let predictor = HttpPredictor::new(
            &server.url_str("/predict"),
            Some("token".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();
        let model = find_model(DEFAULT_MODEL).unwrap();
        let err = predictor.predict(model, &tiny_image(), 1024).await.unwrap_err();
        assert!(matches!(err, PredictionError::Status(503)));
    }
}
