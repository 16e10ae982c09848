//! Great-circle distance and the accuracy curve used in test mode.

use crate::models::analysis::{ConsensusPoint, ScoredPoint, TestSummary};
use crate::models::location::GeoPoint;

/// Mean Earth radius in kilometres.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two coordinates, in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Map a distance error to a 0-100 score.
///
/// Piecewise linear, each segment clamped at its floor:
/// exact hit → 100, under 1 km → ≥90, under 10 km → ≥70,
/// under 100 km → ≥30, under 1000 km → ≥5, beyond → ≥0.
pub fn accuracy_percent(distance_km: f64) -> f64 {
    let d = distance_km;
    if d.is_nan() {
        return 0.0;
    }
    if d <= 0.0 {
        100.0
    } else if d < 1.0 {
        (100.0 - d * 10.0).max(90.0)
    } else if d < 10.0 {
        (90.0 - (d - 1.0) * 2.2).max(70.0)
    } else if d < 100.0 {
        (70.0 - (d - 10.0) * 0.44).max(30.0)
    } else if d < 1000.0 {
        (30.0 - (d - 100.0) * 0.028).max(5.0)
    } else {
        (5.0 - (d - 1000.0) * 0.001).max(0.0)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Score one predicted point against the true coordinate.
pub fn score_point(predicted: GeoPoint, truth: GeoPoint) -> ScoredPoint {
    let distance = haversine_km(truth.lat, truth.lon, predicted.lat, predicted.lon);
    ScoredPoint {
        predicted_lat: predicted.lat,
        predicted_lon: predicted.lon,
        distance_km: round2(distance),
        accuracy_percent: round2(accuracy_percent(distance)),
    }
}

pub fn score_results(results: &[ConsensusPoint], truth: GeoPoint) -> Vec<ScoredPoint> {
    results
        .iter()
        .map(|result| score_point(result.coordinates, truth))
        .collect()
}

/// Average and best accuracy plus closest distance. `None` for an empty set.
pub fn summarize(scored: &[ScoredPoint]) -> Option<TestSummary> {
    if scored.is_empty() {
        return None;
    }

    let total: f64 = scored.iter().map(|s| s.accuracy_percent).sum();
    let best = scored
        .iter()
        .map(|s| s.accuracy_percent)
        .fold(f64::NEG_INFINITY, f64::max);
    let nearest = scored
        .iter()
        .map(|s| s.distance_km)
        .fold(f64::INFINITY, f64::min);

    Some(TestSummary {
        average_accuracy: round2(total / scored.len() as f64),
        best_accuracy: round2(best),
        minimum_distance_km: round2(nearest),
    })
}
