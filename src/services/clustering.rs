//! Consensus clustering of predicted points.
//!
//! Greedy single pass: each point joins the first existing cluster (in
//! creation order) whose centroid lies within `tolerance` degrees on both
//! axes, otherwise it opens a new cluster. The result depends on input
//! order and is not a nearest-centroid assignment.

use crate::models::analysis::ConsensusPoint;
use crate::models::location::GeoPoint;

/// Default per-axis merge tolerance in degrees (~1 km at the equator).
pub const DEFAULT_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone)]
struct Cluster {
    center: GeoPoint,
    count: usize,
    members: Vec<GeoPoint>,
}

impl Cluster {
    fn open(point: GeoPoint) -> Self {
        Self {
            center: point,
            count: 1,
            members: vec![point],
        }
    }

    fn accepts(&self, point: &GeoPoint, tolerance: f64) -> bool {
        (point.lat - self.center.lat).abs() <= tolerance
            && (point.lon - self.center.lon).abs() <= tolerance
    }

    fn merge(&mut self, point: GeoPoint) {
        let count = self.count as f64;
        let next = count + 1.0;
        self.center = GeoPoint {
            lat: (self.center.lat * count + point.lat) / next,
            lon: (self.center.lon * count + point.lon) / next,
        };
        self.count += 1;
        self.members.push(point);
    }
}

/// Return the `k` best-supported consensus locations, most supported first.
///
/// Ties keep cluster creation order.
pub fn find_most_frequent_positions(
    points: &[GeoPoint],
    k: usize,
    tolerance: f64,
) -> Vec<ConsensusPoint> {
    let mut clusters: Vec<Cluster> = Vec::new();

    for &point in points {
        match clusters.iter_mut().find(|c| c.accepts(&point, tolerance)) {
            Some(cluster) => cluster.merge(point),
            None => clusters.push(Cluster::open(point)),
        }
    }

    // sort_by is stable
    clusters.sort_by(|a, b| b.count.cmp(&a.count));

    clusters
        .into_iter()
        .take(k)
        .map(|cluster| ConsensusPoint {
            coordinates: cluster.center,
            confidence: cluster.count,
            total_points: cluster.members.len(),
        })
        .collect()
}
