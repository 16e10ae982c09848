use std::fmt;

use dashmap::DashMap;

use crate::models::location::{GeoPoint, LocationInfo};

/// A ~100 m cell: latitude and longitude rounded to 3 decimal places,
/// stored as thousandths of a degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellKey {
    lat_milli: i64,
    lon_milli: i64,
}

impl CellKey {
    pub fn for_point(point: GeoPoint) -> Self {
        Self {
            lat_milli: (point.lat * 1000.0).round() as i64,
            lon_milli: (point.lon * 1000.0).round() as i64,
        }
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.3},{:.3}",
            self.lat_milli as f64 / 1000.0,
            self.lon_milli as f64 / 1000.0
        )
    }
}

/// Resolved location labels keyed by cell.
///
/// Entries are written once and never evicted. Only accepted provider
/// results belong here, never placeholders.
#[derive(Debug, Default)]
pub struct GeocodeCache {
    entries: DashMap<CellKey, LocationInfo>,
}

impl GeocodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CellKey) -> Option<LocationInfo> {
        self.entries.get(key).map(|entry| entry.clone())
    }

    /// Store `info` unless the cell is already resolved; returns the stored value.
    pub fn insert(&self, key: CellKey, info: LocationInfo) -> LocationInfo {
        self.entries.entry(key).or_insert(info).clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
