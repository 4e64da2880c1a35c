//! Tunable constants for clustering, collision handling and interaction
//!
//! Nothing here is read from the environment. Hosts build a [`ClusterConfig`]
//! (usually `ClusterConfig::default()` with a few overrides) and hand it to the
//! [`MarkerLayer`](crate::MarkerLayer), which validates it once.

use crate::{LatLng, MapError, Result};
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One step of the zoom → distance table
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ZoomThreshold {
    /// Highest integer zoom level this step applies to
    pub max_zoom: u8,
    /// Maximum seed-to-member distance inside a cluster, in meters
    pub meters: f64,
}

/// Step function from zoom level to clustering distance
///
/// Zoom levels past the last step have a threshold of zero, meaning every
/// point is its own singleton.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ThresholdTable {
    steps: Vec<ZoomThreshold>,
}

impl ThresholdTable {
    /// Build a table, rejecting steps that are unordered or not non-increasing
    pub fn new(steps: Vec<ZoomThreshold>) -> Result<Self> {
        let table = Self { steps };
        table.validate()?;
        Ok(table)
    }

    fn validate(&self) -> Result<()> {
        for step in &self.steps {
            if !step.meters.is_finite() || step.meters < 0.0 {
                return Err(MapError::InvalidConfig(format!(
                    "threshold for zoom {} must be a non-negative distance, got {}",
                    step.max_zoom, step.meters
                )));
            }
        }
        for pair in self.steps.windows(2) {
            if pair[1].max_zoom <= pair[0].max_zoom {
                return Err(MapError::InvalidConfig(format!(
                    "threshold steps must have increasing zoom levels ({} after {})",
                    pair[1].max_zoom, pair[0].max_zoom
                )));
            }
            if pair[1].meters > pair[0].meters {
                return Err(MapError::InvalidConfig(format!(
                    "threshold must not grow with zoom ({} m at zoom {} after {} m at zoom {})",
                    pair[1].meters, pair[1].max_zoom, pair[0].meters, pair[0].max_zoom
                )));
            }
        }
        Ok(())
    }

    /// Clustering distance in meters at `zoom` (fractional zoom rounds down)
    pub fn threshold_at(&self, zoom: f64) -> f64 {
        let level = zoom.floor().max(0.0);
        self.steps
            .iter()
            .find(|step| level <= step.max_zoom as f64)
            .map(|step| step.meters)
            .unwrap_or(0.0)
    }

    /// First zoom level where clustering is disabled
    pub fn max_zoom_tier(&self) -> u8 {
        self.steps
            .iter()
            .rev()
            .find(|step| step.meters > 0.0)
            .map(|step| step.max_zoom.saturating_add(1))
            .unwrap_or(0)
    }

    #[inline]
    pub fn steps(&self) -> &[ZoomThreshold] {
        &self.steps
    }
}

impl Default for ThresholdTable {
    fn default() -> Self {
        const KM: f64 = 1000.0;
        let steps = [
            (3, 800.0 * KM),
            (4, 400.0 * KM),
            (5, 200.0 * KM),
            (6, 100.0 * KM),
            (7, 50.0 * KM),
            (8, 25.0 * KM),
            (9, 12.0 * KM),
            (10, 6.0 * KM),
            (11, 3.0 * KM),
            (12, 1.5 * KM),
            (13, 0.75 * KM),
            (14, 0.4 * KM),
        ];
        Self {
            steps: steps
                .into_iter()
                .map(|(max_zoom, meters)| ZoomThreshold { max_zoom, meters })
                .collect(),
        }
    }
}

/// Axis-aligned latitude/longitude box (no antimeridian wrapping)
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeoBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl GeoBounds {
    pub const fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }

    /// Inclusive containment test
    #[inline]
    pub fn contains(&self, position: LatLng) -> bool {
        position.lat >= self.south
            && position.lat <= self.north
            && position.lng >= self.west
            && position.lng <= self.east
    }

    /// Grow each side by `ratio` of the box's span
    pub fn padded(&self, ratio: f64) -> Self {
        let lat_pad = (self.north - self.south) * ratio;
        let lng_pad = (self.east - self.west) * ratio;
        Self {
            south: self.south - lat_pad,
            west: self.west - lng_pad,
            north: self.north + lat_pad,
            east: self.east + lng_pad,
        }
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        !(self.south < self.north && self.west < self.east)
    }
}

/// Named open-water rectangle where a cluster center is never accepted
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WaterZone {
    pub name: String,
    pub bounds: GeoBounds,
}

impl WaterZone {
    pub fn new(name: impl Into<String>, bounds: GeoBounds) -> Self {
        Self {
            name: name.into(),
            bounds,
        }
    }
}

/// Linear icon scale between two zoom levels, clamped outside them
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IconScaleCurve {
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub min_scale: f64,
    pub max_scale: f64,
}

impl Default for IconScaleCurve {
    fn default() -> Self {
        Self {
            min_zoom: 4.0,
            max_zoom: 16.0,
            min_scale: 0.5,
            max_scale: 1.25,
        }
    }
}

/// Every tunable of the map engine
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ClusterConfig {
    /// Zoom → maximum seed-to-member distance
    pub thresholds: ThresholdTable,
    /// Fraction of the half-threshold within which some member must sit
    /// near the center for a cluster to count as local
    pub locality_ratio: f64,
    /// Region the service covers; centers outside it are rejected
    pub service_bounds: GeoBounds,
    /// Open-water rectangles; centers inside them are rejected
    pub water_zones: Vec<WaterZone>,
    /// Viewport growth ratio; points beyond the padded viewport are not grouped
    pub viewport_padding: f64,
    /// Icon diameter in pixels at scale 1.0
    pub icon_base_size_px: f64,
    pub icon_scale: IconScaleCurve,
    /// Below this zoom, overlapping singletons are left alone
    pub collision_min_zoom: f64,
    /// Two markers conflict below this many icon diameters apart
    pub collision_conflict_factor: f64,
    /// Displacement circle radius, in icon diameters
    pub collision_separation_factor: f64,
    /// At or above this zoom, activating a cluster fans it out instead of zooming
    pub spiderfy_zoom: f64,
    /// Fan radius in pixels
    pub spider_radius_px: f64,
    /// Delay before a hover preview appears
    pub hover_delay_ms: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            thresholds: ThresholdTable::default(),
            locality_ratio: 0.4,
            service_bounds: GeoBounds::new(15.0, -170.0, 72.0, -50.0),
            water_zones: vec![
                WaterZone::new("Gulf of Mexico", GeoBounds::new(22.0, -95.0, 28.5, -84.5)),
                WaterZone::new("Western Atlantic", GeoBounds::new(25.0, -72.0, 40.0, -50.0)),
                WaterZone::new("Eastern Pacific", GeoBounds::new(15.0, -150.0, 48.0, -126.0)),
                WaterZone::new("Hudson Bay", GeoBounds::new(56.5, -94.0, 63.0, -80.0)),
            ],
            viewport_padding: 0.25,
            icon_base_size_px: 32.0,
            icon_scale: IconScaleCurve::default(),
            collision_min_zoom: 11.0,
            collision_conflict_factor: 1.5,
            collision_separation_factor: 2.0,
            spiderfy_zoom: 13.0,
            spider_radius_px: 48.0,
            hover_delay_ms: 175,
        }
    }
}

impl ClusterConfig {
    #[inline]
    pub fn hover_delay(&self) -> Duration {
        Duration::from_millis(self.hover_delay_ms)
    }

    /// Check every field; deserialized configs skip the table constructor
    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate()?;

        let positive = [
            ("icon_base_size_px", self.icon_base_size_px),
            ("collision_conflict_factor", self.collision_conflict_factor),
            ("collision_separation_factor", self.collision_separation_factor),
            ("spider_radius_px", self.spider_radius_px),
            ("icon_scale.min_scale", self.icon_scale.min_scale),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(MapError::InvalidConfig(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.locality_ratio) {
            return Err(MapError::InvalidConfig(format!(
                "locality_ratio must be within [0, 1], got {}",
                self.locality_ratio
            )));
        }
        if !self.viewport_padding.is_finite() || self.viewport_padding < 0.0 {
            return Err(MapError::InvalidConfig(format!(
                "viewport_padding must be non-negative, got {}",
                self.viewport_padding
            )));
        }
        if self.icon_scale.max_zoom <= self.icon_scale.min_zoom
            || self.icon_scale.max_scale < self.icon_scale.min_scale
        {
            return Err(MapError::InvalidConfig(
                "icon_scale must span an increasing zoom and scale range".to_string(),
            ));
        }
        if self.service_bounds.is_empty() {
            return Err(MapError::InvalidConfig(
                "service_bounds must not be empty".to_string(),
            ));
        }
        if let Some(zone) = self.water_zones.iter().find(|z| z.bounds.is_empty()) {
            return Err(MapError::InvalidConfig(format!(
                "water zone {:?} has empty bounds",
                zone.name
            )));
        }
        Ok(())
    }

    /// Whether a cluster center may be placed at `position`
    ///
    /// Returns the name of the offending water zone, if any.
    pub fn water_zone_at(&self, position: LatLng) -> Option<&str> {
        self.water_zones
            .iter()
            .find(|zone| zone.bounds.contains(position))
            .map(|zone| zone.name.as_str())
    }
}
