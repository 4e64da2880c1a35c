//! Spiderfier - fans a cluster out into individually clickable markers
//!
//! Activating a multi-member cluster either zooms the camera towards it (while
//! zooming still separates the members) or, at close zoom, lays the members out
//! on a circle around the cluster's screen position.

use crate::{Cluster, ClusterConfig, ConnectorKind, ConnectorLine, GeoPoint, LatLng, utils};
use geo::Coord;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One member of an expanded cluster
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpiderMarker {
    pub point: GeoPoint,
    /// Counter-clockwise from east, in degrees
    pub angle_degrees: f64,
    /// Where the marker is drawn
    pub position: LatLng,
}

/// A cluster currently expanded into a fan
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpiderfiedGroup {
    pub cluster_id: String,
    pub center: LatLng,
    /// Zoom the fan was laid out for
    pub zoom: f64,
    pub spider_markers: Vec<SpiderMarker>,
    pub connector_lines: Vec<ConnectorLine>,
}

impl SpiderfiedGroup {
    /// The fan marker for `point_id`, if it belongs to this fan
    pub fn marker(&self, point_id: &str) -> Option<&SpiderMarker> {
        self.spider_markers.iter().find(|m| m.point.id == point_id)
    }

    #[inline]
    pub fn contains(&self, point_id: &str) -> bool {
        self.marker(point_id).is_some()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.spider_markers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.spider_markers.is_empty()
    }
}

/// What activating a cluster marker should do
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "action", rename_all = "snake_case"))]
pub enum ClusterActivation {
    /// Singleton: behaves like a plain marker click
    Select { point_id: String },
    /// Expand in place
    Spiderfy(SpiderfiedGroup),
    /// Move the camera; the host re-clusters once the view settles
    ZoomTo { center: LatLng, zoom: f64 },
}

/// Lay out a multi-member cluster on a circle; `None` for singletons
///
/// Members keep their cluster order and are spaced `360° / n` apart starting
/// at 0° (east).
pub fn spiderfy(cluster: &Cluster, zoom: f64, config: &ClusterConfig) -> Option<SpiderfiedGroup> {
    #[cfg(feature = "profiling")]
    profiling::scope!("spider::spiderfy");

    if cluster.is_singleton() {
        return None;
    }

    let origin = utils::to_world_pixels(cluster.center, zoom);
    let step = 360.0 / cluster.len() as f64;

    let spider_markers: Vec<SpiderMarker> = cluster
        .members
        .iter()
        .enumerate()
        .map(|(i, point)| {
            let angle_degrees = step * i as f64;
            let angle = angle_degrees.to_radians();
            let pixel = Coord {
                x: origin.x + config.spider_radius_px * angle.cos(),
                y: origin.y + config.spider_radius_px * angle.sin(),
            };
            SpiderMarker {
                point: point.clone(),
                angle_degrees,
                position: utils::from_world_pixels(pixel, zoom),
            }
        })
        .collect();

    let connector_lines = spider_markers
        .iter()
        .map(|m| ConnectorLine {
            from: cluster.center,
            to: m.position,
            kind: ConnectorKind::Spider,
        })
        .collect();

    tracing::debug!(
        cluster = %cluster.id,
        members = cluster.len(),
        "Spiderfied cluster"
    );

    Some(SpiderfiedGroup {
        cluster_id: cluster.id.clone(),
        center: cluster.center,
        zoom,
        spider_markers,
        connector_lines,
    })
}

/// Collapse a fan, handing back the id of the cluster marker to restore
pub fn unspiderfy(group: SpiderfiedGroup) -> String {
    tracing::debug!(cluster = %group.cluster_id, "Collapsed spiderfied cluster");
    group.cluster_id
}

/// Zoom level at which `cluster` would no longer hold together
///
/// Walks integer zoom levels above `zoom` (negative zoom counts as 0) and
/// returns the first one whose half-threshold is smaller than the cluster's
/// spread, capped at the spiderfy tier.
pub fn separating_zoom(cluster: &Cluster, zoom: f64, config: &ClusterConfig) -> f64 {
    if !zoom.is_finite() {
        return config.spiderfy_zoom;
    }
    let zoom = zoom.max(0.0);
    let spread = cluster.spread();
    let mut level = zoom.floor() + 1.0;
    while level < config.spiderfy_zoom {
        if config.thresholds.threshold_at(level) / 2.0 < spread {
            return level;
        }
        level += 1.0;
    }
    config.spiderfy_zoom.max(zoom.floor() + 1.0)
}

/// Decide what activating `cluster` at `zoom` does
pub fn activate(cluster: &Cluster, zoom: f64, config: &ClusterConfig) -> ClusterActivation {
    if cluster.is_singleton() {
        return ClusterActivation::Select {
            point_id: cluster.center_point().id.clone(),
        };
    }
    if zoom >= config.spiderfy_zoom {
        if let Some(group) = spiderfy(cluster, zoom, config) {
            return ClusterActivation::Spiderfy(group);
        }
    }
    ClusterActivation::ZoomTo {
        center: cluster.center,
        zoom: separating_zoom(cluster, zoom, config),
    }
}
