//! Course Map Library - Marker Clustering and Interaction for Course Maps
//!
//! This library decides how a set of course locations is drawn on a slippy map at
//! a given zoom: which points merge into cluster badges, where overlapping
//! markers are pushed so that each stays clickable, how a cluster fans out when
//! activated at close zoom, and how hover previews and click selections
//! interact. Rendering and tile drawing are left to the host.
//!
//! # Architecture
//!
//! - **[`PointSet`]**: Validated snapshot of course locations (outliers and drops reported)
//! - **[`ClusterConfig`]**: Zoom thresholds, service area, water zones and UI tuning
//! - **[`build_clusters`]**: Greedy, validated, deterministic clustering pass
//! - **[`resolve_collisions`]**: Screen-space displacement of overlapping markers
//! - **[`spiderfy`]**: Circular fan layout for an activated cluster
//! - **[`InteractionMachine`]**: Debounced hover / click state machine
//! - **[`MarkerLayer`]**: Stateful shell producing declarative [`RenderFrame`]s
//!
//! # Performance Characteristics
//!
//! - **Clustering**: O(N²) worst case per pass, O(N) when every point is isolated
//! - **Collisions**: O(S²) over the S singletons, only at close zoom
//! - **Memory**: O(N); every pass is recomputed from scratch

mod cluster;
mod collision;
mod config;
mod icon;
mod interaction;
mod layer;
mod point;
mod spider;
pub mod utils;

// Public API exports
pub use cluster::{
    CLUSTER_ID_PREFIX, CenterRejection, Cluster, PassStats, build_clusters,
    build_clusters_with_stats, validate_center,
};
pub use collision::{Displacement, resolve_collisions};
pub use config::{
    ClusterConfig, GeoBounds, IconScaleCurve, ThresholdTable, WaterZone, ZoomThreshold,
};
pub use icon::{IconDescriptor, IconVariant, cluster_icon, icon_diameter_px, icon_for, icon_scale};
pub use interaction::{HoverTimer, InteractionMachine, InteractionSnapshot, InteractionState};
pub use layer::{
    ClickOutcome, FrameDiff, MarkerKind, MarkerLayer, MarkerPlacement, RenderFrame, StatusSink,
};
pub use point::{
    Category, ConnectorKind, ConnectorLine, GeoPoint, IngestReport, LatLng, PointSet,
    RawCoordinate, RawGeoPoint, StatusTag,
};
pub use spider::{
    ClusterActivation, SpiderMarker, SpiderfiedGroup, activate, separating_zoom, spiderfy,
    unspiderfy,
};

/// Error types for the map layer
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown marker: {0}")]
    UnknownMarker(String),

    #[error("No course is selected")]
    NothingSelected,

    #[error("Invalid coordinate for point {id}: {reason}")]
    InvalidCoordinate { id: String, reason: String },
}

pub type Result<T> = std::result::Result<T, MapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_exports() {
        // Verify that all public types are accessible
        let _: fn(ClusterConfig) -> Result<MarkerLayer> = MarkerLayer::new;
        let _: fn() -> ClusterConfig = ClusterConfig::default;
        let _: fn(GeoPoint) -> Cluster = Cluster::singleton;
    }

    #[test]
    fn test_error_messages() {
        let err = MapError::InvalidCoordinate {
            id: "c1".to_string(),
            reason: "latitude is not a number".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid coordinate for point c1: latitude is not a number"
        );
        assert_eq!(MapError::NothingSelected.to_string(), "No course is selected");
    }
}
