//! One inspection run: load, cluster, replay clicks, report

use crate::CliError;
use crate::settings::{MAP_CLICK, Settings};
use course_map_lib::{
    ClickOutcome, ClusterConfig, FrameDiff, GeoBounds, IngestReport, InteractionSnapshot, LatLng,
    MarkerLayer, PassStats, PointSet, RawGeoPoint, RenderFrame,
};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Everything printed by the inspector
#[derive(Debug, Serialize)]
pub struct Report {
    pub ingest: IngestReport,
    pub stats: PassStats,
    pub events: Vec<EventRecord>,
    pub interaction: InteractionSnapshot,
    pub frame: RenderFrame,
}

/// One replayed click
#[derive(Debug, Serialize)]
pub struct EventRecord {
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ClickOutcome>,
    pub diff: FrameDiff,
}

pub fn load_points(path: &Path) -> Result<Vec<RawGeoPoint>, CliError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

pub fn load_config(settings: &Settings) -> Result<ClusterConfig, CliError> {
    let mut config = match &settings.config {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => ClusterConfig::default(),
    };
    settings.apply_overrides(&mut config);
    Ok(config)
}

/// Run one pass over `rows` and replay the requested clicks
pub fn inspect(
    rows: Vec<RawGeoPoint>,
    config: ClusterConfig,
    settings: &Settings,
) -> Result<Report, CliError> {
    let mut layer = MarkerLayer::new(config)?;
    let points = PointSet::ingest(rows);
    let ingest = points.report().clone();

    layer.set_view(settings.zoom, settings.bbox);
    layer.set_points(points);
    tracing::info!(
        markers = layer.frame().markers.len(),
        clusters = layer.stats().clusters,
        singletons = layer.stats().singletons,
        "Initial pass at zoom {}",
        settings.zoom
    );

    let mut events = Vec::with_capacity(settings.clicks.len());
    for target in &settings.clicks {
        let record = if target == MAP_CLICK {
            EventRecord {
                target: target.clone(),
                outcome: None,
                diff: layer.click_map(),
            }
        } else {
            let (outcome, mut diff) = layer.click_marker(target)?;
            if let ClickOutcome::ZoomTo { center, zoom } = &outcome {
                // Act as the host: move the camera, then re-cluster
                let viewport = layer
                    .viewport()
                    .map(|bounds| zoomed_viewport(bounds, *center, zoom - layer.zoom()));
                diff = layer.set_view(*zoom, viewport);
            }
            EventRecord {
                target: target.clone(),
                outcome: Some(outcome),
                diff,
            }
        };
        tracing::info!(
            marker = %record.target,
            added = record.diff.added.len(),
            removed = record.diff.removed.len(),
            changed = record.diff.changed.len(),
            "Replayed click"
        );
        events.push(record);
    }

    Ok(Report {
        ingest,
        stats: layer.stats().clone(),
        events,
        interaction: layer.interaction_snapshot(),
        frame: layer.frame().clone(),
    })
}

/// Viewport after zooming in by `zoom_delta` levels around `center`
fn zoomed_viewport(bounds: &GeoBounds, center: LatLng, zoom_delta: f64) -> GeoBounds {
    let factor = 0.5f64.powf(zoom_delta);
    let half_lat = (bounds.north - bounds.south) * factor / 2.0;
    let half_lng = (bounds.east - bounds.west) * factor / 2.0;
    GeoBounds::new(
        center.lat - half_lat,
        center.lng - half_lng,
        center.lat + half_lat,
        center.lng + half_lng,
    )
}
