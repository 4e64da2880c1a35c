//! MarkerLayer - the stateful shell around the pure clustering functions
//!
//! Holds the latest point snapshot and view, recomputes clusters and collision
//! offsets from scratch whenever either changes, and turns the result into a
//! declarative [`RenderFrame`]. Every frame replaces the previous one as a
//! whole; [`FrameDiff`] tells the renderer which markers to add, drop or move.
//!
//! Pointer and click events are routed here so that fan expansion and the
//! hover/click state machine stay consistent with what is actually drawn.

use crate::{
    Cluster, ClusterActivation, ClusterConfig, ConnectorLine, Displacement, GeoBounds,
    HoverTimer, IconDescriptor, InteractionMachine, InteractionSnapshot, InteractionState, LatLng,
    MapError, PassStats, PointSet, Result, SpiderfiedGroup, StatusTag, build_clusters_with_stats,
    icon, resolve_collisions, spider,
};
use instant::Instant;
use std::collections::{HashMap, HashSet};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How a marker should be drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MarkerKind {
    /// Plain course marker
    Point,
    /// Course with out-of-range coordinates, never clustered
    Outlier,
    /// Multi-member cluster badge
    Cluster,
    /// Member of an expanded cluster
    Spider,
}

/// One marker the renderer should draw
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MarkerPlacement {
    pub marker_id: String,
    pub kind: MarkerKind,
    pub position: LatLng,
    pub icon: IconDescriptor,
    /// Member count shown on cluster badges
    pub badge: Option<usize>,
}

/// Everything to draw for the current view
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RenderFrame {
    pub zoom: f64,
    pub markers: Vec<MarkerPlacement>,
    pub connectors: Vec<ConnectorLine>,
}

impl RenderFrame {
    pub fn marker(&self, marker_id: &str) -> Option<&MarkerPlacement> {
        self.markers.iter().find(|m| m.marker_id == marker_id)
    }
}

/// Marker-level changes between two frames
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FrameDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    /// Still present, but moved or restyled
    pub changed: Vec<String>,
    pub connectors_changed: bool,
}

impl FrameDiff {
    pub fn between(old: &RenderFrame, new: &RenderFrame) -> Self {
        let previous: HashMap<&str, &MarkerPlacement> = old
            .markers
            .iter()
            .map(|m| (m.marker_id.as_str(), m))
            .collect();
        let current: HashSet<&str> = new.markers.iter().map(|m| m.marker_id.as_str()).collect();

        let mut diff = Self::default();
        for marker in &new.markers {
            match previous.get(marker.marker_id.as_str()) {
                None => diff.added.push(marker.marker_id.clone()),
                Some(&before) if before != marker => diff.changed.push(marker.marker_id.clone()),
                Some(_) => {}
            }
        }
        diff.removed = old
            .markers
            .iter()
            .filter(|m| !current.contains(m.marker_id.as_str()))
            .map(|m| m.marker_id.clone())
            .collect();
        diff.connectors_changed = old.connectors != new.connectors;
        diff
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.changed.is_empty()
            && !self.connectors_changed
    }
}

/// Result of clicking a marker
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "outcome", rename_all = "snake_case"))]
pub enum ClickOutcome {
    /// A course was selected; its detail panel should open
    Selected { point_id: String },
    /// A cluster was fanned out in place
    Spiderfied { cluster_id: String, members: usize },
    /// The host should move the camera and then call [`MarkerLayer::set_view`]
    ZoomTo { center: LatLng, zoom: f64 },
}

/// Receiver for status picks made in the detail panel
pub trait StatusSink {
    fn status_changed(&mut self, point_id: &str, status: StatusTag);
}

impl<F> StatusSink for F
where
    F: FnMut(&str, StatusTag),
{
    fn status_changed(&mut self, point_id: &str, status: StatusTag) {
        self(point_id, status)
    }
}

/// Map marker state for one map instance
#[derive(Debug, Clone)]
pub struct MarkerLayer {
    config: ClusterConfig,
    points: PointSet,
    zoom: f64,
    viewport: Option<GeoBounds>,
    clusters: Vec<Cluster>,
    outlier_ids: HashSet<String>,
    displacements: Vec<Displacement>,
    spider: Option<SpiderfiedGroup>,
    interaction: InteractionMachine,
    frame: RenderFrame,
    stats: PassStats,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl MarkerLayer {
    /// Create an empty layer at zoom 0 with no viewport restriction
    pub fn new(config: ClusterConfig) -> Result<Self> {
        config.validate()?;
        let interaction = InteractionMachine::new(config.hover_delay());
        Ok(Self {
            config,
            points: PointSet::default(),
            zoom: 0.0,
            viewport: None,
            clusters: Vec::new(),
            outlier_ids: HashSet::new(),
            displacements: Vec::new(),
            spider: None,
            interaction,
            frame: RenderFrame::default(),
            stats: PassStats::default(),
        })
    }

    /// Replace the point snapshot and recompute everything
    pub fn set_points(&mut self, points: PointSet) -> FrameDiff {
        self.points = points;
        self.recluster()
    }

    /// Move the camera; a no-op when nothing changed
    ///
    /// A non-finite zoom is ignored and a negative one is treated as 0.
    pub fn set_view(&mut self, zoom: f64, viewport: Option<GeoBounds>) -> FrameDiff {
        if !zoom.is_finite() {
            tracing::warn!("Ignoring view change to non-finite zoom {}", zoom);
            return FrameDiff::default();
        }
        let zoom = zoom.max(0.0);
        if zoom == self.zoom && viewport == self.viewport {
            return FrameDiff::default();
        }
        self.zoom = zoom;
        self.viewport = viewport;
        self.recluster()
    }

    fn recluster(&mut self) -> FrameDiff {
        #[cfg(feature = "profiling")]
        profiling::scope!("layer::recluster");

        self.collapse_fan();

        let (mut clusters, stats) = build_clusters_with_stats(
            self.points.points(),
            self.zoom,
            self.viewport.as_ref(),
            &self.config,
        );
        clusters.extend(self.points.outliers().iter().cloned().map(Cluster::singleton));
        self.outlier_ids = self.points.outliers().iter().map(|p| p.id.clone()).collect();

        // Only markers inside the padded viewport are pushed apart
        let region = self
            .viewport
            .map(|v| v.padded(self.config.viewport_padding));
        self.displacements = resolve_collisions(
            clusters
                .iter()
                .filter(|c| c.is_singleton())
                .map(|c| (c.id.as_str(), c.center.clamped()))
                .filter(|(_, position)| region.is_none_or(|r| r.contains(*position))),
            self.zoom,
            &self.config,
        );
        self.clusters = clusters;
        self.stats = stats;

        self.rebuild_frame()
    }

    fn collapse_fan(&mut self) -> bool {
        match self.spider.take() {
            Some(group) => {
                spider::unspiderfy(group);
                true
            }
            None => false,
        }
    }

    fn rebuild_frame(&mut self) -> FrameDiff {
        let scale = icon::icon_scale(self.zoom, &self.config);
        let displaced: HashMap<&str, &Displacement> = self
            .displacements
            .iter()
            .map(|d| (d.marker_id.as_str(), d))
            .collect();

        let mut markers = Vec::with_capacity(self.clusters.len());
        let mut connectors = Vec::new();

        for cluster in &self.clusters {
            if let Some(group) = self.spider.as_ref().filter(|g| g.cluster_id == cluster.id) {
                markers.extend(group.spider_markers.iter().map(|m| MarkerPlacement {
                    marker_id: m.point.id.clone(),
                    kind: MarkerKind::Spider,
                    position: m.position,
                    icon: icon::icon_for(m.point.category, m.point.status, scale, &self.config),
                    badge: None,
                }));
                connectors.extend(group.connector_lines.iter().copied());
                continue;
            }

            if cluster.is_singleton() {
                let point = cluster.center_point();
                let kind = if self.outlier_ids.contains(&point.id) {
                    MarkerKind::Outlier
                } else {
                    MarkerKind::Point
                };
                let position = match displaced.get(cluster.id.as_str()) {
                    Some(displacement) => {
                        connectors.push(displacement.connector());
                        displacement.new_position
                    }
                    None => cluster.center.clamped(),
                };
                markers.push(MarkerPlacement {
                    marker_id: cluster.id.clone(),
                    kind,
                    position,
                    icon: icon::icon_for(point.category, point.status, scale, &self.config),
                    badge: None,
                });
            } else {
                markers.push(MarkerPlacement {
                    marker_id: cluster.id.clone(),
                    kind: MarkerKind::Cluster,
                    position: cluster.center,
                    icon: icon::cluster_icon(cluster.len(), scale, &self.config),
                    badge: Some(cluster.len()),
                });
            }
        }

        let frame = RenderFrame {
            zoom: self.zoom,
            markers,
            connectors,
        };
        let diff = FrameDiff::between(&self.frame, &frame);
        self.frame = frame;
        self.reconcile_interaction();
        diff
    }

    /// Drop selections of vanished points and hovers over undrawn markers
    fn reconcile_interaction(&mut self) {
        let points = &self.points;
        self.interaction.retain(|id| points.get(id).is_some());

        let hovered = match self.interaction.state() {
            InteractionState::HoverPending { marker_id, .. }
            | InteractionState::HoverShown { marker_id } => Some(marker_id.clone()),
            _ => None,
        };
        if let Some(marker_id) = hovered {
            if self.frame.marker(&marker_id).is_none() {
                self.interaction.clear_hover();
            }
        }
    }

    /// Click on a drawn marker
    pub fn click_marker(&mut self, marker_id: &str) -> Result<(ClickOutcome, FrameDiff)> {
        let in_fan = self
            .spider
            .as_ref()
            .is_some_and(|group| group.contains(marker_id));
        if in_fan {
            // Selecting a fan member wins, but the fan still closes
            self.collapse_fan();
            self.interaction.click(marker_id);
            let diff = self.rebuild_frame();
            return Ok((
                ClickOutcome::Selected {
                    point_id: marker_id.to_string(),
                },
                diff,
            ));
        }

        let cluster = self
            .clusters
            .iter()
            .find(|c| c.id == marker_id)
            .cloned()
            .ok_or_else(|| MapError::UnknownMarker(marker_id.to_string()))?;

        self.collapse_fan();
        let outcome = match spider::activate(&cluster, self.zoom, &self.config) {
            ClusterActivation::Select { point_id } => {
                self.interaction.click(&point_id);
                ClickOutcome::Selected { point_id }
            }
            ClusterActivation::Spiderfy(group) => {
                self.interaction.click_outside();
                let outcome = ClickOutcome::Spiderfied {
                    cluster_id: group.cluster_id.clone(),
                    members: group.len(),
                };
                self.spider = Some(group);
                outcome
            }
            ClusterActivation::ZoomTo { center, zoom } => {
                self.interaction.click_outside();
                tracing::debug!(cluster = %cluster.id, zoom, "Requesting zoom towards cluster");
                ClickOutcome::ZoomTo { center, zoom }
            }
        };
        let diff = self.rebuild_frame();
        Ok((outcome, diff))
    }

    /// Click on the map background: closes the fan and the detail panel
    pub fn click_map(&mut self) -> FrameDiff {
        let collapsed = self.collapse_fan();
        self.interaction.click_outside();
        if collapsed {
            self.rebuild_frame()
        } else {
            FrameDiff::default()
        }
    }

    /// Pointer entered a marker; clusters have no preview
    pub fn pointer_enter(&mut self, marker_id: &str, now: Instant) -> Option<HoverTimer> {
        let previewable = self
            .frame
            .marker(marker_id)
            .is_some_and(|m| m.kind != MarkerKind::Cluster);
        if !previewable {
            return None;
        }
        self.interaction.pointer_enter(marker_id, now)
    }

    pub fn pointer_leave(&mut self, marker_id: &str) {
        self.interaction.pointer_leave(marker_id);
    }

    /// Deliver a hover timer scheduled by the host
    pub fn hover_timer_fired(&mut self, timer: &HoverTimer, now: Instant) -> bool {
        self.interaction.hover_timer_fired(timer, now)
    }

    /// Fire a due hover timer; for hosts that poll every frame
    pub fn tick(&mut self, now: Instant) -> bool {
        self.interaction.tick(now)
    }

    pub fn close_panel(&mut self) {
        self.interaction.close_panel();
    }

    /// Forward a status pick for the selected course to the storage layer
    pub fn change_status(&self, status: StatusTag, sink: &mut impl StatusSink) -> Result<()> {
        let point_id = self.interaction.selected().ok_or(MapError::NothingSelected)?;
        tracing::debug!(point = %point_id, status = status.as_str(), "Status change requested");
        sink.status_changed(point_id, status);
        Ok(())
    }

    #[inline]
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    #[inline]
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    #[inline]
    pub fn viewport(&self) -> Option<&GeoBounds> {
        self.viewport.as_ref()
    }

    #[inline]
    pub fn points(&self) -> &PointSet {
        &self.points
    }

    #[inline]
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    #[inline]
    pub fn displacements(&self) -> &[Displacement] {
        &self.displacements
    }

    #[inline]
    pub fn spider(&self) -> Option<&SpiderfiedGroup> {
        self.spider.as_ref()
    }

    #[inline]
    pub fn frame(&self) -> &RenderFrame {
        &self.frame
    }

    #[inline]
    pub fn stats(&self) -> &PassStats {
        &self.stats
    }

    #[inline]
    pub fn interaction(&self) -> &InteractionState {
        self.interaction.state()
    }

    pub fn interaction_snapshot(&self) -> InteractionSnapshot {
        InteractionSnapshot::from(self.interaction.state())
    }
}
