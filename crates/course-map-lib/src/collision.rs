//! Collision Resolver - pushes apart individually drawn markers that overlap
//!
//! Works purely in world pixels at the current zoom. Offsets are recomputed
//! from scratch on every pass and never carried over between passes.

use crate::{ClusterConfig, ConnectorKind, ConnectorLine, LatLng, icon, utils};
use geo::Coord;
use smallvec::SmallVec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A marker drawn away from its true position
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Displacement {
    pub marker_id: String,
    pub original_position: LatLng,
    pub new_position: LatLng,
}

impl Displacement {
    /// Line from the true position to the drawn one
    pub fn connector(&self) -> ConnectorLine {
        ConnectorLine {
            from: self.original_position,
            to: self.new_position,
            kind: ConnectorKind::Displacement,
        }
    }
}

/// Radius growth steps tried before a crowded group is accepted as placed
const MAX_SPREAD_STEPS: usize = 32;

/// Compute displacements for overlapping singleton markers at `zoom`
///
/// Conflict groups are the connected components of the "closer than
/// `collision_conflict_factor` icon diameters" relation, so a chain of
/// overlapping markers ends up in one group. Groups are placed in the input
/// order of their first marker. Each member of a group is moved onto its own
/// circle of `collision_separation_factor` diameters, at evenly spaced angles
/// starting from the direction pointing away from the group's centroid. While
/// a moved member still sits within the conflict distance of any other marker,
/// the circle grows by one diameter. Markers without conflicts are not
/// returned.
pub fn resolve_collisions<'a>(
    markers: impl IntoIterator<Item = (&'a str, LatLng)>,
    zoom: f64,
    config: &ClusterConfig,
) -> Vec<Displacement> {
    #[cfg(feature = "profiling")]
    profiling::scope!("collision::resolve_collisions");

    if zoom < config.collision_min_zoom {
        return Vec::new();
    }

    let diameter = icon::icon_diameter_px(zoom, config);
    let conflict_px = diameter * config.collision_conflict_factor;

    let anchors: Vec<(&str, LatLng, Coord<f64>)> = markers
        .into_iter()
        .map(|(id, position)| (id, position, utils::to_world_pixels(position, zoom)))
        .collect();
    let originals: Vec<Coord<f64>> = anchors.iter().map(|a| a.2).collect();

    // Where every marker is currently drawn; updated as groups are placed
    let mut placed = originals.clone();
    let mut grouped = vec![false; anchors.len()];
    let mut displacements = Vec::new();

    for first in 0..anchors.len() {
        if grouped[first] {
            continue;
        }
        let group = conflict_group(&originals, first, conflict_px, &mut grouped);
        if group.len() < 2 {
            continue;
        }

        let targets = spread_group(&originals, &placed, &group, diameter, conflict_px, config);
        for (&i, &target) in group.iter().zip(&targets) {
            placed[i] = target;
            let (id, position, _) = anchors[i];
            displacements.push(Displacement {
                marker_id: id.to_string(),
                original_position: position,
                new_position: utils::from_world_pixels(target, zoom),
            });
        }
    }

    if !displacements.is_empty() {
        tracing::debug!(
            zoom,
            displaced = displacements.len(),
            "Resolved marker collisions"
        );
    }
    displacements
}

#[inline]
fn pixel_distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

/// Collect every free marker reachable from `first` through conflicting pairs
fn conflict_group(
    pixels: &[Coord<f64>],
    first: usize,
    conflict_px: f64,
    grouped: &mut [bool],
) -> SmallVec<[usize; 4]> {
    let mut group: SmallVec<[usize; 4]> = smallvec::smallvec![first];
    grouped[first] = true;
    let mut next = 0;
    while next < group.len() {
        let current = pixels[group[next]];
        for other in first + 1..pixels.len() {
            if !grouped[other] && pixel_distance(current, pixels[other]) < conflict_px {
                grouped[other] = true;
                group.push(other);
            }
        }
        next += 1;
    }
    // Slot order follows input order
    group.sort_unstable();
    group
}

/// Target pixels for the members of `group`, in group order
fn spread_group(
    originals: &[Coord<f64>],
    placed: &[Coord<f64>],
    group: &[usize],
    diameter: f64,
    conflict_px: f64,
    config: &ClusterConfig,
) -> SmallVec<[Coord<f64>; 4]> {
    let count = group.len() as f64;
    let origin = originals[group[0]];
    let centroid = group.iter().fold(Coord { x: 0.0, y: 0.0 }, |acc, &i| Coord {
        x: acc.x + originals[i].x / count,
        y: acc.y + originals[i].y / count,
    });
    let outward = Coord {
        x: origin.x - centroid.x,
        y: origin.y - centroid.y,
    };
    let base_angle = if outward.x.hypot(outward.y) > f64::EPSILON {
        outward.y.atan2(outward.x)
    } else {
        0.0
    };

    let layout = |radius: f64| -> SmallVec<[Coord<f64>; 4]> {
        group
            .iter()
            .enumerate()
            .map(|(slot, &i)| {
                let angle = base_angle + std::f64::consts::TAU * slot as f64 / count;
                Coord {
                    x: originals[i].x + radius * angle.cos(),
                    y: originals[i].y + radius * angle.sin(),
                }
            })
            .collect()
    };
    let clears_everything = |targets: &[Coord<f64>]| {
        targets.iter().enumerate().all(|(slot, &target)| {
            let among_group = targets
                .iter()
                .enumerate()
                .all(|(other, &t)| other == slot || pixel_distance(target, t) >= conflict_px);
            let among_rest = placed
                .iter()
                .enumerate()
                .filter(|(j, _)| !group.contains(j))
                .all(|(_, &p)| pixel_distance(target, p) >= conflict_px);
            among_group && among_rest
        })
    };

    let mut radius = diameter * config.collision_separation_factor;
    let mut targets = layout(radius);
    for _ in 0..MAX_SPREAD_STEPS {
        if clears_everything(&targets[..]) {
            return targets;
        }
        radius += diameter;
        targets = layout(radius);
    }
    tracing::trace!(
        members = group.len(),
        radius_px = radius,
        "Collision group still crowded after spreading"
    );
    targets
}
