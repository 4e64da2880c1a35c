//! Cluster Builder - greedy, zoom-dependent grouping of course locations
//!
//! Grouping is seeded by input order: the first unassigned point pulls in every
//! later unassigned point within the zoom threshold, and the group is closed.
//! This is not a connected-components pass; the result depends on input order
//! and is reproducible for a fixed order.
//!
//! Each group's center is its discrete 1-median (always a real member). The
//! center must then pass geographic sanity checks; a group that fails them is
//! broken back into singletons, so no point is ever lost.

use crate::{ClusterConfig, GeoBounds, GeoPoint, LatLng, utils};
use smallvec::SmallVec;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Marker ids of multi-member clusters start with this; point ids may not
pub const CLUSTER_ID_PREFIX: &str = "cluster:";

/// One or more points drawn as a single marker
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cluster {
    /// Marker id; a singleton reuses its point id
    pub id: String,
    /// Members in input order (never empty)
    pub members: SmallVec<[GeoPoint; 1]>,
    /// Position of the most central member
    pub center: LatLng,
    center_index: usize,
}

impl Cluster {
    pub fn singleton(point: GeoPoint) -> Self {
        Self {
            id: point.id.clone(),
            center: point.position,
            members: smallvec::smallvec![point],
            center_index: 0,
        }
    }

    /// Group `members` around the member at `center_index`
    fn group(members: SmallVec<[GeoPoint; 1]>, center_index: usize) -> Self {
        let center = &members[center_index];
        Self {
            id: format!("{CLUSTER_ID_PREFIX}{}:{}", center.id, members.len()),
            center: center.position,
            center_index,
            members,
        }
    }

    #[inline]
    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Clusters are never empty; present for `len` symmetry
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// The member the cluster is anchored on
    #[inline]
    pub fn center_point(&self) -> &GeoPoint {
        &self.members[self.center_index]
    }

    /// Largest member distance from the center, in meters
    pub fn spread(&self) -> f64 {
        self.members
            .iter()
            .map(|m| utils::haversine_distance(self.center, m.position))
            .fold(0.0, f64::max)
    }

    pub fn contains(&self, point_id: &str) -> bool {
        self.members.iter().any(|m| m.id == point_id)
    }
}

/// Why a candidate center was refused
#[derive(Debug, Clone, PartialEq)]
pub enum CenterRejection {
    OutsideServiceArea,
    OverWater(String),
    MemberTooFar { member_id: String, meters: f64 },
    NotLocal { nearest_meters: f64 },
}

impl fmt::Display for CenterRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutsideServiceArea => write!(f, "center outside the service area"),
            Self::OverWater(zone) => write!(f, "center over open water ({zone})"),
            Self::MemberTooFar { member_id, meters } => {
                write!(f, "member {member_id:?} is {meters:.0} m from the center")
            }
            Self::NotLocal { nearest_meters } => {
                write!(f, "nearest neighbour of the center is {nearest_meters:.0} m away")
            }
        }
    }
}

/// Counters describing one clustering pass
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PassStats {
    pub input_points: usize,
    pub clusters: usize,
    pub singletons: usize,
    /// Groups whose center failed validation and were split
    pub fallback_groups: usize,
    /// Points emitted as singletons because their group was split
    pub fallback_points: usize,
    /// Points outside the padded viewport, left ungrouped
    pub outside_viewport: usize,
    /// Threshold used for the pass, in meters
    pub threshold_meters: f64,
}

/// Check a candidate center against the geographic sanity rules
pub fn validate_center(
    members: &[GeoPoint],
    center_index: usize,
    threshold_meters: f64,
    config: &ClusterConfig,
) -> Result<(), CenterRejection> {
    let center = members[center_index].position;

    if !config.service_bounds.contains(center) {
        return Err(CenterRejection::OutsideServiceArea);
    }
    if let Some(zone) = config.water_zone_at(center) {
        return Err(CenterRejection::OverWater(zone.to_string()));
    }

    let half = threshold_meters / 2.0;
    let mut nearest = f64::INFINITY;
    for (i, member) in members.iter().enumerate() {
        if i == center_index {
            continue;
        }
        let meters = utils::haversine_distance(center, member.position);
        if meters > half {
            return Err(CenterRejection::MemberTooFar {
                member_id: member.id.clone(),
                meters,
            });
        }
        nearest = nearest.min(meters);
    }

    // The center itself does not count towards locality
    if members.len() > 1 && nearest > half * config.locality_ratio {
        return Err(CenterRejection::NotLocal {
            nearest_meters: nearest,
        });
    }
    Ok(())
}

/// Group `points` for `zoom`
///
/// Points outside `viewport` (grown by `config.viewport_padding`) are emitted
/// as singletons without being compared against anything.
pub fn build_clusters(
    points: &[GeoPoint],
    zoom: f64,
    viewport: Option<&GeoBounds>,
    config: &ClusterConfig,
) -> Vec<Cluster> {
    build_clusters_with_stats(points, zoom, viewport, config).0
}

/// [`build_clusters`] plus pass counters
pub fn build_clusters_with_stats(
    points: &[GeoPoint],
    zoom: f64,
    viewport: Option<&GeoBounds>,
    config: &ClusterConfig,
) -> (Vec<Cluster>, PassStats) {
    #[cfg(feature = "profiling")]
    profiling::scope!("cluster::build_clusters");

    let threshold = config.thresholds.threshold_at(zoom);
    let region = viewport.map(|v| v.padded(config.viewport_padding));
    let in_region = |p: &GeoPoint| region.is_none_or(|r| r.contains(p.position));

    let mut stats = PassStats {
        input_points: points.len(),
        threshold_meters: threshold,
        ..Default::default()
    };
    let mut clusters = Vec::with_capacity(points.len());
    let mut assigned = vec![false; points.len()];

    for seed in 0..points.len() {
        if assigned[seed] {
            continue;
        }
        assigned[seed] = true;
        let seed_point = &points[seed];

        if !in_region(seed_point) {
            stats.outside_viewport += 1;
            clusters.push(Cluster::singleton(seed_point.clone()));
            continue;
        }
        if threshold <= 0.0 {
            clusters.push(Cluster::singleton(seed_point.clone()));
            continue;
        }

        // Every index before `seed` is already assigned
        let mut group: SmallVec<[usize; 8]> = smallvec::smallvec![seed];
        for candidate in seed + 1..points.len() {
            if assigned[candidate] || !in_region(&points[candidate]) {
                continue;
            }
            if utils::distance(seed_point, &points[candidate]) <= threshold {
                assigned[candidate] = true;
                group.push(candidate);
            }
        }

        if group.len() == 1 {
            clusters.push(Cluster::singleton(seed_point.clone()));
            continue;
        }

        let members: SmallVec<[GeoPoint; 1]> = group.iter().map(|&i| points[i].clone()).collect();
        let positions: Vec<LatLng> = members.iter().map(|m| m.position).collect();
        let center_index = utils::most_central_index(&positions).unwrap_or(0);

        match validate_center(&members, center_index, threshold, config) {
            Ok(()) => clusters.push(Cluster::group(members, center_index)),
            Err(rejection) => {
                tracing::trace!(
                    seed = %seed_point.id,
                    members = members.len(),
                    "Splitting group into singletons: {}",
                    rejection
                );
                stats.fallback_groups += 1;
                stats.fallback_points += members.len();
                clusters.extend(members.into_iter().map(Cluster::singleton));
            }
        }
    }

    stats.singletons = clusters.iter().filter(|c| c.is_singleton()).count();
    stats.clusters = clusters.len() - stats.singletons;

    tracing::debug!(
        zoom,
        threshold_m = threshold,
        input = stats.input_points,
        clusters = stats.clusters,
        singletons = stats.singletons,
        fallback_groups = stats.fallback_groups,
        "Clustering pass complete"
    );

    (clusters, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Category, StatusTag};
    use quickcheck::{QuickCheck, TestResult};
    use std::collections::HashMap;

    /// Zoom whose default threshold is 50 km
    const ZOOM_50KM: f64 = 7.0;

    fn point(id: &str, lat: f64, lng: f64) -> GeoPoint {
        GeoPoint::new(id, lat, lng, Category::Public, StatusTag::Unmarked)
    }

    fn ids(cluster: &Cluster) -> Vec<&str> {
        cluster.members.iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn test_empty_input() {
        let config = ClusterConfig::default();
        assert!(build_clusters(&[], ZOOM_50KM, None, &config).is_empty());
    }

    #[test]
    fn test_single_point_any_zoom() {
        let config = ClusterConfig::default();
        let points = [point("a", 40.0, -75.0)];
        for zoom in [0.0, 7.0, 12.5, 18.0] {
            let clusters = build_clusters(&points, zoom, None, &config);
            assert_eq!(clusters.len(), 1);
            assert!(clusters[0].is_singleton());
            assert_eq!(clusters[0].id, "a");
            assert_eq!(clusters[0].center, LatLng::new(40.0, -75.0));
        }
    }

    #[test]
    fn test_two_distant_points_stay_apart() {
        let config = ClusterConfig::default();
        let points = [point("a", 40.0, -75.0), point("b", 40.0, -85.56)];
        assert!(utils::distance(&points[0], &points[1]) > 850_000.0);

        let clusters = build_clusters(&points, ZOOM_50KM, None, &config);
        assert_eq!(clusters.len(), 2);
        assert!(clusters.iter().all(Cluster::is_singleton));
    }

    #[test]
    fn test_two_near_points_merge() {
        let config = ClusterConfig::default();
        let points = [point("a", 40.0, -75.0), point("b", 40.045, -75.0)];
        let d = utils::distance(&points[0], &points[1]);
        assert!((d - 5_000.0).abs() < 100.0);

        let clusters = build_clusters(&points, ZOOM_50KM, None, &config);
        assert_eq!(clusters.len(), 1);
        assert_eq!(ids(&clusters[0]), vec!["a", "b"]);
        assert_eq!(clusters[0].center, points[0].position);
        assert_eq!(clusters[0].center_point().id, "a");
        assert_eq!(clusters[0].id, "cluster:a:2");
    }

    #[test]
    fn test_identical_points_form_one_cluster() {
        let config = ClusterConfig::default();
        let points: Vec<GeoPoint> = (0..5)
            .map(|i| point(&format!("p{i}"), 40.0, -75.0))
            .collect();

        let clusters = build_clusters(&points, ZOOM_50KM, None, &config);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 5);
        assert_eq!(clusters[0].center, LatLng::new(40.0, -75.0));
        assert_eq!(clusters[0].spread(), 0.0);
    }

    #[test]
    fn test_max_zoom_tier_disables_clustering() {
        let config = ClusterConfig::default();
        let points: Vec<GeoPoint> = (0..5)
            .map(|i| point(&format!("p{i}"), 40.0, -75.0))
            .collect();
        let zoom = config.thresholds.max_zoom_tier() as f64;

        let clusters = build_clusters(&points, zoom, None, &config);
        assert_eq!(clusters.len(), 5);
        assert!(clusters.iter().all(Cluster::is_singleton));
    }

    #[test]
    fn test_center_over_water_falls_back_to_singletons() {
        let config = ClusterConfig::default();
        // Platforms in the middle of the Gulf of Mexico
        let points = [
            point("rig-1", 25.00, -90.0),
            point("rig-2", 25.01, -90.0),
            point("rig-3", 25.02, -90.0),
        ];

        let (clusters, stats) = build_clusters_with_stats(&points, ZOOM_50KM, None, &config);
        assert_eq!(clusters.len(), 3);
        assert!(clusters.iter().all(Cluster::is_singleton));
        assert_eq!(stats.fallback_groups, 1);
        assert_eq!(stats.fallback_points, 3);

        let positions: Vec<LatLng> = points.iter().map(|p| p.position).collect();
        let center = utils::most_central_index(&positions).unwrap();
        assert_eq!(
            validate_center(&points, center, 50_000.0, &config),
            Err(CenterRejection::OverWater("Gulf of Mexico".to_string()))
        );
    }

    #[test]
    fn test_center_outside_service_area_falls_back() {
        let config = ClusterConfig::default();
        let points = [point("a", 48.85, 2.35), point("b", 48.86, 2.35)];
        let clusters = build_clusters(&points, ZOOM_50KM, None, &config);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn test_sparse_group_fails_locality() {
        let config = ClusterConfig::default();
        // Neighbours sit ~20 km either side; locality needs one within 10 km
        let points = [
            point("center", 40.0, -75.0),
            point("east", 40.0, -74.765),
            point("west", 40.0, -75.235),
        ];
        let (clusters, stats) = build_clusters_with_stats(&points, ZOOM_50KM, None, &config);
        assert_eq!(clusters.len(), 3);
        assert_eq!(stats.fallback_groups, 1);
        assert!(matches!(
            validate_center(&points, 0, 50_000.0, &config),
            Err(CenterRejection::NotLocal { .. })
        ));
    }

    #[test]
    fn test_member_beyond_half_threshold_fails() {
        let config = ClusterConfig::default();
        // 30 km apart: grouped by the 50 km seed rule, but not within 25 km of either
        let points = [point("a", 40.0, -75.0), point("b", 40.27, -75.0)];
        let clusters = build_clusters(&points, ZOOM_50KM, None, &config);
        assert_eq!(clusters.len(), 2);
        assert!(matches!(
            validate_center(&points, 0, 50_000.0, &config),
            Err(CenterRejection::MemberTooFar { .. })
        ));
    }

    #[test]
    fn test_grouping_is_seeded_by_input_order() {
        let config = ClusterConfig::default();
        // Zoom 9 groups within 12 km: a-b is 2 km, b-c 11 km, a-c 13 km
        let a = point("a", 40.0, -75.0);
        let b = point("b", 40.018, -75.0);
        let c = point("c", 40.117, -75.0);

        let forward = build_clusters(&[a.clone(), b.clone(), c.clone()], 9.0, None, &config);
        let grouped: Vec<Vec<&str>> = forward.iter().map(ids).collect();
        // Seed "a" captures "b" only; "c" is left alone
        assert_eq!(grouped, vec![vec!["a", "b"], vec!["c"]]);

        // Seed "b" captures both, but "c" sits too far from the center
        let middle_first = build_clusters(&[b, a, c], 9.0, None, &config);
        assert_eq!(middle_first.len(), 3);
        assert!(middle_first.iter().all(Cluster::is_singleton));
    }

    #[test]
    fn test_viewport_excludes_far_points_from_grouping() {
        let config = ClusterConfig::default();
        let viewport = GeoBounds::new(39.5, -75.5, 40.5, -74.5);
        let points = [
            point("in-1", 40.0, -75.0),
            point("in-2", 40.01, -75.0),
            point("out-1", 45.0, -75.0),
            point("out-2", 45.01, -75.0),
        ];
        let (clusters, stats) =
            build_clusters_with_stats(&points, ZOOM_50KM, Some(&viewport), &config);
        assert_eq!(clusters.len(), 3);
        assert_eq!(ids(&clusters[0]), vec!["in-1", "in-2"]);
        assert_eq!(stats.outside_viewport, 2);
    }

    fn scattered(raw: &[(i8, i8)]) -> Vec<GeoPoint> {
        raw.iter()
            .enumerate()
            .map(|(i, &(a, b))| {
                point(
                    &format!("p{i}"),
                    40.0 + a as f64 / 50.0,
                    -90.0 + b as f64 / 50.0,
                )
            })
            .collect()
    }

    #[test]
    fn test_every_point_appears_exactly_once() {
        fn prop(raw: Vec<(i8, i8)>, zoom: u8) -> TestResult {
            if raw.len() > 60 {
                return TestResult::discard();
            }
            let config = ClusterConfig::default();
            let points = scattered(&raw);
            let clusters = build_clusters(&points, (zoom % 17) as f64, None, &config);

            let mut counts: HashMap<&str, usize> = HashMap::new();
            for cluster in &clusters {
                for member in &cluster.members {
                    *counts.entry(member.id.as_str()).or_default() += 1;
                }
            }
            TestResult::from_bool(
                counts.len() == points.len() && counts.values().all(|&n| n == 1),
            )
        }
        QuickCheck::new()
            .tests(200)
            .quickcheck(prop as fn(Vec<(i8, i8)>, u8) -> TestResult);
    }

    #[test]
    fn test_clustering_is_deterministic() {
        fn prop(raw: Vec<(i8, i8)>, zoom: u8) -> TestResult {
            if raw.len() > 60 {
                return TestResult::discard();
            }
            let config = ClusterConfig::default();
            let points = scattered(&raw);
            let zoom = (zoom % 17) as f64;
            let first = build_clusters(&points, zoom, None, &config);
            let second = build_clusters(&points, zoom, None, &config);
            TestResult::from_bool(first == second)
        }
        QuickCheck::new()
            .tests(200)
            .quickcheck(prop as fn(Vec<(i8, i8)>, u8) -> TestResult);
    }

    #[test]
    fn test_centers_are_members() {
        fn prop(raw: Vec<(i8, i8)>, zoom: u8) -> TestResult {
            if raw.len() > 60 {
                return TestResult::discard();
            }
            let config = ClusterConfig::default();
            let points = scattered(&raw);
            let clusters = build_clusters(&points, (zoom % 17) as f64, None, &config);
            TestResult::from_bool(
                clusters
                    .iter()
                    .all(|c| c.members.iter().any(|m| m.position == c.center)),
            )
        }
        QuickCheck::new()
            .tests(200)
            .quickcheck(prop as fn(Vec<(i8, i8)>, u8) -> TestResult);
    }
}
