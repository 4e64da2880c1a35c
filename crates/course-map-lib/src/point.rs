//! Course location model and snapshot ingestion
//!
//! The data layer hands over raw rows whose coordinates may be numbers, numeric
//! strings or garbage. [`PointSet::ingest`] sorts every row into one of three
//! buckets so a single corrupt row never aborts a render pass:
//!
//! - **clusterable**: finite coordinates inside [-90, 90] / [-180, 180]
//! - **outlier**: parseable but out of range, rendered alone at a clamped position
//! - **dropped**: unparseable, non-finite, a duplicate id, or an id in the cluster
//!   marker namespace (counted in [`IngestReport`])

use crate::{CLUSTER_ID_PREFIX, MapError, Result, utils};
use std::collections::HashSet;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A WGS84 position in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    #[inline]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Whether both components are finite and inside the WGS84 ranges
    #[inline]
    pub fn is_in_range(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Nearest drawable position (Web Mercator latitude, ±180° longitude)
    #[inline]
    pub fn clamped(&self) -> Self {
        Self {
            lat: self.lat.clamp(-utils::MAX_LATITUDE, utils::MAX_LATITUDE),
            lng: self.lng.clamp(-180.0, 180.0),
        }
    }
}

impl fmt::Display for LatLng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.5}, {:.5})", self.lat, self.lng)
    }
}

/// Thin line tying a drawn marker back to where it really belongs
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConnectorLine {
    pub from: LatLng,
    pub to: LatLng,
    pub kind: ConnectorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ConnectorKind {
    /// From a displaced marker's true position to where it is drawn
    Displacement,
    /// From a fanned-out cluster's center to one of its members
    Spider,
}

/// Kind of course, drives the icon shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Category {
    #[default]
    Public,
    Private,
    Resort,
    Municipal,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Resort => "resort",
            Self::Municipal => "municipal",
        }
    }

    pub fn all() -> &'static [Self] {
        &[Self::Public, Self::Private, Self::Resort, Self::Municipal]
    }
}

/// Per-user status tag, drives the icon color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum StatusTag {
    #[default]
    Unmarked,
    WantToPlay,
    Played,
    Favorite,
}

impl StatusTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unmarked => "unmarked",
            Self::WantToPlay => "want_to_play",
            Self::Played => "played",
            Self::Favorite => "favorite",
        }
    }

    pub fn all() -> &'static [Self] {
        &[Self::Unmarked, Self::WantToPlay, Self::Played, Self::Favorite]
    }
}

/// A course location as seen by the map engine (read-only snapshot)
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeoPoint {
    pub id: String,
    pub position: LatLng,
    pub category: Category,
    pub status: StatusTag,
}

impl GeoPoint {
    pub fn new(
        id: impl Into<String>,
        latitude: f64,
        longitude: f64,
        category: Category,
        status: StatusTag,
    ) -> Self {
        Self {
            id: id.into(),
            position: LatLng::new(latitude, longitude),
            category,
            status,
        }
    }

    #[inline]
    pub fn latitude(&self) -> f64 {
        self.position.lat
    }

    #[inline]
    pub fn longitude(&self) -> f64 {
        self.position.lng
    }
}

/// A coordinate exactly as delivered by the data layer
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum RawCoordinate {
    Number(f64),
    Text(String),
    #[default]
    Missing,
}

impl RawCoordinate {
    /// Parse into a finite number of degrees
    pub fn parse(&self) -> std::result::Result<f64, String> {
        let value = match self {
            Self::Number(v) => *v,
            Self::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|e| format!("not a number ({s:?}: {e})"))?,
            Self::Missing => return Err("missing".to_string()),
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(format!("non-finite value {value}"))
        }
    }
}

impl From<f64> for RawCoordinate {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for RawCoordinate {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// One row from the data layer before validation
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawGeoPoint {
    pub id: String,
    #[cfg_attr(feature = "serde", serde(default, alias = "lat"))]
    pub latitude: RawCoordinate,
    #[cfg_attr(feature = "serde", serde(default, alias = "lng", alias = "lon"))]
    pub longitude: RawCoordinate,
    #[cfg_attr(feature = "serde", serde(default))]
    pub category: Category,
    #[cfg_attr(feature = "serde", serde(default))]
    pub status: StatusTag,
}

impl RawGeoPoint {
    pub fn new(
        id: impl Into<String>,
        latitude: impl Into<RawCoordinate>,
        longitude: impl Into<RawCoordinate>,
    ) -> Self {
        Self {
            id: id.into(),
            latitude: latitude.into(),
            longitude: longitude.into(),
            category: Category::default(),
            status: StatusTag::default(),
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn with_status(mut self, status: StatusTag) -> Self {
        self.status = status;
        self
    }

    /// Parse both coordinates, failing with [`MapError::InvalidCoordinate`]
    pub fn parse(&self) -> Result<GeoPoint> {
        let invalid = |axis: &str, reason: String| MapError::InvalidCoordinate {
            id: self.id.clone(),
            reason: format!("{axis} {reason}"),
        };
        let latitude = self.latitude.parse().map_err(|r| invalid("latitude", r))?;
        let longitude = self.longitude.parse().map_err(|r| invalid("longitude", r))?;
        Ok(GeoPoint::new(
            self.id.clone(),
            latitude,
            longitude,
            self.category,
            self.status,
        ))
    }
}

impl From<GeoPoint> for RawGeoPoint {
    fn from(point: GeoPoint) -> Self {
        Self {
            id: point.id,
            latitude: RawCoordinate::Number(point.position.lat),
            longitude: RawCoordinate::Number(point.position.lng),
            category: point.category,
            status: point.status,
        }
    }
}

/// Counts from one ingestion, so omissions are observable
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IngestReport {
    /// Rows that can take part in clustering
    pub accepted: usize,
    /// Rows rendered alone because their coordinates are out of range
    pub outliers: usize,
    /// Rows removed entirely
    pub dropped: usize,
    /// Ids of the removed rows, in input order
    pub dropped_ids: Vec<String>,
}

/// A validated snapshot of course locations
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PointSet {
    points: Vec<GeoPoint>,
    outliers: Vec<GeoPoint>,
    report: IngestReport,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl PointSet {
    /// Validate raw rows from the data layer
    pub fn ingest(rows: impl IntoIterator<Item = RawGeoPoint>) -> Self {
        #[cfg(feature = "profiling")]
        profiling::scope!("point::ingest");

        let mut set = Self::default();
        let mut seen: HashSet<String> = HashSet::new();

        for row in rows {
            if seen.contains(&row.id) {
                tracing::warn!("Dropping duplicate point id {:?}", row.id);
                set.drop_row(row.id);
                continue;
            }
            if row.id.starts_with(CLUSTER_ID_PREFIX) {
                tracing::warn!("Dropping point id {:?}: reserved for cluster markers", row.id);
                set.drop_row(row.id);
                continue;
            }

            match row.parse() {
                Ok(point) => {
                    seen.insert(point.id.clone());
                    set.accept(point);
                }
                Err(e) => {
                    tracing::warn!("Dropping point: {}", e);
                    seen.insert(row.id.clone());
                    set.drop_row(row.id);
                }
            }
        }

        tracing::debug!(
            accepted = set.report.accepted,
            outliers = set.report.outliers,
            dropped = set.report.dropped,
            "Ingested point snapshot"
        );
        set
    }

    /// Build from already-typed points, still applying the range checks
    pub fn from_points(points: impl IntoIterator<Item = GeoPoint>) -> Self {
        Self::ingest(points.into_iter().map(RawGeoPoint::from))
    }

    fn accept(&mut self, point: GeoPoint) {
        if point.position.is_in_range() {
            self.report.accepted += 1;
            self.points.push(point);
        } else {
            tracing::warn!(
                "Point {:?} at {} is outside WGS84 ranges; rendering as outlier",
                point.id,
                point.position
            );
            self.report.outliers += 1;
            self.outliers.push(point);
        }
    }

    fn drop_row(&mut self, id: String) {
        self.report.dropped += 1;
        self.report.dropped_ids.push(id);
    }

    /// Points eligible for clustering, in input order
    #[inline]
    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    /// Out-of-range points, in input order
    #[inline]
    pub fn outliers(&self) -> &[GeoPoint] {
        &self.outliers
    }

    #[inline]
    pub fn report(&self) -> &IngestReport {
        &self.report
    }

    /// Number of renderable points (clusterable + outliers)
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len() + self.outliers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a renderable point by id
    pub fn get(&self, id: &str) -> Option<&GeoPoint> {
        self.points
            .iter()
            .chain(self.outliers.iter())
            .find(|p| p.id == id)
    }
}
