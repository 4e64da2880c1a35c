//! Icon selection
//!
//! The renderer owns the artwork; this module only decides which variant to
//! draw and at what pixel size.

use crate::{Category, ClusterConfig, StatusTag};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What the renderer should draw for a marker
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IconDescriptor {
    /// Stable lookup key into the renderer's icon atlas
    pub key: String,
    /// Diameter in pixels
    pub size_px: f64,
    pub variant: IconVariant,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum IconVariant {
    Point {
        category: Category,
        status: StatusTag,
    },
    ClusterBadge {
        count: usize,
    },
}

/// Zoom-dependent icon scale factor
pub fn icon_scale(zoom: f64, config: &ClusterConfig) -> f64 {
    let curve = &config.icon_scale;
    let t = ((zoom - curve.min_zoom) / (curve.max_zoom - curve.min_zoom)).clamp(0.0, 1.0);
    curve.min_scale + t * (curve.max_scale - curve.min_scale)
}

/// Icon diameter in pixels at `zoom`
#[inline]
pub fn icon_diameter_px(zoom: f64, config: &ClusterConfig) -> f64 {
    config.icon_base_size_px * icon_scale(zoom, config)
}

/// Icon for a single course marker
pub fn icon_for(
    category: Category,
    status: StatusTag,
    scale: f64,
    config: &ClusterConfig,
) -> IconDescriptor {
    IconDescriptor {
        key: format!("{}-{}@{:.2}", category.as_str(), status.as_str(), scale),
        size_px: config.icon_base_size_px * scale,
        variant: IconVariant::Point { category, status },
    }
}

/// Badge icon for a multi-member cluster; grows slowly with the member count
pub fn cluster_icon(count: usize, scale: f64, config: &ClusterConfig) -> IconDescriptor {
    let growth = 1.0 + 0.15 * (count.max(1) as f64).log10();
    IconDescriptor {
        key: format!("cluster@{scale:.2}"),
        size_px: config.icon_base_size_px * scale * growth,
        variant: IconVariant::ClusterBadge { count },
    }
}
