use clap::Parser;
use course_map_lib::{ClusterConfig, GeoBounds};
use std::path::PathBuf;

/// Marker id that stands for a click on the empty map
pub const MAP_CLICK: &str = "@map";

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Course Map Inspector - runs a clustering pass over a course snapshot and prints the render frame
pub struct Settings {
    /// JSON file holding an array of course points
    #[clap(value_name = "FILE")]
    pub input: PathBuf,

    /// Map zoom level
    #[clap(short, long, default_value = "10.0")]
    pub zoom: f64,

    /// Visible area as south,west,north,east (whole world when omitted)
    #[clap(long, value_name = "S,W,N,E", value_parser = parse_bbox, allow_hyphen_values = true)]
    pub bbox: Option<GeoBounds>,

    /// JSON file with clustering configuration (missing fields keep their defaults)
    #[clap(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Zoom at or above which an activated cluster fans out
    #[clap(long)]
    pub spiderfy_zoom: Option<f64>,

    /// Zoom at or above which overlapping markers are pushed apart
    #[clap(long)]
    pub collision_min_zoom: Option<f64>,

    /// Fraction of the half-threshold a member must sit within from the center
    #[clap(long)]
    pub locality_ratio: Option<f64>,

    /// Marker ids to click in order after the first pass; "@map" clicks the empty map
    #[clap(long = "click", value_name = "MARKER")]
    pub clicks: Vec<String>,

    /// Write the report to this file instead of stdout
    #[clap(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Print compact JSON instead of pretty JSON
    #[clap(long, default_value = "false")]
    pub compact: bool,

    /// Log every pass at debug level
    #[clap(short, long, default_value = "false")]
    pub verbose: bool,
}

impl Settings {
    /// Apply command-line overrides on top of a loaded configuration
    pub fn apply_overrides(&self, config: &mut ClusterConfig) {
        if let Some(zoom) = self.spiderfy_zoom {
            config.spiderfy_zoom = zoom;
        }
        if let Some(zoom) = self.collision_min_zoom {
            config.collision_min_zoom = zoom;
        }
        if let Some(ratio) = self.locality_ratio {
            config.locality_ratio = ratio;
        }
    }
}

fn parse_bbox(value: &str) -> Result<GeoBounds, String> {
    let parts = value
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid bbox number: {e}"))?;
    let [south, west, north, east] = parts[..] else {
        return Err(format!("expected 4 comma-separated values, got {}", parts.len()));
    };
    let bounds = GeoBounds::new(south, west, north, east);
    if bounds.is_empty() {
        return Err("bbox must have south < north and west < east".to_string());
    }
    Ok(bounds)
}
