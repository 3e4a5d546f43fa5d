//! Visualization of processed point clouds.
//!
//! Clouds are drawn as a 3D scatter into a PNG using the plotters library,
//! seen from one of a few named camera presets. Nothing is drawn as text, so
//! rendering does not depend on system fonts.

use std::fmt;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::info;
use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::config::RenderConfig;
use crate::core::loaders::PointCloud;

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("Unknown view point '{0}' (expected Front, Back, Left, Right or Top)")]
    UnknownViewpoint(String),
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// Point color (cornflower blue).
const POINT_COLOR: RGBAColor = RGBAColor(100, 149, 237, 0.8);

/// Bounding box edge color.
const EDGE_COLOR: RGBColor = RGBColor(160, 160, 160);

/// Named camera orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewpoint {
    Front,
    Back,
    Left,
    Right,
    Top,
}

impl Viewpoint {
    /// Camera `(elevation, azimuth)` in degrees.
    pub fn angles(self) -> (f64, f64) {
        match self {
            Viewpoint::Top => (90.0, 0.0),
            Viewpoint::Front => (30.0, 45.0),
            Viewpoint::Left => (30.0, 315.0),
            Viewpoint::Back => (30.0, 225.0),
            Viewpoint::Right => (30.0, 135.0),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Viewpoint::Front => "Front",
            Viewpoint::Back => "Back",
            Viewpoint::Left => "Left",
            Viewpoint::Right => "Right",
            Viewpoint::Top => "Top",
        }
    }
}

impl FromStr for Viewpoint {
    type Err = VisualizationError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Front" => Ok(Viewpoint::Front),
            "Back" => Ok(Viewpoint::Back),
            "Left" => Ok(Viewpoint::Left),
            "Right" => Ok(Viewpoint::Right),
            "Top" => Ok(Viewpoint::Top),
            other => Err(VisualizationError::UnknownViewpoint(other.to_string())),
        }
    }
}

impl fmt::Display for Viewpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Receives the final cloud of each processed batch.
pub trait BatchRenderer {
    /// Render `cloud`, the result of frames `frames`, from the named view.
    ///
    /// Fails with [`VisualizationError::UnknownViewpoint`] if `view` is not a
    /// known preset.
    fn render(&mut self, cloud: &PointCloud, view: &str, frames: Range<u32>) -> Result<()>;
}

/// Writes one PNG per batch into a directory.
pub struct PngRenderer {
    output_dir: PathBuf,
    settings: RenderConfig,
}

impl PngRenderer {
    pub fn new(output_dir: impl Into<PathBuf>, settings: RenderConfig) -> Self {
        Self {
            output_dir: output_dir.into(),
            settings,
        }
    }

    /// Image path for a batch, `batch_<start>_<end>_<view>.png`.
    pub fn image_path(&self, frames: &Range<u32>, view: Viewpoint) -> PathBuf {
        self.output_dir
            .join(format!("batch_{}_{}_{}.png", frames.start, frames.end, view))
    }
}

impl BatchRenderer for PngRenderer {
    fn render(&mut self, cloud: &PointCloud, view: &str, frames: Range<u32>) -> Result<()> {
        let view: Viewpoint = view.parse()?;
        fs::create_dir_all(&self.output_dir)?;

        let path = self.image_path(&frames, view);
        plot_point_cloud(&path, cloud, view, &self.settings)?;
        info!("Frames {}..{}: rendered {} points -> {}", frames.start, frames.end, cloud.len(), path.display());
        Ok(())
    }
}

/// Plot a 3D scatter of a point cloud and save it as PNG.
///
/// The z axis points up, as in the crane frame. Clouds larger than
/// `settings.max_points` are thinned by a regular stride. An empty cloud
/// produces an image with only the bounding box.
pub fn plot_point_cloud(
    output_path: &Path,
    cloud: &PointCloud,
    view: Viewpoint,
    settings: &RenderConfig,
) -> Result<()> {
    let n = cloud.len();
    let max_points = settings.max_points.max(1);
    let step = if n > max_points { n.div_ceil(max_points) } else { 1 };

    let points: Vec<[f32; 3]> = (0..n).step_by(step).map(|i| cloud.point(i)).collect();
    let [x_range, y_range, z_range] = compute_bounds(&points);

    let root = BitMapBackend::new(output_path, (settings.width, settings.height))
        .into_drawing_area();

    root.fill(&WHITE).map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    // plotters treats its second axis as vertical, so z goes second
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .build_cartesian_3d(x_range.clone(), z_range.clone(), y_range.clone())
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    let (elevation, azimuth) = view.angles();
    chart.with_projection(|mut pb| {
        pb.pitch = elevation.to_radians();
        pb.yaw = azimuth.to_radians();
        pb.scale = 0.8;
        pb.into_matrix()
    });

    for edge in box_edges(&x_range, &y_range, &z_range) {
        chart
            .draw_series(LineSeries::new(
                edge.iter().map(|p| (p[0], p[2], p[1])),
                &EDGE_COLOR,
            ))
            .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;
    }

    let point_size = settings.point_size;
    chart
        .draw_series(
            points
                .iter()
                .map(|p| Circle::new((p[0], p[2], p[1]), point_size, POINT_COLOR.filled())),
        )
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    root.present().map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    Ok(())
}

/// Per-axis min..max of the points, widened when flat or empty.
fn compute_bounds(points: &[[f32; 3]]) -> [Range<f32>; 3] {
    let mut ranges = [0usize, 1, 2].map(|axis| {
        points.iter().fold(f32::MAX..f32::MIN, |r, p| {
            r.start.min(p[axis])..r.end.max(p[axis])
        })
    });

    for range in ranges.iter_mut() {
        if range.start > range.end {
            *range = -1.0..1.0;
        } else if (range.end - range.start).abs() < f32::EPSILON {
            *range = (range.start - 1.0)..(range.end + 1.0);
        }
    }

    ranges
}

/// The twelve edges of an axis-aligned box, as point pairs.
fn box_edges(x: &Range<f32>, y: &Range<f32>, z: &Range<f32>) -> Vec<[[f32; 3]; 2]> {
    let corner = |i: u8| {
        [
            if i & 1 == 0 { x.start } else { x.end },
            if i & 2 == 0 { y.start } else { y.end },
            if i & 4 == 0 { z.start } else { z.end },
        ]
    };

    let mut edges = Vec::with_capacity(12);
    for a in 0u8..8 {
        for bit in [1u8, 2, 4] {
            if a & bit == 0 {
                edges.push([corner(a), corner(a | bit)]);
            }
        }
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_viewpoint_lookup() {
        assert_eq!("Top".parse::<Viewpoint>().unwrap().angles(), (90.0, 0.0));
        assert_eq!("Front".parse::<Viewpoint>().unwrap().angles(), (30.0, 45.0));
        assert_eq!("Left".parse::<Viewpoint>().unwrap().angles(), (30.0, 315.0));
        assert_eq!("Back".parse::<Viewpoint>().unwrap().angles(), (30.0, 225.0));
        assert_eq!("Right".parse::<Viewpoint>().unwrap().angles(), (30.0, 135.0));
    }

    #[test]
    fn test_unknown_viewpoint() {
        match "Bottom".parse::<Viewpoint>() {
            Err(VisualizationError::UnknownViewpoint(name)) => assert_eq!(name, "Bottom"),
            other => panic!("Expected UnknownViewpoint, got {:?}", other),
        }
    }

    #[test]
    fn test_compute_bounds() {
        let [x, y, z] = compute_bounds(&[[0.0, 5.0, 2.0], [4.0, 5.0, -2.0]]);
        assert_eq!(x, 0.0..4.0);
        assert_eq!(y, 4.0..6.0);
        assert_eq!(z, -2.0..2.0);

        let [x, _, _] = compute_bounds(&[]);
        assert_eq!(x, -1.0..1.0);
    }

    #[test]
    fn test_box_edges() {
        let edges = box_edges(&(0.0..1.0), &(0.0..2.0), &(0.0..3.0));
        assert_eq!(edges.len(), 12);
        for [a, b] in edges {
            let differing = (0..3).filter(|&i| a[i] != b[i]).count();
            assert_eq!(differing, 1);
        }
    }

    #[test]
    fn test_png_renderer_writes_image() {
        let dir = tempdir().unwrap();
        let settings = RenderConfig {
            width: 200,
            height: 150,
            ..RenderConfig::default()
        };
        let mut renderer = PngRenderer::new(dir.path().join("images"), settings);
        let cloud = PointCloud::from_xyz(vec![0.0, 1.0, 2.0], vec![0.0, 1.0, 0.5], vec![0.0, 3.0, 1.0]);

        renderer.render(&cloud, "Front", 0..5).unwrap();

        assert!(dir.path().join("images").join("batch_0_5_Front.png").exists());
    }

    #[test]
    fn test_png_renderer_rejects_unknown_view_before_drawing() {
        let dir = tempdir().unwrap();
        let mut renderer = PngRenderer::new(dir.path().join("images"), RenderConfig::default());

        let result = renderer.render(&PointCloud::new(), "Sideways", 0..5);

        assert!(matches!(result, Err(VisualizationError::UnknownViewpoint(_))));
        assert!(!dir.path().join("images").exists());
    }
}
