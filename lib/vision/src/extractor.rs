//! Feature extraction.
//!
//! The core treats extraction as opaque: a [`FeatureExtractor`] turns a
//! preprocessed [`ImageTensor`] into a fixed-length [`Vector`]. Implementations
//! must be deterministic and take `&self` only, so one instance can serve the
//! index build and concurrent queries at the same time.

use crate::preprocess::ImageTensor;
use imgsim_core::{Error, Result, Vector};

/// Static facts about an extractor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorDescriptor {
    pub name: String,
    pub version: u32,
    /// Length of every vector `embed` returns
    pub dim: usize,
}

impl ExtractorDescriptor {
    /// `name/vN`
    pub fn id(&self) -> String {
        format!("{}/v{}", self.name, self.version)
    }
}

pub trait FeatureExtractor: Send + Sync {
    fn descriptor(&self) -> ExtractorDescriptor;

    /// Smallest square input, in pixels, that `embed` accepts
    fn min_input_size(&self) -> usize {
        1
    }

    fn embed(&self, tensor: &ImageTensor) -> Result<Vector>;
}

/// Default pyramid: whole image, quadrants, 4x4 cells
pub const DEFAULT_LEVELS: [usize; 3] = [1, 2, 4];

/// Spatial colour-layout descriptor.
///
/// For every pyramid level `g` the tensor is split into a `g x g` grid and the
/// mean of each channel in each cell is emitted; the per-channel standard
/// deviation over the whole image is appended as a texture cue. Layout is
/// level-major, then cell (row-major), then channel.
#[derive(Debug, Clone)]
pub struct ColorLayoutExtractor {
    levels: Vec<usize>,
}

impl ColorLayoutExtractor {
    pub const NAME: &'static str = "color-layout";
    pub const VERSION: u32 = 1;

    pub fn new(levels: Vec<usize>) -> Result<Self> {
        if levels.is_empty() || levels.contains(&0) {
            return Err(Error::InvalidConfig(
                "pyramid levels must be non-empty and positive".into(),
            ));
        }
        Ok(Self { levels })
    }

    pub fn levels(&self) -> &[usize] {
        &self.levels
    }

    fn largest_grid(&self) -> usize {
        self.levels.iter().copied().max().unwrap_or(1)
    }

    fn dim_for(&self, channels: usize) -> usize {
        let cells: usize = self.levels.iter().map(|g| g * g).sum();
        channels * (cells + 1)
    }
}

impl Default for ColorLayoutExtractor {
    fn default() -> Self {
        Self {
            levels: DEFAULT_LEVELS.to_vec(),
        }
    }
}

/// Mean of `plane` over rows `y0..y1`, columns `x0..x1`
fn cell_mean(plane: &[f32], width: usize, (x0, x1): (usize, usize), (y0, y1): (usize, usize)) -> f32 {
    let count = (x1 - x0) * (y1 - y0);
    if count == 0 {
        return 0.0;
    }
    let mut sum = 0.0f64;
    for y in y0..y1 {
        let row = &plane[y * width..(y + 1) * width];
        sum += row[x0..x1].iter().map(|&v| v as f64).sum::<f64>();
    }
    (sum / count as f64) as f32
}

fn std_dev(plane: &[f32]) -> f32 {
    if plane.is_empty() {
        return 0.0;
    }
    let n = plane.len() as f64;
    let mean = plane.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = plane.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;
    var.sqrt() as f32
}

impl FeatureExtractor for ColorLayoutExtractor {
    fn descriptor(&self) -> ExtractorDescriptor {
        ExtractorDescriptor {
            name: Self::NAME.to_string(),
            version: Self::VERSION,
            dim: self.dim_for(3),
        }
    }

    fn min_input_size(&self) -> usize {
        self.largest_grid()
    }

    fn embed(&self, tensor: &ImageTensor) -> Result<Vector> {
        let (w, h, channels) = (tensor.width(), tensor.height(), tensor.channels());
        let largest = self.largest_grid();
        if w < largest || h < largest {
            return Err(Error::Extraction(format!(
                "tensor {}x{} is smaller than the {}x{} grid",
                w, h, largest, largest
            )));
        }

        let mut features = Vec::with_capacity(self.dim_for(channels));
        for &grid in &self.levels {
            for gy in 0..grid {
                let rows = (gy * h / grid, (gy + 1) * h / grid);
                for gx in 0..grid {
                    let cols = (gx * w / grid, (gx + 1) * w / grid);
                    for c in 0..channels {
                        features.push(cell_mean(tensor.plane(c), w, cols, rows));
                    }
                }
            }
        }
        for c in 0..channels {
            features.push(std_dev(tensor.plane(c)));
        }

        Ok(Vector::new(features))
    }
}
