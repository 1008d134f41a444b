use serde::{Deserialize, Serialize};

/// Sample value meaning "no measurement" in a depth raster.
pub const NO_DEPTH: u16 = 0;

/// Dense 16-bit depth raster, row-major, one sample per pixel.
///
/// Samples are distances in millimeters; [`NO_DEPTH`] marks pixels without a
/// measurement. The same type serves as the input (depth camera resolution)
/// and the color-aligned output (color camera resolution).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DepthFrame {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u16>,
}

impl DepthFrame {
    /// An all-invalid frame of the given size.
    pub fn zeroed(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![NO_DEPTH; width * height],
        }
    }

    pub fn sample(&self, u: usize, v: usize) -> u16 {
        self.data[v * self.width + u]
    }
}
