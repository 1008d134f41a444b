use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageBuffer, Luma};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::calibration::CalibrationModel;
use crate::reproject::reproject;
use crate::types::DepthFrame;

/// A single batch item that could not be completed. Never aborts the run;
/// collected and reported once the remaining frames have finished.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: io::Error,
    },

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("{path} is not a 16-bit grayscale image")]
    NotDepth16 { path: PathBuf },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// Outcome of a batch run. `failures` holds one entry per frame that could
/// not be processed; everything else was written to the output directory.
#[derive(Debug)]
pub struct BatchReport {
    pub processed: usize,
    pub failures: Vec<FrameError>,
}

impl BatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Reprojects every 16-bit depth PNG in `input_dir` into the color camera's
/// viewpoint and writes the results to `output_dir`.
///
/// Frames are independent, so they are mapped across the rayon pool with the
/// calibration shared read-only. Per-frame failures are collected into the
/// report rather than aborting the batch.
pub fn run(
    input_dir: &Path,
    output_dir: &Path,
    calibration: &CalibrationModel,
) -> io::Result<BatchReport> {
    let frames = list_depth_images(input_dir)?;
    fs::create_dir_all(output_dir)?;

    info!(frames = frames.len(), input = %input_dir.display(), "starting alignment batch");

    let results: Vec<Result<(), FrameError>> = frames
        .par_iter()
        .map(|path| process_frame(path, output_dir, calibration))
        .collect();

    let failures: Vec<FrameError> = results.into_iter().filter_map(Result::err).collect();
    for failure in &failures {
        warn!(%failure, "frame skipped");
    }

    let report = BatchReport {
        processed: frames.len() - failures.len(),
        failures,
    };
    info!(
        processed = report.processed,
        failed = report.failures.len(),
        "alignment batch complete"
    );
    Ok(report)
}

/// PNG files directly inside `dir`, sorted for deterministic reporting.
fn list_depth_images(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut frames: Vec<PathBuf> = fs::read_dir(dir)?
        .collect::<io::Result<Vec<_>>>()?
        .into_iter()
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
        })
        .collect();
    frames.sort();
    Ok(frames)
}

fn process_frame(
    path: &Path,
    output_dir: &Path,
    calibration: &CalibrationModel,
) -> Result<(), FrameError> {
    let bytes = fs::read(path).map_err(|source| FrameError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let decoded = image::load_from_memory(&bytes).map_err(|source| FrameError::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    // Depth captures are 16-bit grayscale; anything else in the directory is
    // not a depth frame and is reported rather than silently converted.
    let DynamicImage::ImageLuma16(raster) = decoded else {
        return Err(FrameError::NotDepth16 {
            path: path.to_path_buf(),
        });
    };

    let frame = DepthFrame {
        width: raster.width() as usize,
        height: raster.height() as usize,
        data: raster.into_raw(),
    };

    let aligned = reproject(&frame, calibration);
    let out_path = output_dir.join(output_name(path));
    debug!(input = %path.display(), output = %out_path.display(), "frame aligned");

    let raster: ImageBuffer<Luma<u16>, Vec<u16>> = match ImageBuffer::from_raw(
        aligned.width as u32,
        aligned.height as u32,
        aligned.data,
    ) {
        Some(raster) => raster,
        // reproject always sizes its output to the declared dimensions
        None => unreachable!(),
    };
    raster.save(&out_path).map_err(|source| FrameError::Write {
        path: out_path.clone(),
        source,
    })
}

/// Output file name for an input frame; keeps the capture tool's convention
/// of marking transformed frames by renaming the `Depth` stem to `TrDepth`.
fn output_name(input: &Path) -> String {
    let name = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    if name.contains("Depth") {
        name.replace("Depth", "TrDepth")
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_name_marks_transformed_frames() {
        assert_eq!(
            output_name(Path::new("/captures/Depth_0001.png")),
            "TrDepth_0001.png"
        );
        assert_eq!(output_name(Path::new("frame_0001.png")), "frame_0001.png");
    }
}
