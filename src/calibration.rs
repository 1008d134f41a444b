use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Calibration document errors. All of these are fatal for a run: no frame
/// may be processed without a fully valid [`CalibrationModel`].
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("calibration document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing field `{0}` in calibration document")]
    MissingField(String),

    #[error("field `{field}` has {got} elements, expected {expected}")]
    WrongLength {
        field: String,
        expected: usize,
        got: usize,
    },

    #[error("field `{0}` is not a finite number")]
    NotANumber(String),

    #[error("rotation matrix is not orthonormal (max deviation {0})")]
    NotOrthonormal(f32),

    #[error("rotation matrix is a reflection (determinant {0})")]
    Reflection(f32),

    #[error("metric radius must be positive, got {0}")]
    BadMetricRadius(f32),
}

/// Pinhole intrinsics with the rational radial (k1..k6) + tangential (p1, p2)
/// distortion model. `codx`/`cody` shift the center of distortion away from
/// the principal point; `metric_radius` bounds the normalized radius within
/// which the distortion fit is trustworthy.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct CameraIntrinsics {
    pub cx: f32,
    pub cy: f32,
    pub fx: f32,
    pub fy: f32,
    pub k1: f32,
    pub k2: f32,
    pub k3: f32,
    pub k4: f32,
    pub k5: f32,
    pub k6: f32,
    pub codx: f32,
    pub cody: f32,
    pub p1: f32,
    pub p2: f32,
    pub metric_radius: f32,
}

/// Rigid transform from this camera's frame into the rig reference frame.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CameraExtrinsics {
    pub rotation: Matrix3<f32>,
    pub translation: Vector3<f32>,
}

impl CameraExtrinsics {
    pub fn identity() -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
        }
    }
}

/// One camera of the rig: optics plus native sensor resolution.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CameraCalibration {
    pub intrinsics: CameraIntrinsics,
    pub extrinsics: CameraExtrinsics,
    pub width: usize,
    pub height: usize,
}

/// Immutable two-camera calibration. The depth camera defines the reference
/// frame, so its extrinsics are always the identity; the full depth-to-color
/// offset lives in the color camera's extrinsics. Built once per run and
/// shared by reference across all parallel reprojection work.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CalibrationModel {
    pub depth: CameraCalibration,
    pub color: CameraCalibration,
}

/// Order of the 15 values in an intrinsic parameter block.
const INTRINSIC_PARAM_COUNT: usize = 15;

impl CameraIntrinsics {
    /// Builds intrinsics from the fixed-width positional record emitted by
    /// the calibration tool: cx, cy, fx, fy, k1..k6, codx, cody, p2, p1,
    /// then a metric-radius placeholder that is ignored in favor of the
    /// document-level scalar. Note p2 precedes p1.
    fn from_params(p: &[f32; INTRINSIC_PARAM_COUNT], metric_radius: f32) -> Self {
        Self {
            cx: p[0],
            cy: p[1],
            fx: p[2],
            fy: p[3],
            k1: p[4],
            k2: p[5],
            k3: p[6],
            k4: p[7],
            k5: p[8],
            k6: p[9],
            codx: p[10],
            cody: p[11],
            p2: p[12],
            p1: p[13],
            metric_radius,
        }
    }
}

impl CalibrationModel {
    /// Parses a camera-info JSON document into a calibration model.
    ///
    /// The document does not carry sensor resolutions (the producing tool
    /// reads them from the device mode), so the caller supplies them as
    /// `(width, height)` pairs.
    pub fn from_json_str(
        doc: &str,
        depth_resolution: (usize, usize),
        color_resolution: (usize, usize),
    ) -> Result<Self, ParseError> {
        let root: Value = serde_json::from_str(doc)?;
        Self::from_document(&root, depth_resolution, color_resolution)
    }

    /// Parses an already-deserialized calibration document.
    ///
    /// Expected shape: a top-level `contents` array of two records. Record 0
    /// holds the color camera's pose relative to the depth camera plus the
    /// shared metric radius; record 1 holds the two 15-element intrinsic
    /// parameter blocks. The field casing (`parameters` vs `Parameters`)
    /// follows the producing tool verbatim.
    pub fn from_document(
        root: &Value,
        depth_resolution: (usize, usize),
        color_resolution: (usize, usize),
    ) -> Result<Self, ParseError> {
        let contents = get_array(root, "contents", "contents")?;
        if contents.len() < 2 {
            return Err(ParseError::WrongLength {
                field: "contents".into(),
                expected: 2,
                got: contents.len(),
            });
        }

        let ext = get_element(&contents[0], "parameters", "contents[0].parameters", 0)?;
        let rotation: [f32; 9] = get_floats(ext, "rotation", "contents[0].parameters[0].rotation")?;
        let translation: [f32; 3] =
            get_floats(ext, "translation", "contents[0].parameters[0].translation")?;
        let metric_radius = get_number(ext, "metricRadius", "contents[0].parameters[0].metricRadius")?;
        if !(metric_radius > 0.0) {
            return Err(ParseError::BadMetricRadius(metric_radius));
        }

        let ins = &contents[1];
        let color_block = get_element(ins, "Parameters", "contents[1].Parameters", 0)?;
        let depth_block = get_element(ins, "Parameters", "contents[1].Parameters", 1)?;
        let color_params: [f32; INTRINSIC_PARAM_COUNT] =
            get_floats(color_block, "color", "contents[1].Parameters[0].color")?;
        let depth_params: [f32; INTRINSIC_PARAM_COUNT] =
            get_floats(depth_block, "depth", "contents[1].Parameters[1].depth")?;

        let rotation = Matrix3::from_row_slice(&rotation);
        validate_rotation(&rotation)?;

        let color_extrinsics = CameraExtrinsics {
            rotation,
            translation: Vector3::new(translation[0], translation[1], translation[2]),
        };

        Ok(Self {
            depth: CameraCalibration {
                intrinsics: CameraIntrinsics::from_params(&depth_params, metric_radius),
                // The depth camera is the reference frame regardless of the
                // document contents.
                extrinsics: CameraExtrinsics::identity(),
                width: depth_resolution.0,
                height: depth_resolution.1,
            },
            color: CameraCalibration {
                intrinsics: CameraIntrinsics::from_params(&color_params, metric_radius),
                extrinsics: color_extrinsics,
                width: color_resolution.0,
                height: color_resolution.1,
            },
        })
    }
}

fn validate_rotation(r: &Matrix3<f32>) -> Result<(), ParseError> {
    let deviation = (r.transpose() * r - Matrix3::identity()).abs().max();
    if deviation > 1e-3 {
        return Err(ParseError::NotOrthonormal(deviation));
    }
    let det = r.determinant();
    if det < 0.0 {
        return Err(ParseError::Reflection(det));
    }
    Ok(())
}

fn get_array<'a>(value: &'a Value, key: &str, path: &str) -> Result<&'a Vec<Value>, ParseError> {
    value
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| ParseError::MissingField(path.into()))
}

fn get_element<'a>(
    value: &'a Value,
    key: &str,
    path: &str,
    index: usize,
) -> Result<&'a Value, ParseError> {
    let array = get_array(value, key, path)?;
    array
        .get(index)
        .ok_or_else(|| ParseError::MissingField(format!("{path}[{index}]")))
}

fn get_number(value: &Value, key: &str, path: &str) -> Result<f32, ParseError> {
    let raw = value
        .get(key)
        .ok_or_else(|| ParseError::MissingField(path.into()))?;
    as_finite(raw, path)
}

fn get_floats<const N: usize>(value: &Value, key: &str, path: &str) -> Result<[f32; N], ParseError> {
    let array = get_array(value, key, path)?;
    if array.len() != N {
        return Err(ParseError::WrongLength {
            field: path.into(),
            expected: N,
            got: array.len(),
        });
    }
    let mut out = [0.0f32; N];
    for (i, element) in array.iter().enumerate() {
        out[i] = as_finite(element, &format!("{path}[{i}]"))?;
    }
    Ok(out)
}

fn as_finite(value: &Value, path: &str) -> Result<f32, ParseError> {
    value
        .as_f64()
        .map(|f| f as f32)
        .filter(|f| f.is_finite())
        .ok_or_else(|| ParseError::NotANumber(path.into()))
}
