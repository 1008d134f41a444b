use nalgebra::{Vector2, Vector3};

use crate::calibration::{CameraIntrinsics, CalibrationModel};
use crate::types::{DepthFrame, NO_DEPTH};

/// Bound on the fixed-point distortion inversion. Twenty steps is ample for
/// the moderate distortion this model is fitted to; pixels that still have
/// not converged are dropped rather than emitted with a bad estimate.
const MAX_UNDISTORT_ITERATIONS: usize = 20;

/// Convergence tolerance for the inversion, measured as reprojected pixel
/// error (millipixel accuracy is far below the rounding granularity).
const UNDISTORT_TOLERANCE_PX: f32 = 1e-3;

/// Applies the forward distortion model to a normalized image-plane
/// coordinate: rational radial (k1..k6) plus tangential (p1, p2), evaluated
/// about the center of distortion (codx, cody).
fn distort(intr: &CameraIntrinsics, n: Vector2<f32>) -> Vector2<f32> {
    let x = n.x - intr.codx;
    let y = n.y - intr.cody;

    let r2 = x * x + y * y;
    let r4 = r2 * r2;
    let r6 = r4 * r2;

    let radial = (1.0 + intr.k1 * r2 + intr.k2 * r4 + intr.k3 * r6)
        / (1.0 + intr.k4 * r2 + intr.k5 * r4 + intr.k6 * r6);

    let x_tan = 2.0 * intr.p1 * x * y + intr.p2 * (r2 + 2.0 * x * x);
    let y_tan = intr.p1 * (r2 + 2.0 * y * y) + 2.0 * intr.p2 * x * y;

    Vector2::new(
        x * radial + x_tan + intr.codx,
        y * radial + y_tan + intr.cody,
    )
}

/// Inverts [`distort`] by fixed-point iteration: start at the distorted
/// coordinate and repeatedly subtract the forward-model error. Returns `None`
/// if the iteration has not converged within the bound.
fn undistort(intr: &CameraIntrinsics, n_dist: Vector2<f32>) -> Option<Vector2<f32>> {
    let mut n = n_dist;
    for _ in 0..MAX_UNDISTORT_ITERATIONS {
        let err = distort(intr, n) - n_dist;
        let err_px = Vector2::new(err.x * intr.fx, err.y * intr.fy).norm();
        if err_px < UNDISTORT_TOLERANCE_PX {
            return Some(n);
        }
        n -= err;
    }
    None
}

/// Converts pixel (u, v) into an undistorted normalized coordinate. Pixels
/// whose undistorted radius falls outside the calibrated metric radius are
/// rejected along with non-converging ones.
fn unproject(intr: &CameraIntrinsics, u: f32, v: f32) -> Option<Vector2<f32>> {
    let n_dist = Vector2::new((u - intr.cx) / intr.fx, (v - intr.cy) / intr.fy);
    let n = undistort(intr, n_dist)?;
    if n.norm() > intr.metric_radius {
        return None;
    }
    Some(n)
}

/// Projects a 3D camera-frame point onto the image plane through the forward
/// distortion model. Points at or behind the camera have no projection.
fn project(intr: &CameraIntrinsics, p: &Vector3<f32>) -> Option<Vector2<f32>> {
    if p.z <= 0.0 {
        return None;
    }
    let d = distort(intr, Vector2::new(p.x / p.z, p.y / p.z));
    Some(Vector2::new(
        d.x * intr.fx + intr.cx,
        d.y * intr.fy + intr.cy,
    ))
}

/// Maps a depth frame into the color camera's viewpoint.
///
/// Each valid source sample is unprojected into 3D millimeters, moved into
/// the color camera's frame, and reprojected; when several sources land on
/// one target pixel the nearest (smallest z) wins, so the result does not
/// depend on traversal order. Missing pixels stay [`NO_DEPTH`]. Pure function
/// of its inputs; safe to call concurrently with a shared calibration.
pub fn reproject(depth: &DepthFrame, calibration: &CalibrationModel) -> DepthFrame {
    let mut out = DepthFrame::zeroed(calibration.color.width, calibration.color.height);
    let d_intr = &calibration.depth.intrinsics;
    let c_intr = &calibration.color.intrinsics;
    let extr = &calibration.color.extrinsics;

    for v in 0..depth.height {
        for u in 0..depth.width {
            let d = depth.data[v * depth.width + u];
            if d == NO_DEPTH {
                continue;
            }

            // 1. undistort + unproject into depth-camera millimeters
            let Some(n) = unproject(d_intr, u as f32, v as f32) else {
                continue;
            };
            let d = d as f32;
            let p = Vector3::new(n.x * d, n.y * d, d);

            // 2. transform (depth extrinsics are identity by construction)
            let p_c = extr.rotation * p + extr.translation;

            // 3. project through the color camera
            let Some(px) = project(c_intr, &p_c) else {
                continue;
            };

            // 4. round half-away-from-zero and bounds-check
            let u_c = px.x.round() as isize;
            let v_c = px.y.round() as isize;
            if u_c < 0
                || u_c >= calibration.color.width as isize
                || v_c < 0
                || v_c >= calibration.color.height as isize
            {
                continue;
            }

            let z = p_c.z.round();
            if z < 1.0 || z > f32::from(u16::MAX) {
                continue;
            }
            let z = z as u16;

            // 5. occlusion: nearest sample wins
            let slot = &mut out.data[v_c as usize * calibration.color.width + u_c as usize];
            if *slot == NO_DEPTH || z < *slot {
                *slot = z;
            }
        }
    }
    out
}
