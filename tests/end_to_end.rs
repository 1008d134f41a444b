use depth_align::batch;
use depth_align::calibration::{CameraCalibration, CameraExtrinsics, CameraIntrinsics};
use depth_align::{reproject, CalibrationModel, DepthFrame, NO_DEPTH};
use image::{ImageBuffer, Luma};
use nalgebra::Vector3;

fn pinhole(fx: f32, fy: f32, cx: f32, cy: f32) -> CameraIntrinsics {
    CameraIntrinsics {
        cx,
        cy,
        fx,
        fy,
        k1: 0.0,
        k2: 0.0,
        k3: 0.0,
        k4: 0.0,
        k5: 0.0,
        k6: 0.0,
        codx: 0.0,
        cody: 0.0,
        p1: 0.0,
        p2: 0.0,
        metric_radius: 1.7,
    }
}

fn camera(
    intrinsics: CameraIntrinsics,
    extrinsics: CameraExtrinsics,
    (width, height): (usize, usize),
) -> CameraCalibration {
    CameraCalibration {
        intrinsics,
        extrinsics,
        width,
        height,
    }
}

/// A flat 1000 mm wall seen by a depth camera at 640x576 maps onto a larger
/// color sensor shifted 50 mm along x. With equal focal lengths the image of
/// the wall is a solid rectangle displaced by the principal-point difference
/// plus the parallax term fx * tx / z = 600 * 50 / 1000 = 30 px.
#[test]
fn translated_wall_lands_where_predicted() {
    let depth_res = (640, 576);
    let color_res = (864, 1536);
    let calibration = CalibrationModel {
        depth: camera(
            pinhole(600.0, 600.0, 319.5, 287.5),
            CameraExtrinsics::identity(),
            depth_res,
        ),
        color: camera(
            pinhole(600.0, 600.0, 431.5, 767.5),
            CameraExtrinsics {
                rotation: nalgebra::Matrix3::identity(),
                translation: Vector3::new(50.0, 0.0, 0.0),
            },
            color_res,
        ),
    };

    let wall = DepthFrame {
        width: depth_res.0,
        height: depth_res.1,
        data: vec![1000; depth_res.0 * depth_res.1],
    };
    let aligned = reproject(&wall, &calibration);

    // (431.5 - 319.5) + 30 = 142 columns right, 767.5 - 287.5 = 480 rows down.
    let (du, dv) = (142, 480);
    for v in 0..color_res.1 {
        for u in 0..color_res.0 {
            let inside = (du..du + depth_res.0).contains(&u) && (dv..dv + depth_res.1).contains(&v);
            let expected = if inside { 1000 } else { NO_DEPTH };
            assert_eq!(aligned.sample(u, v), expected, "pixel ({u}, {v})");
        }
    }
}

#[test]
fn batch_run_reports_bad_frames_and_finishes_the_rest() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();

    let res = (8, 8);
    let calibration = CalibrationModel {
        depth: camera(
            pinhole(100.0, 100.0, 3.5, 3.5),
            CameraExtrinsics::identity(),
            res,
        ),
        color: camera(
            pinhole(100.0, 100.0, 3.5, 3.5),
            CameraExtrinsics::identity(),
            res,
        ),
    };

    let mut samples = vec![0u16; 64];
    for (i, s) in samples.iter_mut().enumerate() {
        *s = 900 + i as u16;
    }
    let frame: ImageBuffer<Luma<u16>, Vec<u16>> =
        ImageBuffer::from_raw(8, 8, samples.clone()).unwrap();
    frame.save(input.path().join("Depth_0001.png")).unwrap();
    frame.save(input.path().join("Depth_0002.png")).unwrap();

    // Not a PNG despite the extension; must be reported, not fatal.
    std::fs::write(input.path().join("Depth_9999.png"), b"not a png").unwrap();
    // Not a depth frame extension; must be ignored entirely.
    std::fs::write(input.path().join("notes.txt"), b"capture log").unwrap();

    let report = batch::run(input.path(), output.path(), &calibration).unwrap();
    assert_eq!(report.processed, 2);
    assert_eq!(report.failures.len(), 1);
    assert!(!report.all_succeeded());

    // Identity rig: the surviving outputs reproduce their inputs under the
    // transformed-frame naming convention.
    let written = image::open(output.path().join("TrDepth_0001.png")).unwrap();
    let written = written.into_luma16();
    assert_eq!(written.into_raw(), samples);
    assert!(output.path().join("TrDepth_0002.png").exists());
    assert!(!output.path().join("TrDepth_9999.png").exists());
}
