use approx::assert_relative_eq;
use cv_core::nalgebra::{Point2, Vector2, Vector3};
use cv_core::{BoardLayout, BoardToCamera, CameraModel, CorrespondenceSet, KeyPoint, Skew3};
use cv_pinhole::{
    BrownConrady, Calibration, CalibrationSolver, CameraIntrinsics, ImageSize, PinholeCamera,
    SolverError,
};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use zhang::{DistortionModel, Zhang};

const IMAGE: ImageSize = ImageSize {
    width: 1280,
    height: 720,
};

fn intrinsics() -> CameraIntrinsics {
    CameraIntrinsics::identity()
        .focals(Vector2::new(820.0, 815.0))
        .principal_point(Point2::new(645.0, 355.0))
}

fn poses() -> Vec<BoardToCamera> {
    vec![
        BoardToCamera::new(Skew3::new(0.35, 0.05, 0.02), Vector3::new(-4.0, -2.0, 11.0)),
        BoardToCamera::new(Skew3::new(-0.3, 0.25, -0.1), Vector3::new(-3.5, -3.0, 12.0)),
        BoardToCamera::new(Skew3::new(0.1, -0.4, 0.15), Vector3::new(-4.5, -2.5, 10.0)),
        BoardToCamera::new(Skew3::new(-0.2, -0.3, 0.3), Vector3::new(-3.0, -2.0, 13.0)),
        BoardToCamera::new(Skew3::new(0.25, 0.35, -0.2), Vector3::new(-4.0, -3.5, 11.5)),
    ]
}

fn observe(
    camera: &PinholeCamera,
    poses: &[BoardToCamera],
    noise: Option<&mut SmallRng>,
) -> Vec<CorrespondenceSet> {
    let layout = BoardLayout::default();
    let mut noise = noise;
    poses
        .iter()
        .map(|&pose| {
            let points: Vec<KeyPoint> = layout
                .points()
                .into_iter()
                .map(|board| {
                    let mut kp = camera.project_board(pose, board).unwrap();
                    if let Some(rng) = noise.as_deref_mut() {
                        kp.0.x += rng.gen_range(-0.2..0.2);
                        kp.0.y += rng.gen_range(-0.2..0.2);
                    }
                    kp
                })
                .collect();
            CorrespondenceSet::from_detection(&layout, &points).unwrap()
        })
        .collect()
}

#[test]
fn ideal_lens_is_recovered_exactly() {
    let camera = PinholeCamera::ideal(intrinsics());
    let truth = poses();
    let views = observe(&camera, &truth, None);
    let calibration = Zhang::new()
        .distortion(DistortionModel::None)
        .calibrate(&views, IMAGE)
        .unwrap();

    assert_eq!(calibration.image_size, IMAGE);
    assert_relative_eq!(
        calibration.intrinsics.focals,
        camera.intrinsics.focals,
        max_relative = 1e-6
    );
    assert_relative_eq!(
        calibration.intrinsics.principal_point,
        camera.intrinsics.principal_point,
        max_relative = 1e-6
    );
    assert_eq!(calibration.intrinsics.skew, 0.0);
    assert!(calibration.distortion.is_identity());

    // One pose per view, in the order the views were given.
    assert_eq!(calibration.poses.len(), truth.len());
    for (estimate, truth) in calibration.poses.iter().zip(&truth) {
        assert_relative_eq!(estimate.translation, truth.translation, epsilon = 1e-5);
        assert_relative_eq!(estimate.rotation.0, truth.rotation.0, epsilon = 1e-6);
    }
}

fn mean_reprojection_error(calibration: &Calibration, views: &[CorrespondenceSet]) -> f64 {
    let camera = calibration.camera();
    let errors: Vec<f64> = views
        .iter()
        .zip(&calibration.poses)
        .flat_map(|(view, &pose)| {
            view.iter()
                .map(move |c| camera.project_board(pose, c.0).unwrap().distance(&c.1))
        })
        .collect();
    errors.iter().sum::<f64>() / errors.len() as f64
}

#[test]
fn radial_distortion_is_refined() {
    let lens = BrownConrady::radial(-0.12, 0.03);
    let camera = PinholeCamera::new(intrinsics(), lens);
    let views = observe(&camera, &poses(), None);

    let pinhole = Zhang::new()
        .distortion(DistortionModel::None)
        .calibrate(&views, IMAGE)
        .unwrap();
    let refined = Zhang::new().calibrate(&views, IMAGE).unwrap();

    assert!(refined.distortion.k1 < 0.0);
    assert_eq!(refined.distortion.p1, 0.0);
    assert_relative_eq!(
        refined.intrinsics.focals,
        camera.intrinsics.focals,
        max_relative = 3e-2
    );
    assert!(
        mean_reprojection_error(&refined, &views) < 0.5 * mean_reprojection_error(&pinhole, &views)
    );
}

#[test]
fn noisy_corners_stay_close() {
    let mut rng = SmallRng::seed_from_u64(0);
    let camera = PinholeCamera::ideal(intrinsics());
    let views = observe(&camera, &poses(), Some(&mut rng));
    let calibration = Zhang::new()
        .distortion(DistortionModel::None)
        .calibrate(&views, IMAGE)
        .unwrap();
    assert_relative_eq!(
        calibration.intrinsics.focals,
        camera.intrinsics.focals,
        max_relative = 2e-2
    );
    let offset = calibration.intrinsics.principal_point - camera.intrinsics.principal_point;
    assert!(offset.norm() < 20.0);
}

#[test]
fn too_few_views() {
    let camera = PinholeCamera::ideal(intrinsics());
    let views = observe(&camera, &poses()[..2], None);
    assert_eq!(
        Zhang::new().calibrate(&views, IMAGE),
        Err(SolverError::InsufficientViews {
            found: 2,
            required: Zhang::MIN_VIEWS
        })
    );
}

#[test]
fn views_must_share_a_layout() {
    let camera = PinholeCamera::ideal(intrinsics());
    let mut views = observe(&camera, &poses()[..3], None);
    let small = BoardLayout::new(cv_core::GridSize::new(3, 3), 1.0);
    let corners: Vec<KeyPoint> = views[0].image_points().take(9).collect();
    views.push(CorrespondenceSet::from_detection(&small, &corners).unwrap());
    assert_eq!(
        Zhang::new().calibrate(&views, IMAGE),
        Err(SolverError::MismatchedCorrespondences {
            view: 3,
            found: 9,
            expected: 54
        })
    );
}
