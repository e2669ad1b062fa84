use mireg_core::image::{Grid, ScalarField};
use mireg_core::interpolation::{BoundaryMode, InterpolationKind, ResamplingConfig};
use mireg_core::transform::{DenseFieldFactory, SplineConfig, SplineFactory, TransformationFactory};
use proptest::prelude::*;

fn factories(resampling: ResamplingConfig) -> Vec<Box<dyn TransformationFactory<2>>> {
    vec![
        Box::new(SplineFactory::new(SplineConfig::default(), resampling)),
        Box::new(DenseFieldFactory::new(resampling)),
    ]
}

fn blob(size: [usize; 2]) -> ScalarField<2> {
    let grid = Grid::new(size).unwrap();
    let c = [size[0] as f64 / 2.0, size[1] as f64 / 2.0];
    ScalarField::from_fn(grid, |[y, x]| {
        let dy = y as f64 - c[0];
        let dx = x as f64 - c[1];
        (-(dy * dy + dx * dx) / 40.0).exp()
    })
}

#[test]
fn test_identity_apply_returns_input() {
    let image = blob([24, 31]);
    for kind in [InterpolationKind::Nearest, InterpolationKind::Linear, InterpolationKind::BSpline3] {
        for boundary in [BoundaryMode::Mirror, BoundaryMode::Constant] {
            let resampling = ResamplingConfig::default()
                .with_interpolation(kind)
                .with_boundary(boundary);
            for factory in factories(resampling) {
                let identity = factory.identity([24, 31]).unwrap();
                let out = identity.apply(&image).unwrap();
                let grid = image.grid();
                for i in 0..grid.len() {
                    if !grid.is_interior(&grid.index_of(i)) {
                        continue;
                    }
                    let (a, b) = (out.values()[i], image.values()[i]);
                    assert!((a - b).abs() < 1e-9, "{} {:?} {:?}", factory.name(), kind, boundary);
                }
            }
        }
    }
}

#[test]
fn test_identity_apply_3d() {
    let grid = Grid::new([6, 7, 8]).unwrap();
    let image = ScalarField::from_fn(grid, |[z, y, x]| (z * 100 + y * 10 + x) as f64);
    let spline = SplineFactory::default();
    let identity = TransformationFactory::<3>::identity(&spline, [6, 7, 8]).unwrap();
    assert_eq!(identity.apply(&image).unwrap(), image);
}

#[test]
fn test_apply_rejects_other_size() {
    let image = blob([10, 10]);
    for factory in factories(ResamplingConfig::default()) {
        let identity = factory.identity([12, 10]).unwrap();
        assert!(identity.apply(&image).is_err());
    }
}

#[test]
fn test_apply_is_deterministic() {
    let image = blob([20, 20]);
    for factory in factories(ResamplingConfig::default()) {
        let mut t = factory.identity([20, 20]).unwrap();
        let p: Vec<f64> = (0..t.degrees_of_freedom()).map(|i| ((i % 13) as f64 - 6.0) * 0.05).collect();
        t.set_parameters(&p).unwrap();
        assert_eq!(t.apply(&image).unwrap(), t.apply(&image).unwrap());
    }
}

proptest! {
    #[test]
    fn test_upscale_reaches_requested_size(h in 4usize..20, w in 4usize..20, dh in 0usize..20, dw in 0usize..20) {
        for factory in factories(ResamplingConfig::default()) {
            let t = factory.identity([h, w]).unwrap();
            let target = [h + dh, w + dw];
            let up = t.upscale(target).unwrap();
            prop_assert_eq!(up.size(), target);
            prop_assert_eq!(up.displacement_field().size(), target);
            prop_assert_eq!(up.parameters().len(), up.degrees_of_freedom());
        }
    }

    #[test]
    fn test_upscale_matches_at_coincident_points(
        values in prop::collection::vec(-1.0f64..1.0, 15 * 15 * 2),
        h in 6usize..16,
        w in 6usize..16,
        odd in (any::<bool>(), any::<bool>()),
    ) {
        // The pyramid halves 2n and 2n - 1 samples alike to n.
        let target = [2 * h - odd.0 as usize, 2 * w - odd.1 as usize];
        let spline = SplineFactory::new(SplineConfig::default().with_rate(3.0), ResamplingConfig::default());
        let dense = DenseFieldFactory::new(ResamplingConfig::default());
        let factories: [&dyn TransformationFactory<2>; 2] = [&spline, &dense];
        for factory in factories {
            let mut t = factory.identity([h, w]).unwrap();
            t.set_parameters(&values[..t.degrees_of_freedom()]).unwrap();
            let up = t.upscale(target).unwrap();
            for y in 0..h {
                for x in 0..w {
                    let coarse = t.displacement_field().at(&[y, x]);
                    let fine = up.displacement_field().at(&[2 * y, 2 * x]);
                    prop_assert!((fine[0] - 2.0 * coarse[0]).abs() < 1e-9, "{} {:?}", factory.name(), target);
                    prop_assert!((fine[1] - 2.0 * coarse[1]).abs() < 1e-9, "{} {:?}", factory.name(), target);
                }
            }
        }
    }
}
