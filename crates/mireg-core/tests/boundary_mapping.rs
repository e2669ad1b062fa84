use mireg_core::image::{Grid, ScalarField};
use mireg_core::interpolation::{BoundaryMode, InterpolationKind, ResamplingConfig};
use proptest::prelude::*;

fn field(size: [usize; 2]) -> ScalarField<2> {
    let grid = Grid::new(size).unwrap();
    ScalarField::from_fn(grid, |[y, x]| ((3 * y + 7 * x) % 11) as f64 - 5.0)
}

proptest! {
    #[test]
    fn test_extension_lands_inside(index in -500isize..500, n in 1usize..40) {
        for mode in [BoundaryMode::Mirror, BoundaryMode::Clamp, BoundaryMode::Periodic] {
            let mapped = mode.map_index(index, n);
            prop_assert!(mapped.is_some());
            prop_assert!(mapped.unwrap() < n, "{:?} mapped {} to {:?} for n={}", mode, index, mapped, n);
        }
    }

    #[test]
    fn test_mirror_is_symmetric_about_edges(offset in 1isize..30, n in 2usize..30) {
        let m = BoundaryMode::Mirror;
        prop_assert_eq!(m.map_index(-offset, n), m.map_index(offset, n));
        let last = n as isize - 1;
        prop_assert_eq!(m.map_index(last + offset, n), m.map_index(last - offset, n));
    }

    #[test]
    fn test_periodic_has_period_n(index in -200isize..200, n in 1usize..30) {
        let p = BoundaryMode::Periodic;
        prop_assert_eq!(p.map_index(index, n), p.map_index(index + n as isize, n));
    }

    #[test]
    fn test_constant_reads_fill_outside(y in -20.0f64..-1.01, x in 0.0f64..7.0, fill in -3.0f64..3.0) {
        let f = field([6, 8]);
        for kind in [InterpolationKind::Nearest, InterpolationKind::Linear, InterpolationKind::BSpline3] {
            let config = ResamplingConfig::default()
                .with_interpolation(kind)
                .with_boundary(BoundaryMode::Constant)
                .with_fill_value(fill);
            let interp = config.interpolator(&f);
            // every tap of every kernel lies above row -1 here
            let y = y - 2.0;
            prop_assert!((interp.sample(&[y, x]) - fill).abs() < 1e-12);
        }
    }

    #[test]
    fn test_linear_stays_within_sample_range(y in -5.0f64..10.0, x in -5.0f64..12.0) {
        let f = field([6, 8]);
        let lo = f.values().iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = f.values().iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        for mode in [BoundaryMode::Mirror, BoundaryMode::Clamp, BoundaryMode::Periodic] {
            let interp = ResamplingConfig::default().with_boundary(mode).interpolator(&f);
            let v = interp.sample(&[y, x]);
            prop_assert!(v >= lo - 1e-12 && v <= hi + 1e-12);
        }
    }
}

#[test]
fn test_bspline_reproduces_samples_3d() {
    let grid = Grid::new([5, 6, 7]).unwrap();
    let f = ScalarField::from_fn(grid, |[z, y, x]| ((z * 13 + y * 5 + x * 3) % 9) as f64);
    let interp = ResamplingConfig::default()
        .with_interpolation(InterpolationKind::BSpline3)
        .interpolator(&f);
    for z in 0..5 {
        for y in 0..6 {
            for x in 0..7 {
                let v = interp.sample(&[z as f64, y as f64, x as f64]);
                assert!((v - f.at(&[z, y, x])).abs() < 1e-9);
            }
        }
    }
}

#[test]
fn test_clamp_repeats_edge_value() {
    let f = field([6, 8]);
    let interp = ResamplingConfig::default()
        .with_boundary(BoundaryMode::Clamp)
        .interpolator(&f);
    assert!((interp.sample(&[-4.0, 3.0]) - f.at(&[0, 3])).abs() < 1e-12);
    assert!((interp.sample(&[2.0, 30.0]) - f.at(&[2, 7])).abs() < 1e-12);
}
