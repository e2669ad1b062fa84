use std::sync::Arc;
use mireg_core::transform::{SplineConfig, SplineFactory};
use mireg_core::{Grid, ScalarField, TransformationFactory};
use mireg_registration::{CostAggregator, CostTermFactory, NccFactory, SsdFactory};

fn field(shift: f64) -> ScalarField<2> {
    let grid = Grid::new([40, 40]).unwrap();
    ScalarField::from_fn(grid, |[y, x]| {
        let (x, y) = (x as f64 - 20.0 - shift, y as f64 - 18.0);
        (-(x * x + y * y) / 50.0).exp() + 0.1 * (0.3 * y).sin()
    })
}

fn evaluate_in_pool(threads: usize) -> (f64, Vec<f64>) {
    let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build().unwrap();
    pool.install(|| {
        let factories: Vec<Arc<dyn CostTermFactory<2>>> = vec![
            Arc::new(SsdFactory::default()),
            Arc::new(NccFactory::new(0.5).unwrap()),
        ];
        let costs = CostAggregator::from_factories(&factories, Arc::new(field(0.0))).unwrap();
        let factory = SplineFactory::new(SplineConfig::default().with_rate(6.0), Default::default());
        let mut transformation = TransformationFactory::<2>::identity(&factory, [40, 40]).unwrap();
        let parameters: Vec<f64> = (0..transformation.degrees_of_freedom())
            .map(|i| 0.05 * ((i * 7 % 13) as f64 - 6.0))
            .collect();
        transformation.set_parameters(&parameters).unwrap();

        let floating = field(1.5);
        let interpolator = transformation.resampling().interpolator(&floating);
        costs.evaluate(transformation.as_ref(), interpolator.as_ref()).unwrap()
    })
}

#[test]
fn test_evaluation_is_independent_of_thread_count() {
    let (value_1, gradient_1) = evaluate_in_pool(1);
    let (value_4, gradient_4) = evaluate_in_pool(4);

    assert!(value_1.is_finite());
    assert_eq!(value_1.to_bits(), value_4.to_bits());
    assert_eq!(gradient_1.len(), gradient_4.len());
    assert!(gradient_1
        .iter()
        .zip(&gradient_4)
        .all(|(a, b)| a.to_bits() == b.to_bits()));
}

#[test]
fn test_value_matches_evaluate() {
    let factories: Vec<Arc<dyn CostTermFactory<2>>> = vec![Arc::new(SsdFactory::default())];
    let costs = CostAggregator::from_factories(&factories, Arc::new(field(0.0))).unwrap();
    let transformation = TransformationFactory::<2>::identity(&SplineFactory::default(), [40, 40]).unwrap();
    let floating = field(2.0);
    let interpolator = transformation.resampling().interpolator(&floating);

    let value = costs.value(transformation.as_ref(), interpolator.as_ref()).unwrap();
    let (evaluated, gradient) = costs.evaluate(transformation.as_ref(), interpolator.as_ref()).unwrap();
    assert!((value - evaluated).abs() < 1e-12);
    assert!(value > 0.0);
    assert!(gradient.iter().any(|g| *g != 0.0));
}
