//! End-to-end scenarios S1-S6: a full ZDT1 run driven through
//! [`PerProblemStrategy`], rank/crowding on the exact literal data, an
//! integer-parameter problem, the resample-count contract, and a
//! restart/persistence round trip.

use std::collections::HashMap;

use ndarray::{Array1, array};
use rand::SeedableRng;
use rand::rngs::StdRng;

use moasmo::non_dominated_sort::{crowding_distance, fast_non_dominated_sort};
use moasmo::random::StdRandomGenerator;
use moasmo::space::{ParameterSpace, ParameterSpec};
use moasmo::storage::StorageAdapter;
use moasmo::strategy::{PerProblemStrategy, StrategyConfigBuilder};

fn zdt1(row: ndarray::ArrayView1<f64>) -> Array1<f64> {
    let f1 = row[0];
    let n = row.len() as f64;
    let g = 1.0 + 9.0 * row.iter().skip(1).sum::<f64>() / (n - 1.0);
    let f2 = g * (1.0 - (f1 / g).sqrt());
    array![f1, f2]
}

/// 2D hypervolume of a non-dominated minimization front against `reference`,
/// via the standard slab decomposition (front rows need not be pre-sorted).
fn hypervolume_2d(front: &ndarray::Array2<f64>, reference: (f64, f64)) -> f64 {
    let mut points: Vec<(f64, f64)> = front.rows().into_iter().map(|r| (r[0], r[1])).collect();
    points.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());

    let mut total = 0.0;
    let mut prev_f2 = reference.1;
    for (f1, f2) in points {
        if f1 >= reference.0 || f2 >= reference.1 {
            continue;
        }
        let width = reference.0 - f1;
        let height = prev_f2 - f2;
        if height > 0.0 {
            total += width * height;
        }
        prev_f2 = f2.min(prev_f2);
    }
    total
}

/// S1: driving 5 MO-ASMO epochs on 30-dimensional ZDT1 from a 10*d-point
/// initial sample must recover a front whose hypervolume against (1.1, 1.1)
/// exceeds 0.60.
#[test]
fn scenario_zdt1_hypervolume_exceeds_threshold() {
    let space = ParameterSpace::new(
        (0..30)
            .map(|i| ParameterSpec::continuous(format!("x{i}"), 0.0, 1.0))
            .collect(),
    )
    .unwrap();

    let config = StrategyConfigBuilder::default()
        .n_initial(10)
        .population_size(100)
        .num_generations(100)
        .build()
        .unwrap();
    let rng = StdRandomGenerator::new_from_seed(Some(2026));
    let mut strategy = PerProblemStrategy::new(space, 2, 0, config, rng).unwrap();

    for _ in 0..5 {
        while let Some(request) = strategy.get_next_request() {
            let y = zdt1(request.x.view());
            strategy
                .complete_request(request.x, y, None, None, request.y_pred)
                .unwrap();
        }
        strategy.step().unwrap();
    }

    let (_, best_y) = strategy.get_best_evals(false);
    let hv = hypervolume_2d(&best_y, (1.1, 1.1));
    assert!(hv > 0.60, "hypervolume {hv} did not exceed 0.60");
}

/// S2: rank assignment on the literal example matrix — the first five rows
/// are rank 0, the last two are rank 1.
#[test]
fn scenario_rank_assignment() {
    let y = array![
        [1.0, 5.0],
        [2.0, 4.0],
        [3.0, 3.0],
        [4.0, 2.0],
        [5.0, 1.0],
        [2.0, 6.0],
        [6.0, 2.0],
    ];
    let fronts = fast_non_dominated_sort(y.view());

    let mut rank = vec![usize::MAX; y.nrows()];
    for (r, front) in fronts.iter().enumerate() {
        for &idx in front {
            rank[idx] = r;
        }
    }

    assert_eq!(&rank[0..5], &[0, 0, 0, 0, 0]);
    assert_eq!(&rank[5..7], &[1, 1]);
}

/// S3: crowding distance on five collinear rank-0 points — both endpoints
/// must exceed every interior distance, and the three interior distances
/// must agree within 1e-12.
#[test]
fn scenario_crowding_on_a_line() {
    let y = array![[0.0, 1.0], [0.25, 0.75], [0.5, 0.5], [0.75, 0.25], [1.0, 0.0]];
    let d = crowding_distance(y.view());

    assert!(d[0].is_infinite());
    assert!(d[4].is_infinite());
    for &interior in &[d[1], d[2], d[3]] {
        assert!(d[0] > interior);
        assert!(d[4] > interior);
    }
    assert!((d[1] - d[2]).abs() < 1e-12);
    assert!((d[2] - d[3]).abs() < 1e-12);
}

/// S4: an integer-valued decision variable stays integral through every
/// recorded evaluation, and the discovered Pareto set spans its full range.
#[test]
fn scenario_integer_parameter_stays_integral() {
    let space = ParameterSpace::new(vec![
        ParameterSpec::integer("k", 1.0, 5.0),
        ParameterSpec::continuous("x", 0.0, 1.0),
    ])
    .unwrap();

    let config = StrategyConfigBuilder::default()
        .n_initial(20)
        .population_size(40)
        .num_generations(20)
        .build()
        .unwrap();
    let rng = StdRandomGenerator::new_from_seed(Some(11));
    let mut strategy = PerProblemStrategy::new(space, 2, 0, config, rng).unwrap();

    for _ in 0..3 {
        while let Some(request) = strategy.get_next_request() {
            let k = request.x[0];
            let x = request.x[1];
            let y = array![k + x * 0.0, -k + x];
            strategy
                .complete_request(request.x, y, None, None, request.y_pred)
                .unwrap();
        }
        strategy.step().unwrap();
    }

    let (all_x, _) = strategy.get_evals();
    for row in all_x.rows() {
        let k = row[0];
        assert_eq!(k, k.round(), "k={k} is not integral");
        assert!((1.0..=5.0).contains(&k));
    }

    let (best_x, _) = strategy.get_best_evals(false);
    let ks: Vec<i64> = best_x.column(0).iter().map(|&v| v.round() as i64).collect();
    assert!(ks.contains(&1), "Pareto set missing k=1");
    assert!(ks.contains(&5), "Pareto set missing k=5");
}

/// S5: with `pop=100` and `resample_fraction=0.23`, each epoch enqueues
/// exactly 23 requests.
#[test]
fn scenario_resample_count_matches_fraction() {
    let space = ParameterSpace::new(vec![
        ParameterSpec::continuous("x0", 0.0, 1.0),
        ParameterSpec::continuous("x1", 0.0, 1.0),
        ParameterSpec::continuous("x2", 0.0, 1.0),
    ])
    .unwrap();

    let config = StrategyConfigBuilder::default()
        .n_initial(30)
        .population_size(100)
        .num_generations(5)
        .resample_fraction(0.23)
        .build()
        .unwrap();
    let rng = StdRandomGenerator::new_from_seed(Some(13));
    let mut strategy = PerProblemStrategy::new(space, 2, 0, config, rng).unwrap();

    while let Some(request) = strategy.get_next_request() {
        let y = array![request.x[0], request.x.iter().sum::<f64>()];
        strategy
            .complete_request(request.x, y, None, None, request.y_pred)
            .unwrap();
    }
    strategy.step().unwrap();

    let mut enqueued = 0;
    while strategy.get_next_request().is_some() {
        enqueued += 1;
    }
    assert_eq!(enqueued, 23);
}

/// S6: restart consistency — a fresh strategy seeded from a persisted
/// history after 2 epochs sees the same accumulated history size the
/// original run had reached.
#[test]
fn scenario_restart_sees_same_history_size() {
    let space = ParameterSpace::new(vec![
        ParameterSpec::continuous("x0", 0.0, 1.0),
        ParameterSpec::continuous("x1", 0.0, 1.0),
    ])
    .unwrap();

    let config = || {
        StrategyConfigBuilder::default()
            .n_initial(2)
            .population_size(10)
            .num_generations(2)
            .build()
            .unwrap()
    };

    let path = std::env::temp_dir().join(format!(
        "moasmo_scenario_restart_{}.bin",
        std::process::id()
    ));
    let mut storage = StorageAdapter::new("opt-restart", &path);
    storage.register_problem(
        "p0",
        &space,
        vec!["y0".to_string(), "y1".to_string()],
        vec![],
        vec![],
        HashMap::new(),
    );

    let original_history_len;
    {
        let rng = StdRandomGenerator::new(StdRng::seed_from_u64(77));
        let mut strategy = PerProblemStrategy::new(space.clone(), 2, 0, config(), rng).unwrap();
        for _ in 0..2 {
            while let Some(request) = strategy.get_next_request() {
                let y = array![request.x[0], request.x[1]];
                strategy
                    .complete_request(request.x, y, None, None, request.y_pred)
                    .unwrap();
            }
            // Mirrors the scheduler's END-OF-EPOCH order: persist this
            // epoch's completions before `step()` folds them into history.
            storage.save_evals("p0", strategy.completed()).unwrap();
            strategy.step().unwrap();
        }
        original_history_len = strategy.history().len();
    }

    let reloaded = StorageAdapter::load(&path).unwrap();
    let history = reloaded.load_history("p0").unwrap();
    let restored_space = reloaded.parameter_space("p0").unwrap();

    let rng = StdRandomGenerator::new(StdRng::seed_from_u64(99));
    let restarted = PerProblemStrategy::new_from_history(restored_space, 2, 0, config(), history, rng).unwrap();

    assert_eq!(restarted.history().len(), original_history_len);

    let _ = std::fs::remove_file(&path);
}
