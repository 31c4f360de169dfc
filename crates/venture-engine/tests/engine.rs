use venture_core::Value;
use venture_engine::{read, RiplEngine};

#[test]
fn assume_observe_predict_round_trip() {
    let mut engine = RiplEngine::new(7);

    let (_, mean) = engine.assume("mean", &read("(normal 0.0 1.0)").unwrap()).unwrap();
    assert!(matches!(mean, Value::Number(_)));

    let observe_expr = read("(normal mean 1.0)").unwrap();
    let observe_id = engine.observe(&observe_expr, Value::Number(2.0)).unwrap();

    let (_, predicted) = engine.predict(&read("(flip 0.5)").unwrap()).unwrap();
    assert!(matches!(predicted, Value::Boolean(_)));

    engine.forget(observe_id).unwrap();
    // A second forget of the same directive must fail, not silently no-op.
    let err = engine.forget(observe_id).unwrap_err();
    assert_eq!(err.info().code, "already-forgotten");
}

#[test]
fn forget_refuses_assume_directives() {
    let mut engine = RiplEngine::new(1);
    let (assume_id, _) = engine.assume("x", &read("(flip 0.5)").unwrap()).unwrap();
    let err = engine.forget(assume_id).unwrap_err();
    assert_eq!(err.info().code, "forget-assume-unsupported");
}

#[test]
fn sample_is_not_recorded_in_the_directive_log() {
    let mut engine = RiplEngine::new(3);
    let before = engine.directive_log().len();
    let value = engine.sample(&read("(flip 0.5)").unwrap()).unwrap();
    assert!(matches!(value, Value::Boolean(_)));
    assert_eq!(engine.directive_log().len(), before);
}

#[test]
fn mh_inference_on_a_single_observation_runs_deterministically_from_a_seed() {
    let mut first = RiplEngine::new(42);
    first.assume("coin", &read("(flip 0.5)").unwrap()).unwrap();
    first.observe(&read("(normal 0.0 1.0)").unwrap(), Value::Number(1.5)).unwrap();
    first.infer(&read("(mh default one 20)").unwrap()).unwrap();

    let mut second = RiplEngine::new(42);
    second.assume("coin", &read("(flip 0.5)").unwrap()).unwrap();
    second.observe(&read("(normal 0.0 1.0)").unwrap(), Value::Number(1.5)).unwrap();
    second.infer(&read("(mh default one 20)").unwrap()).unwrap();

    let first_hashes: Vec<_> = first.metrics().samples().iter().map(|s| s.trace_hash.clone()).collect();
    let second_hashes: Vec<_> = second.metrics().samples().iter().map(|s| s.trace_hash.clone()).collect();
    assert_eq!(first_hashes, second_hashes);
    assert_eq!(first.metrics().samples().len(), 20);
}

#[test]
fn rejection_mh_succeeds_when_every_node_supplies_a_bound() {
    let mut engine = RiplEngine::new(9);
    engine.observe(&read("(normal 0.0 1.0)").unwrap(), Value::Number(0.2)).unwrap();
    engine.infer(&read("(rejection default one 5)").unwrap()).unwrap();
    assert_eq!(engine.metrics().samples().len(), 5);
}

#[test]
fn cycle_combinator_runs_each_kernel_once_per_round() {
    let mut engine = RiplEngine::new(11);
    engine.assume("a", &read("(flip 0.5)").unwrap()).unwrap();
    engine.observe(&read("(normal 0.0 1.0)").unwrap(), Value::Number(0.3)).unwrap();

    engine
        .infer(&read("(cycle 3 (mh default one 1) (rejection default one 1))").unwrap())
        .unwrap();

    assert_eq!(engine.metrics().samples().len(), 6);
}

#[test]
fn pgibbs_rejects_t_greater_than_one_at_parse_time() {
    let mut engine = RiplEngine::new(2);
    engine.observe(&read("(normal 0.0 1.0)").unwrap(), Value::Number(0.1)).unwrap();
    let err = engine.infer(&read("(pgibbs default one 4 2)").unwrap()).unwrap_err();
    assert_eq!(err.info().code, "pgibbs-t-not-supported");
}

#[test]
fn manifest_carries_the_seed_and_directive_log() {
    let mut engine = RiplEngine::new(99);
    engine.assume("x", &read("(flip 0.5)").unwrap()).unwrap();
    engine.observe(&read("(normal 0.0 1.0)").unwrap(), Value::Number(1.0)).unwrap();

    let manifest = engine.manifest().unwrap();
    assert_eq!(manifest.provenance.seed, 99);
    assert_eq!(manifest.directive_log.len(), 2);
}

#[test]
fn dirichlet_multinomial_die_posterior_mean_lands_in_the_informative_range() {
    let mut engine = RiplEngine::new(17);
    engine
        .assume("die", &read("(dirichlet_multinomial [1.0 1.0 1.0 1.0 1.0 1.0])").unwrap())
        .unwrap();
    // Face 3 is index 2 in the zero-indexed default outcome set.
    for _ in 0..30 {
        engine.observe(&read("(die)").unwrap(), Value::Atom(2)).unwrap();
    }

    // `die` is the only node left in the random-choice registry once every
    // roll above is constrained, so every step below resamples its theta
    // exactly from Dirichlet(counts + alpha) rather than touching anything
    // else. Each predicted roll is immediately forgotten so inspecting the
    // posterior doesn't itself add a new registered random choice.
    let burn_in = 50;
    let total = 250;
    let mut hits = 0usize;
    for i in 0..total {
        engine.infer(&read("(mh default one 1)").unwrap()).unwrap();
        if i >= burn_in {
            let (id, value) = engine.predict(&read("(die)").unwrap()).unwrap();
            if value == Value::Atom(2) {
                hits += 1;
            }
            engine.forget(id).unwrap();
        }
    }

    let mean = hits as f64 / (total - burn_in) as f64;
    assert!((0.7..=0.95).contains(&mean), "posterior mean out of range: {mean}");
}

#[test]
fn normal_hmm_posterior_mean_converges_toward_the_closed_form_value() {
    let mut engine = RiplEngine::new(5);
    engine.assume("x0", &read("(normal 0.0 1.0)").unwrap()).unwrap();
    engine.observe(&read("(normal x0 1.0)").unwrap(), Value::Number(1.0)).unwrap();
    engine.assume("x1", &read("(normal x0 1.0)").unwrap()).unwrap();
    engine.observe(&read("(normal x1 1.0)").unwrap(), Value::Number(2.0)).unwrap();
    engine.assume("x2", &read("(normal x1 1.0)").unwrap()).unwrap();
    engine.observe(&read("(normal x2 1.0)").unwrap(), Value::Number(3.0)).unwrap();
    engine.assume("x3", &read("(normal x2 1.0)").unwrap()).unwrap();
    engine.observe(&read("(normal x3 1.0)").unwrap(), Value::Number(4.0)).unwrap();
    engine.assume("x4", &read("(normal x3 1.0)").unwrap()).unwrap();
    engine.observe(&read("(normal x4 1.0)").unwrap(), Value::Number(5.0)).unwrap();

    let burn_in = 500;
    let total = 2500;
    let mut sum = 0.0;
    let mut count = 0usize;
    for i in 0..total {
        engine.infer(&read("(mh default one 1)").unwrap()).unwrap();
        if i >= burn_in {
            let (_, value) = engine.predict(&read("x4").unwrap()).unwrap();
            sum += value.as_number().unwrap();
            count += 1;
        }
    }

    let mean = sum / count as f64;
    // Closed-form posterior mean for this five-step linear-Gaussian chain is 390/89 ≈ 4.382.
    assert!((mean - 390.0 / 89.0).abs() < 1.0, "posterior mean drifted too far from the closed form: {mean}");
}

#[test]
fn binary_hmm_marginal_converges_toward_the_closed_form_probability() {
    let mut engine = RiplEngine::new(23);
    engine.assume("h1", &read("(flip 0.5)").unwrap()).unwrap();
    engine.observe(&read("(if h1 '(flip 0.8) '(flip 0.1))").unwrap(), Value::Boolean(false)).unwrap();
    engine.assume("h2", &read("(if h1 '(flip 0.7) '(flip 0.3))").unwrap()).unwrap();
    engine.observe(&read("(if h2 '(flip 0.8) '(flip 0.1))").unwrap(), Value::Boolean(false)).unwrap();
    engine.assume("h3", &read("(if h2 '(flip 0.7) '(flip 0.3))").unwrap()).unwrap();
    engine.observe(&read("(if h3 '(flip 0.8) '(flip 0.1))").unwrap(), Value::Boolean(true)).unwrap();
    engine.assume("h4", &read("(if h3 '(flip 0.7) '(flip 0.3))").unwrap()).unwrap();
    engine.observe(&read("(if h4 '(flip 0.8) '(flip 0.1))").unwrap(), Value::Boolean(false)).unwrap();
    engine.assume("h5", &read("(if h4 '(flip 0.7) '(flip 0.3))").unwrap()).unwrap();
    engine.observe(&read("(if h5 '(flip 0.8) '(flip 0.1))").unwrap(), Value::Boolean(false)).unwrap();
    engine.assume("h6", &read("(if h5 '(flip 0.7) '(flip 0.3))").unwrap()).unwrap();

    let burn_in = 500;
    let total = 3000;
    let mut hits = 0usize;
    let mut count = 0usize;
    for i in 0..total {
        engine.infer(&read("(mh default one 1)").unwrap()).unwrap();
        if i >= burn_in {
            let (_, value) = engine.predict(&read("h6").unwrap()).unwrap();
            if value == Value::Boolean(true) {
                hits += 1;
            }
            count += 1;
        }
    }

    let mean = hits as f64 / count as f64;
    // Closed-form marginal P(high) at step 6 for this chain is ≈0.3472.
    assert!((mean - 0.3472).abs() < 0.2, "marginal drifted too far from the closed form: {mean}");
}

#[test]
fn observation_inside_a_branch_stays_pinned_after_its_predicate_is_resampled() {
    let mut engine = RiplEngine::new(31);
    engine.assume("x", &read("(normal 0.0 1.0)").unwrap()).unwrap();
    engine.assume("y", &read("(normal 0.0 1.0)").unwrap()).unwrap();
    engine.assume("f", &read("(mem flip)").unwrap()).unwrap();
    engine.observe(&read("(if (f) 'x 'y)").unwrap(), Value::Number(3.0)).unwrap();

    // `f` is resampled along the way almost certainly (50 steps against a
    // 2-choice registry), swapping which of `x`/`y` the observation's
    // root currently resolves to; the predicted value must stay exactly
    // 3.0 regardless of which branch ends up active.
    engine.infer(&read("(mh default one 50)").unwrap()).unwrap();

    let (_, value) = engine.predict(&read("(if (f) 'x 'y)").unwrap()).unwrap();
    assert_eq!(value, Value::Number(3.0));
}
