// crates/rf_physics/tests/adaptive_step.rs

//! 自适应子步收敛性
//!
//! 低 Froude 数河道上，1 小时外层步经自适应拆分的结果应与
//! 60 s 固定步长的结果接近。

mod common;

use rf_physics::adaptive::AdaptiveStepController;
use rf_physics::driver::{NullOutput, NullRestart, Simulation};
use rf_physics::forcing::ConstantRunoff;
use rf_physics::state::SimulationState;

const N: usize = 5;

fn gentle_channel_run(dt: f64, adaptive: bool) -> (SimulationState, Option<usize>) {
    let network = common::straight_network(N);
    let geometry = common::cell(5.0, vec![1.0, 2.0]);
    let elevations: Vec<f64> = (0..N).map(|i| 0.01 * (N - 1 - i) as f64).collect();
    let topo = common::channel_topography(&elevations, &geometry, Some(vec![-2.0; N]));

    let mut config = common::run_config(24, dt, 2);
    config.features.adaptive_step = adaptive;
    let mut sim = Simulation::new(config, network, topo).unwrap();

    let mut runoff = vec![0.0; N];
    runoff[0] = 5.0;
    let mut source = ConstantRunoff::surface(runoff);
    sim.run(&mut source, &mut NullOutput, &mut NullRestart).unwrap();
    if let Some(plan) = sim.last_plan() {
        assert!(plan.dt <= plan.dt_min * (1.0 + 1e-12));
    }
    let nt = sim.last_plan().map(|p| p.nt);
    (sim.state().clone(), nt)
}

#[test]
fn test_adaptive_splits_long_step() {
    let (_, nt) = gentle_channel_run(3600.0, true);
    assert!(nt.unwrap() > 1);

    let (_, nt) = gentle_channel_run(3600.0, false);
    assert_eq!(nt, Some(1));
}

#[test]
fn test_substep_never_exceeds_stability_limit() {
    let network = common::straight_network(2);
    let geometry = common::cell(20.0, vec![1.0]);
    let topo = common::channel_topography(&[0.0, 0.0], &geometry, None);
    let state = common::still_state(&topo, &[10.0, 10.0], 0, 0);

    let dt_min = 0.7 * 1000.0 / (9.8_f64 * 10.0).sqrt();
    for ratio in [1.0, 1.005, 2.005, 2.5, 7.009] {
        let controller = AdaptiveStepController::new(ratio * dt_min, 0.7, 9.8, 1.0e5, true);
        let plan = controller.plan(&network, &topo, &state);
        assert!(plan.dt <= plan.dt_min * (1.0 + 1e-12), "ratio {}: {:?}", ratio, plan);
        assert!((plan.dt * plan.nt as f64 - ratio * dt_min).abs() < 1e-6);
    }

    let plan = AdaptiveStepController::new(2.005 * dt_min, 0.7, 9.8, 1.0e5, true)
        .plan(&network, &topo, &state);
    assert_eq!(plan.nt, 3);
}

#[test]
fn test_adaptive_matches_fine_fixed_step() {
    let (coarse, _) = gentle_channel_run(3600.0, true);
    let (fine, nt) = gentle_channel_run(60.0, false);
    assert_eq!(nt, Some(1));

    for i in 0..N {
        let a = coarse.rivsto[i];
        let b = fine.rivsto[i];
        let rel = (a - b).abs() / b.max(1.0);
        assert!(rel < 0.02, "cell {}: {} vs {}", i, a, b);
    }
    let total_coarse = common::total_storage(&coarse);
    let total_fine = common::total_storage(&fine);
    assert!((total_coarse - total_fine).abs() / total_fine < 0.01);
}
