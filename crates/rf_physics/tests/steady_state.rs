// crates/rf_physics/tests/steady_state.rs

//! 零强迫静水稳态
//!
//! 平底河网以海平面一致的初值起步、零径流、海面水平时，
//! 流量保持为零，蓄量不变。

mod common;

use rf_physics::driver::{NullOutput, NullRestart, Simulation};
use rf_physics::forcing::ConstantRunoff;

const N: usize = 6;
const RIVHGT: f64 = 4.0;

fn flat_simulation(adaptive: bool) -> Simulation {
    let network = common::straight_network(N);
    let geometry = common::cell(RIVHGT, vec![1.0, 2.0]);
    // 海面低于岸顶 1 m
    let topo = common::channel_topography(&[0.0; N], &geometry, Some(vec![-1.0; N]));
    let mut config = common::run_config(72, 3600.0, 2);
    config.features.adaptive_step = adaptive;
    Simulation::new(config, network, topo).unwrap()
}

#[test]
fn test_sea_level_initial_condition() {
    let sim = flat_simulation(true);
    let state = sim.state();
    let topo = sim.topography();
    for i in 0..N {
        assert!((state.rivdph_pre[i] - (RIVHGT - 1.0)).abs() < 1e-12);
        assert!((state.rivsto[i] - (RIVHGT - 1.0) * topo.rivlen[i] * topo.rivwth[i]).abs() < 1e-6);
        assert_eq!(state.fldsto[i], 0.0);
    }
}

#[test]
fn test_zero_forcing_stays_at_rest() {
    for adaptive in [false, true] {
        let mut sim = flat_simulation(adaptive);
        let initial = sim.state().rivsto.clone();
        sim.run(&mut ConstantRunoff::zero(N), &mut NullOutput, &mut NullRestart)
            .unwrap();

        let state = sim.state();
        for i in 0..N {
            assert!(state.rivout[i].abs() < 1e-12, "rivout[{}] = {}", i, state.rivout[i]);
            assert_eq!(state.fldout[i], 0.0);
            assert!((state.rivsto[i] - initial[i]).abs() < 1e-6);
        }
        let diag = sim.diagnostics();
        assert!(diag.output.max.maxflw.iter().all(|q| *q < 1e-12));
    }
}
