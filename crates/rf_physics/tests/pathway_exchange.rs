// crates/rf_physics/tests/pathway_exchange.rs

//! 分汊通道交换
//!
//! 两条并行河段 `0 → 2`、`1 → 2` 之间有一条两层分汊通道 `0 ↔ 1`。

mod common;

use rf_physics::discharge::{compute_inflow, compute_pathway_flow, DischargeParams};
use rf_physics::driver::{NullOutput, NullRestart, Simulation};
use rf_physics::forcing::ConstantRunoff;
use rf_physics::network::{NetworkTopology, PathwayRecord, PathwaySet, PathwayTable};
use rf_physics::storage::StorageUpdater;
use rf_physics::topography::Topography;

const DT: f64 = 300.0;

fn parallel_reaches() -> (NetworkTopology, Topography) {
    let network = NetworkTopology::from_sequence(vec![Some(2), Some(2), None]).unwrap();
    let geometry = common::cell(5.0, vec![1.0, 2.0]);
    let topo = common::channel_topography(&[0.0; 3], &geometry, Some(vec![-2.0; 3]));
    (network, topo)
}

fn table() -> PathwayTable {
    PathwayTable {
        npthlev: 2,
        records: vec![
            PathwayRecord {
                upstream: (1, 1),
                downstream: (2, 1),
                distance: 1000.0,
                elevation: -3.0,
                depth: 2.0,
                widths: vec![20.0, 10.0],
            },
            // 下游端点不在河网内
            PathwayRecord {
                upstream: (1, 1),
                downstream: (9, 9),
                distance: 1000.0,
                elevation: 0.0,
                depth: 1.0,
                widths: vec![5.0, 0.0],
            },
        ],
    }
}

#[test]
fn test_table_mapping() {
    let (network, _) = parallel_reaches();
    let (set, excluded) = PathwaySet::from_table(&table(), &network, 0.03, 0.1);
    assert_eq!(set.len(), 1);
    assert_eq!(excluded, 1);
    assert_eq!(set.elevation[set.index(0, 0)], -5.0);
    assert_eq!(set.elevation[set.index(0, 1)], -3.0);
    assert_eq!(set.manning, vec![0.03, 0.1]);
}

#[test]
fn test_exchange_from_high_to_low() {
    let (network, topo) = parallel_reaches();
    let (set, _) = PathwaySet::from_table(&table(), &network, 0.03, 0.1);
    let mut state = common::still_state(&topo, &[3.0, 1.0, 1.0], set.len(), set.npthlev);
    let params = DischargeParams::default();
    let before = common::total_storage(&state);

    compute_pathway_flow(&set, &topo, &mut state, &params, DT);
    assert!(state.pthflw_sum[0] > 0.0);
    assert!(state.pthflw[0] > 0.0 && state.pthflw[1] > 0.0);
    let exchanged = state.pthflw_sum[0] * DT;
    let limit = params.limiter_fraction * state.storge[0].min(state.storge[1]);
    assert!(exchanged <= limit + 1e-9);

    compute_inflow(&network, Some(&set), &mut state, DT);
    assert!(state.pthout[0] > 0.0);
    assert!((state.pthout[0] + state.pthout[1]).abs() < 1e-12);
    assert_eq!(state.pthout[2], 0.0);

    state.store_previous();
    StorageUpdater::new(usize::MAX).apply(&mut state, DT);
    assert!(state.balance.flux_error().abs() < 1e-6);
    assert!((common::total_storage(&state) - before).abs() < 1e-6);
}

#[test]
fn test_bifurcation_run_conserves_mass() {
    let (network, topo) = parallel_reaches();
    let mut config = common::run_config(24, 3600.0, 2);
    config.features.bifurcation = true;
    let (events, records) = common::balance_recorder();
    let excluded = std::sync::Arc::new(parking_lot::Mutex::new(0));
    let sink = excluded.clone();
    events.add_fn_listener("excluded", move |event| {
        if let rf_physics::SimulationEvent::PathwaysExcluded { count } = event {
            *sink.lock() = *count;
        }
    });

    let mut sim = Simulation::new(config, network, topo)
        .unwrap()
        .with_pathways(&table())
        .with_events(events);
    let mut source = ConstantRunoff::surface(vec![20.0, 0.0, 0.0]);
    sim.run(&mut source, &mut NullOutput, &mut NullRestart).unwrap();

    assert_eq!(*excluded.lock(), 1);
    for balance in records.lock().iter() {
        assert!(balance.flux_error().abs() < 1e-9 * balance.storage_pre.max(1.0));
    }
    let mean = &sim.diagnostics().adaptive.mean;
    assert!(mean.pthout[0] > 0.0);
    assert!(mean.pthflw[0] > 0.0);
    assert!(sim.state().rivsto.iter().all(|v| *v >= 0.0));
}
