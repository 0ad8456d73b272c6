// crates/rf_physics/tests/common/mod.rs

//! 集成测试共享的河网与状态构造

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use parking_lot::Mutex;
use rf_config::RunConfig;
use rf_physics::driver::{EventDispatcher, SimulationEvent};
use rf_physics::fldstg::FloodStageSolver;
use rf_physics::network::NetworkTopology;
use rf_physics::state::{SimulationState, WaterBalance};
use rf_physics::topography::{CellGeometry, Topography, TopographyInput};

/// 标准单元几何：宽 50 m，长 1000 m，n = 0.03
pub fn cell(rivhgt: f64, fldhgt: Vec<f64>) -> CellGeometry {
    CellGeometry {
        grarea: 1.0e6,
        elevtn: 0.0,
        nxtdst: 1000.0,
        rivlen: 1000.0,
        rivwth: 50.0,
        rivhgt,
        rivman: 0.03,
        fldhgt,
    }
}

/// 直线河道 `0 → 1 → ... → n-1(河口)`
pub fn straight_network(n: usize) -> NetworkTopology {
    let next = (0..n).map(|i| if i + 1 < n { Some(i + 1) } else { None }).collect();
    NetworkTopology::from_sequence(next).unwrap()
}

/// 给定地面高程的直线河道地形
pub fn channel_topography(
    elevations: &[f64],
    geometry: &CellGeometry,
    mean_sea_level: Option<Vec<f64>>,
) -> Topography {
    let n = elevations.len();
    let mut input = TopographyInput::uniform(n, geometry);
    input.elevtn = elevations.to_vec();
    input.mean_sea_level = mean_sea_level;
    Topography::build(input, geometry.fldhgt.len(), true).unwrap()
}

/// 以给定河道水深静水起步的状态
pub fn still_state(topo: &Topography, depths: &[f64], npth: usize, npthlev: usize) -> SimulationState {
    let n = depths.len();
    let mut state = SimulationState::new(n, npth, npthlev);
    for i in 0..n {
        state.rivsto[i] = depths[i] * topo.rivlen[i] * topo.rivwth[i];
    }
    FloodStageSolver::new(usize::MAX).apply(topo, &mut state);
    state.store_previous();
    state
}

/// 从 2000-01-01 起运行 `hours` 小时的配置
pub fn run_config(hours: i64, dt: f64, nlfp: usize) -> RunConfig {
    let mut config = RunConfig::default();
    let start = NaiveDate::from_ymd_opt(2000, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    config.time.start = start;
    config.time.end = start + Duration::hours(hours);
    config.time.dt = dt;
    config.time.dtin = 86400.0;
    config.grid.nlfp = nlfp;
    config.physics.parallel_threshold = usize::MAX;
    config.restart.write = false;
    config
}

/// 记录全部水量平衡事件
pub fn balance_recorder() -> (Arc<EventDispatcher>, Arc<Mutex<Vec<WaterBalance>>>) {
    let events = Arc::new(EventDispatcher::new());
    let records = Arc::new(Mutex::new(Vec::new()));
    let sink = records.clone();
    events.add_fn_listener("balance", move |event| {
        if let SimulationEvent::WaterBalance { balance, .. } = event {
            sink.lock().push(*balance);
        }
    });
    (events, records)
}

/// 总蓄量
pub fn total_storage(state: &SimulationState) -> f64 {
    state.rivsto.iter().zip(&state.fldsto).map(|(r, f)| r + f).sum()
}
