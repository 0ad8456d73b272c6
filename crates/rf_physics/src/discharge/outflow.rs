// crates/rf_physics/src/discharge/outflow.rs

//! 河道与漫滩出流
//!
//! 每个单元只读取本单元与下游单元的当前/上一子步变量，只写本单元流量，
//! 因此单元之间可以并行计算。河口单元以固定下游距离和边界水位代替下游单元。

use rayon::prelude::*;
use rf_foundation::float::{AREA_FLOOR, DEPTH_IMPLICIT_FLOOR, FLOW_MASK_THRESHOLD, OUTFLOW_VOLUME_FLOOR};

use super::{local_inertial_unit, DischargeParams};
use crate::network::NetworkTopology;
use crate::state::SimulationState;
use crate::topography::Topography;

/// 单元出流结果
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CellOutflow {
    /// 河道流量 [m³/s]
    pub rivout: f64,
    /// 河道流速 [m/s]
    pub rivvel: f64,
    /// 漫滩流量 [m³/s]
    pub fldout: f64,
}

/// 下游水面描述
struct Downstream {
    /// 当前水位
    sfc: f64,
    /// 上一子步水位
    sfc_pre: f64,
    /// 距离
    distance: f64,
}

/// 计算全部单元出流，开启漫滩出流时施加回流限制器
pub fn compute_outflow(
    network: &NetworkTopology,
    topo: &Topography,
    state: &mut SimulationState,
    params: &DischargeParams,
    dt: f64,
) {
    let n = network.nseq_all();
    let fluxes: Vec<CellOutflow> = {
        let state = &*state;
        if n >= params.parallel_threshold {
            (0..n)
                .into_par_iter()
                .map(|i| cell_outflow(network, topo, state, params, dt, i))
                .collect()
        } else {
            (0..n)
                .map(|i| cell_outflow(network, topo, state, params, dt, i))
                .collect()
        }
    };

    for (i, f) in fluxes.into_iter().enumerate() {
        state.rivout[i] = f.rivout;
        state.rivvel[i] = f.rivvel;
        state.fldout[i] = f.fldout;
    }

    if params.floodplain_outflow {
        limit_backflow(network, state, params.limiter_fraction, dt);
    }
}

/// 单个单元的出流
pub fn cell_outflow(
    network: &NetworkTopology,
    topo: &Topography,
    state: &SimulationState,
    params: &DischargeParams,
    dt: f64,
    i: usize,
) -> CellOutflow {
    let sfc = state.sfcelv[i];
    let sfc_pre = topo.rivelv[i] + state.rivdph_pre[i];

    match network.next(i) {
        Some(j) => {
            let down = Downstream {
                sfc: state.sfcelv[j],
                sfc_pre: topo.rivelv[j] + state.rivdph_pre[j],
                distance: topo.nxtdst[i],
            };
            let dsfc = sfc.max(down.sfc);
            let dsfc_pre = sfc_pre.max(down.sfc_pre);
            let slope = (sfc - down.sfc) / down.distance;

            let (rivout, rivvel) = river_flow(
                topo,
                state,
                params,
                dt,
                i,
                slope,
                dsfc - topo.rivelv[i],
                dsfc_pre - topo.rivelv[i],
            );
            let fldout = if params.floodplain_outflow {
                floodplain_flow(
                    topo,
                    state,
                    params,
                    dt,
                    i,
                    slope,
                    (dsfc - topo.elevtn[i]).max(0.0),
                    dsfc_pre - topo.elevtn[i],
                    rivout,
                )
            } else {
                0.0
            };
            CellOutflow {
                rivout,
                rivvel,
                fldout,
            }
        }
        None => {
            let slope = (sfc - topo.dwnelv[i]) / params.pdstmth;
            let (rivout, rivvel) = river_flow(
                topo,
                state,
                params,
                dt,
                i,
                slope,
                state.rivdph[i],
                state.rivdph_pre[i],
            );
            let fldout = if params.floodplain_outflow {
                floodplain_flow(
                    topo,
                    state,
                    params,
                    dt,
                    i,
                    slope,
                    sfc - topo.elevtn[i],
                    sfc_pre - topo.elevtn[i],
                    rivout,
                )
            } else {
                0.0
            };
            CellOutflow {
                rivout,
                rivvel,
                fldout,
            }
        }
    }
}

/// 河道流量与流速
#[allow(clippy::too_many_arguments)]
fn river_flow(
    topo: &Topography,
    state: &SimulationState,
    params: &DischargeParams,
    dt: f64,
    i: usize,
    slope: f64,
    flw: f64,
    flw_pre: f64,
) -> (f64, f64) {
    let wth = topo.rivwth[i];
    let area = (wth * flw).max(AREA_FLOOR);
    let flw_im = (flw * flw_pre).max(0.0).sqrt().max(DEPTH_IMPLICIT_FLOOR);

    if !(flw_im > FLOW_MASK_THRESHOLD && area > FLOW_MASK_THRESHOLD) {
        return (0.0, 0.0);
    }
    let q_pre = state.rivout_pre[i] / wth;
    let rivout = wth * local_inertial_unit(q_pre, flw_im, slope, topo.rivman[i], params.gravity, dt);
    (rivout, rivout / area)
}

/// 漫滩流量
#[allow(clippy::too_many_arguments)]
fn floodplain_flow(
    topo: &Topography,
    state: &SimulationState,
    params: &DischargeParams,
    dt: f64,
    i: usize,
    slope: f64,
    flw: f64,
    flw_pre: f64,
    rivout: f64,
) -> f64 {
    let g = params.gravity;
    let slope = slope.clamp(-params.slope_clamp, params.slope_clamp);
    let rivlen = topo.rivlen[i];
    let rivwth = topo.rivwth[i];

    let area = (state.fldsto[i] / rivlen - state.flddph[i] * rivwth).max(0.0);
    let flw_im = (flw * flw_pre).max(0.0).sqrt().max(DEPTH_IMPLICIT_FLOOR);

    let flddph_pre = (state.rivdph_pre[i] - topo.rivhgt[i]).max(0.0);
    let area_pre = (state.fldsto_pre[i] / rivlen - flddph_pre * rivwth).max(DEPTH_IMPLICIT_FLOOR);
    let area_im = (area * area_pre).sqrt().max(DEPTH_IMPLICIT_FLOOR);

    if !(flw_im > FLOW_MASK_THRESHOLD && area > FLOW_MASK_THRESHOLD) {
        return 0.0;
    }

    let q_pre = state.fldout_pre[i];
    let fldout = (q_pre + g * dt * area_im * slope)
        / (1.0
            + g * dt * params.pmanfld * params.pmanfld * q_pre.abs() * flw_im.powf(-4.0 / 3.0)
                / area_im);

    // 河道与漫滩反向时漫滩流量置零
    if fldout * rivout > 0.0 {
        fldout
    } else {
        0.0
    }
}

/// 回流限制器
///
/// 河段单元的逆向出流在一个子步内不超过其总蓄量的 `fraction`。
pub fn limit_backflow(network: &NetworkTopology, state: &mut SimulationState, fraction: f64, dt: f64) {
    for i in 0..network.nseq_riv() {
        let out = ((-state.rivout[i] - state.fldout[i]) * dt).max(OUTFLOW_VOLUME_FLOOR);
        let rate = (fraction * state.storge[i] / out).min(1.0);
        state.rivout[i] *= rate;
        state.fldout[i] *= rate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fldstg::FloodStageSolver;
    use crate::topography::{CellGeometry, TopographyInput};

    const EPS: f64 = 1e-10;

    fn channel(elevations: &[f64], fldhgt: Vec<f64>) -> (NetworkTopology, Topography) {
        let n = elevations.len();
        let next = (0..n).map(|i| if i + 1 < n { Some(i + 1) } else { None }).collect();
        let network = NetworkTopology::from_sequence(next).unwrap();
        let nlfp = fldhgt.len();
        let mut input = TopographyInput::uniform(
            n,
            &CellGeometry {
                grarea: 1.0e6,
                elevtn: 0.0,
                nxtdst: 1000.0,
                rivlen: 1000.0,
                rivwth: 50.0,
                rivhgt: 2.0,
                rivman: 0.03,
                fldhgt,
            },
        );
        input.elevtn = elevations.to_vec();
        (network, Topography::build(input, nlfp, true).unwrap())
    }

    fn state_at_depth(topo: &Topography, depths: &[f64]) -> SimulationState {
        let n = depths.len();
        let mut state = SimulationState::new(n, 0, 0);
        for i in 0..n {
            state.rivsto[i] = depths[i] * topo.rivlen[i] * topo.rivwth[i];
        }
        FloodStageSolver::new(usize::MAX).apply(topo, &mut state);
        state.store_previous();
        state
    }

    #[test]
    fn test_downhill_flow_positive() {
        let (network, topo) = channel(&[0.2, 0.1, 0.0], vec![1.0]);
        let mut state = state_at_depth(&topo, &[1.0, 1.0, 1.0]);
        compute_outflow(&network, &topo, &mut state, &DischargeParams::default(), 300.0);
        assert!(state.rivout[0] > 0.0);
        assert!(state.rivout[1] > 0.0);
        // 流速 = 流量 / 断面面积
        let area = 50.0 * (state.sfcelv[0] - topo.rivelv[0]);
        assert!((state.rivvel[0] - state.rivout[0] / area).abs() < EPS);
    }

    #[test]
    fn test_expected_first_step_discharge() {
        let (network, topo) = channel(&[0.1, 0.0], vec![1.0]);
        let mut state = state_at_depth(&topo, &[1.0, 1.0]);
        compute_outflow(&network, &topo, &mut state, &DischargeParams::default(), 300.0);
        // 静水起步: q = w * g * dt * h * S
        let expected = 50.0 * 9.8 * 300.0 * 1.0 * (0.1 / 1000.0);
        assert!((state.rivout[0] - expected).abs() < 1e-8);
    }

    #[test]
    fn test_dry_cell_no_flow() {
        let (network, topo) = channel(&[0.1, 0.0], vec![1.0]);
        let mut state = state_at_depth(&topo, &[0.0, 0.0]);
        compute_outflow(&network, &topo, &mut state, &DischargeParams::default(), 300.0);
        assert_eq!(state.rivout[0], 0.0);
        assert_eq!(state.rivvel[0], 0.0);
        assert_eq!(state.rivout[1], 0.0);
    }

    #[test]
    fn test_backflow_limited_to_storage_fraction() {
        let (network, topo) = channel(&[0.0, 5.0], vec![1.0]);
        let mut state = state_at_depth(&topo, &[0.01, 2.0]);
        compute_outflow(&network, &topo, &mut state, &DischargeParams::default(), 300.0);
        assert!(state.rivout[0] < 0.0);
        let removed = -(state.rivout[0] + state.fldout[0]) * 300.0;
        assert!(removed <= 0.05 * state.storge[0] + 1e-9);
    }

    #[test]
    fn test_channel_only_backflow_not_limited() {
        let (network, topo) = channel(&[0.0, 5.0], vec![1.0]);
        let mut state = state_at_depth(&topo, &[0.01, 2.0]);
        let params = DischargeParams {
            floodplain_outflow: false,
            ..Default::default()
        };
        compute_outflow(&network, &topo, &mut state, &params, 300.0);
        let unlimited = cell_outflow(&network, &topo, &state, &params, 300.0, 0);
        assert!(unlimited.rivout < 0.0);
        assert_eq!(state.rivout[0], unlimited.rivout);
        assert!(-state.rivout[0] * 300.0 > 0.05 * state.storge[0]);
    }

    #[test]
    fn test_floodplain_flow_follows_river_direction() {
        let (network, topo) = channel(&[0.5, 0.0, 0.0], vec![1.0]);
        let mut state = state_at_depth(&topo, &[10.0, 3.0, 3.0]);
        assert!(state.fldsto[0] > 0.0);
        compute_outflow(&network, &topo, &mut state, &DischargeParams::default(), 60.0);
        assert!(state.rivout[0] > 0.0);
        assert!(state.fldout[0] > 0.0);

        let params = DischargeParams {
            floodplain_outflow: false,
            ..Default::default()
        };
        compute_outflow(&network, &topo, &mut state, &params, 60.0);
        assert_eq!(state.fldout[0], 0.0);
    }

    #[test]
    fn test_parallel_matches_serial() {
        let elevations: Vec<f64> = (0..50).map(|i| 5.0 - 0.1 * i as f64).collect();
        let (network, topo) = channel(&elevations, vec![1.0]);
        let depths: Vec<f64> = (0..50).map(|i| 0.5 + 0.05 * (i % 7) as f64).collect();
        let mut a = state_at_depth(&topo, &depths);
        let mut b = a.clone();
        let serial = DischargeParams {
            parallel_threshold: usize::MAX,
            ..Default::default()
        };
        let parallel = DischargeParams {
            parallel_threshold: 0,
            ..Default::default()
        };
        compute_outflow(&network, &topo, &mut a, &serial, 120.0);
        compute_outflow(&network, &topo, &mut b, &parallel, 120.0);
        assert_eq!(a.rivout, b.rivout);
        assert_eq!(a.fldout, b.fldout);
    }
}
