// crates/rf_physics/src/discharge/pathway.rs

//! 分汊通道流量
//!
//! 两端水面坡度截断在 ±slope_clamp，每层按各自宽度与 Manning 系数求解，
//! 层间求和得到通道净流量。随后限制单个子步内的交换量不超过两端较小
//! 总蓄量的 `limiter_fraction`，所有层按同一比例缩放。

use rf_foundation::float::FLOW_MASK_THRESHOLD;

use super::{local_inertial_unit, DischargeParams};
use crate::network::PathwaySet;
use crate::state::SimulationState;
use crate::topography::Topography;

/// 半隐式水深的下限参考水深 [m]
const PATHWAY_DEPTH_REFERENCE: f64 = 0.01;

/// 计算全部分汊通道流量
pub fn compute_pathway_flow(
    pathways: &PathwaySet,
    topo: &Topography,
    state: &mut SimulationState,
    params: &DischargeParams,
    dt: f64,
) {
    let g = params.gravity;
    let nlev = pathways.npthlev;

    for p in 0..pathways.len() {
        let up = pathways.upstream[p];
        let dn = pathways.downstream[p];

        let slope = ((state.sfcelv[up] - state.sfcelv[dn]) / pathways.distance[p])
            .clamp(-params.slope_clamp, params.slope_clamp);
        let sfc = state.sfcelv[up].max(state.sfcelv[dn]);
        let sfc_pre = (topo.rivelv[up] + state.rivdph_pre[up])
            .max(topo.rivelv[dn] + state.rivdph_pre[dn]);

        let mut sum = 0.0;
        for l in 0..nlev {
            let k = pathways.index(p, l);
            let wth = pathways.width[k];
            let flw = (sfc - pathways.elevation[k]).max(0.0);
            let flw_pre = (sfc_pre - pathways.elevation[k]).max(0.0);
            let flw_im = (flw * flw_pre)
                .sqrt()
                .max((flw * PATHWAY_DEPTH_REFERENCE).sqrt());

            let q = if flw_im > FLOW_MASK_THRESHOLD && wth > 0.0 {
                let q_pre = state.pthflw_pre[k] / wth;
                wth * local_inertial_unit(q_pre, flw_im, slope, pathways.manning[l], g, dt)
            } else {
                0.0
            };
            state.pthflw[k] = q;
            sum += q;
        }

        if sum != 0.0 {
            let storage = state.storge[up].min(state.storge[dn]);
            let rate = (params.limiter_fraction * storage / (sum * dt).abs()).min(1.0);
            for l in 0..nlev {
                state.pthflw[pathways.index(p, l)] *= rate;
            }
            sum *= rate;
        }
        state.pthflw_sum[p] = sum;
    }
}
