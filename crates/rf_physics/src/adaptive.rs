// crates/rf_physics/src/adaptive.rs

//! 自适应子步长
//!
//! 局部惯性格式的稳定性条件：
//!
//! ```text
//! dt_min = min(DT_DEF, pcadp · dx / sqrt(g · max(h, 0.01)))
//! NT     = ceil(DT_DEF / dt_min)
//! DT     = DT_DEF / NT
//! ```
//!
//! 河段单元的 `dx` 为至下游距离，河口单元为 `pdstmth`。
//! 子步精确整除外层步长，子步之和严格等于外层步长，且 `DT ≤ dt_min`。

use rf_foundation::float::CFL_DEPTH_FLOOR;

use crate::network::NetworkTopology;
use crate::state::SimulationState;
use crate::topography::Topography;

/// 子步计划
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubStepPlan {
    /// 子步数
    pub nt: usize,
    /// 子步长 [s]
    pub dt: f64,
    /// 稳定性条件给出的最大步长 [s]
    pub dt_min: f64,
}

/// 自适应步长控制器
#[derive(Debug, Clone, Copy)]
pub struct AdaptiveStepController {
    /// 外层步长 [s]
    pub dt_def: f64,
    /// CFL 系数
    pub pcadp: f64,
    /// 重力加速度
    pub gravity: f64,
    /// 河口下游距离
    pub pdstmth: f64,
    /// 是否启用
    pub enabled: bool,
}

impl AdaptiveStepController {
    /// 创建控制器
    pub fn new(dt_def: f64, pcadp: f64, gravity: f64, pdstmth: f64, enabled: bool) -> Self {
        Self {
            dt_def,
            pcadp,
            gravity,
            pdstmth,
            enabled,
        }
    }

    /// 单元允许的最大步长
    #[inline]
    fn cell_limit(&self, distance: f64, depth: f64) -> f64 {
        self.pcadp * distance / (self.gravity * depth.max(CFL_DEPTH_FLOOR)).sqrt()
    }

    /// 根据当前水深规划子步
    pub fn plan(
        &self,
        network: &NetworkTopology,
        topo: &Topography,
        state: &SimulationState,
    ) -> SubStepPlan {
        if !self.enabled {
            return SubStepPlan {
                nt: 1,
                dt: self.dt_def,
                dt_min: self.dt_def,
            };
        }

        let mut dt_min = self.dt_def;
        for i in 0..network.nseq_all() {
            let distance = if network.is_mouth(i) {
                self.pdstmth
            } else {
                topo.nxtdst[i]
            };
            dt_min = dt_min.min(self.cell_limit(distance, state.rivdph[i]));
        }

        let nt = ((self.dt_def / dt_min).ceil() as usize).max(1);
        SubStepPlan {
            nt,
            dt: self.dt_def / nt as f64,
            dt_min,
        }
    }
}
