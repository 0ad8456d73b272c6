// crates/rf_physics/src/fldstg.rs

//! 漫滩水位分配
//!
//! 将单元总蓄量分配为河道蓄量、漫滩蓄量、水深与淹没比例。
//!
//! # 算法
//!
//! 总蓄量不超过河道满槽蓄量时不发生漫滩。否则自下而上累加漫滩层，
//! 找到包含当前蓄量的层后用该层梯度解二次方程求出新增宽度，
//! 水深随蓄量连续变化。所有层都不足以容纳时，超出部分按冻结宽度
//! 均匀抬高水位（顶层开放）。
//!
//! # 并行
//!
//! 每个单元相互独立。单元数超过阈值时使用 rayon 并行计算，
//! 全局总量在计算完成后统一归约。

use rayon::prelude::*;
use rf_foundation::KahanSum;

use crate::state::SimulationState;
use crate::topography::Topography;

/// 单元分配结果
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StagePartition {
    /// 河道蓄量 [m³]
    pub rivsto: f64,
    /// 漫滩蓄量 [m³]
    pub fldsto: f64,
    /// 河道水深 [m]
    pub rivdph: f64,
    /// 漫滩水深 [m]
    pub flddph: f64,
    /// 淹没比例
    pub fldfrc: f64,
    /// 淹没面积 [m²]
    pub fldare: f64,
}

/// 分配单个单元的总蓄量
pub fn partition_cell(topo: &Topography, seq: usize, total: f64) -> StagePartition {
    let rivlen = topo.rivlen[seq];
    let rivwth = topo.rivwth[seq];
    let rivstomax = topo.rivstomax[seq];

    if total <= rivstomax {
        return StagePartition {
            rivsto: total,
            rivdph: (total / rivlen / rivwth).max(0.0),
            ..Default::default()
        };
    }

    let nlfp = topo.nlfp();
    let dwthinc = topo.dwthinc[seq];

    let mut layer = 0;
    let mut sto_fil = rivstomax;
    let mut wth_fil = rivwth;
    let mut dph_fil = 0.0;
    while layer < nlfp && total > topo.fldstomax(seq, layer) {
        sto_fil = topo.fldstomax(seq, layer);
        wth_fil += dwthinc;
        dph_fil += topo.fldgrd(seq, layer) * dwthinc;
        layer += 1;
    }

    let (flddph, wth_add) = if layer == nlfp {
        (dph_fil + (total - sto_fil) / wth_fil / rivlen, 0.0)
    } else {
        let grd = topo.fldgrd(seq, layer);
        if grd > 0.0 {
            let wth_add =
                -wth_fil + (wth_fil * wth_fil + 2.0 * (total - sto_fil) / rivlen / grd).sqrt();
            (dph_fil + grd * wth_add, wth_add)
        } else {
            (dph_fil, 0.0)
        }
    };

    let rivsto = (rivstomax + rivlen * rivwth * flddph).min(total);
    let full_width = dwthinc * nlfp as f64;
    let fldfrc = if full_width > 0.0 {
        ((-rivwth + wth_fil + wth_add) / full_width).clamp(0.0, 1.0)
    } else {
        0.0
    };

    StagePartition {
        rivsto,
        fldsto: (total - rivsto).max(0.0),
        rivdph: rivsto / rivlen / rivwth,
        flddph,
        fldfrc,
        fldare: topo.grarea[seq] * fldfrc,
    }
}

// ============================================================================
// 批量求解
// ============================================================================

/// 漫滩水位求解器
#[derive(Debug, Clone, Copy)]
pub struct FloodStageSolver {
    parallel_threshold: usize,
}

impl FloodStageSolver {
    /// 创建求解器
    pub fn new(parallel_threshold: usize) -> Self {
        Self { parallel_threshold }
    }

    /// 对全部单元执行分配，并更新全局平衡量
    pub fn apply(&self, topo: &Topography, state: &mut SimulationState) {
        let n = state.len();
        let stage_pre = KahanSum::sum_iter(
            state.rivsto.iter().zip(&state.fldsto).map(|(r, f)| r + f),
        );

        if n >= self.parallel_threshold {
            self.apply_parallel(topo, state);
        } else {
            self.apply_serial(topo, state);
        }

        for i in 0..n {
            state.sfcelv[i] = topo.rivelv[i] + state.rivdph[i];
            state.storge[i] = state.rivsto[i] + state.fldsto[i];
        }

        let balance = &mut state.balance;
        balance.stage_pre = stage_pre;
        balance.stage_new = KahanSum::sum_iter(state.storge.iter().copied());
        balance.river_storage = KahanSum::sum_iter(state.rivsto.iter().copied());
        balance.flood_storage = KahanSum::sum_iter(state.fldsto.iter().copied());
        balance.flooded_area = KahanSum::sum_iter(state.fldare.iter().copied());
    }

    fn write(state: &mut SimulationState, i: usize, p: StagePartition) {
        state.rivsto[i] = p.rivsto;
        state.fldsto[i] = p.fldsto;
        state.rivdph[i] = p.rivdph;
        state.flddph[i] = p.flddph;
        state.fldfrc[i] = p.fldfrc;
        state.fldare[i] = p.fldare;
    }

    fn apply_serial(&self, topo: &Topography, state: &mut SimulationState) {
        for i in 0..state.len() {
            let total = state.rivsto[i] + state.fldsto[i];
            let p = partition_cell(topo, i, total);
            Self::write(state, i, p);
        }
    }

    fn apply_parallel(&self, topo: &Topography, state: &mut SimulationState) {
        let partitions: Vec<StagePartition> = state
            .rivsto
            .par_iter()
            .zip(state.fldsto.par_iter())
            .enumerate()
            .map(|(i, (&r, &f))| partition_cell(topo, i, r + f))
            .collect();
        for (i, p) in partitions.into_iter().enumerate() {
            Self::write(state, i, p);
        }
    }
}
