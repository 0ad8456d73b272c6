// crates/rf_physics/src/storage.rs

//! 蓄量更新
//!
//! 显式前向差分：
//!
//! ```text
//! rivsto += (rivinf - rivout) · dt          负值转入漫滩
//! fldsto += (fldinf - fldout - pthout) · dt 负值由河道补偿
//! ```
//!
//! 随后按淹没比例将径流分配到河道与漫滩，并更新全局水量平衡。

use rayon::prelude::*;
use rf_foundation::KahanSum;

use crate::state::SimulationState;

/// 蓄量更新器
#[derive(Debug, Clone, Copy)]
pub struct StorageUpdater {
    parallel_threshold: usize,
}

impl StorageUpdater {
    /// 创建更新器
    pub fn new(parallel_threshold: usize) -> Self {
        Self { parallel_threshold }
    }

    /// 执行一个子步的蓄量更新
    pub fn apply(&self, state: &mut SimulationState, dt: f64) {
        let n = state.len();
        let storage_pre = KahanSum::sum_iter(
            state.rivsto.iter().zip(&state.fldsto).map(|(r, f)| r + f),
        );
        let inflow = dt
            * KahanSum::sum_iter(state.rivinf.iter().zip(&state.fldinf).map(|(r, f)| r + f));
        let outflow = dt
            * KahanSum::sum_iter(
                (0..n).map(|i| state.rivout[i] + state.fldout[i] + state.pthout[i]),
            );

        if n >= self.parallel_threshold {
            Self::flux_parallel(state, dt);
        } else {
            Self::flux_serial(state, dt);
        }

        let storage_next = KahanSum::sum_iter(
            state.rivsto.iter().zip(&state.fldsto).map(|(r, f)| r + f),
        );

        for i in 0..n {
            state.outflw[i] = state.rivout[i] + state.fldout[i];
            let injected = (state.runoff[i] + state.rofsub[i]) * dt;
            state.rivsto[i] += injected * (1.0 - state.fldfrc[i]);
            state.fldsto[i] += injected * state.fldfrc[i];
            state.storge[i] = state.rivsto[i] + state.fldsto[i];
        }

        let balance = &mut state.balance;
        balance.storage_pre = storage_pre;
        balance.storage_next = storage_next;
        balance.inflow = inflow;
        balance.outflow = outflow;
        balance.storage_new = KahanSum::sum_iter(state.storge.iter().copied());
    }

    #[inline]
    #[allow(clippy::too_many_arguments)]
    fn update_cell(
        rivsto: &mut f64,
        fldsto: &mut f64,
        rivinf: f64,
        rivout: f64,
        fldinf: f64,
        fldout: f64,
        pthout: f64,
        dt: f64,
    ) {
        *rivsto += (rivinf - rivout) * dt;
        if *rivsto < 0.0 {
            *fldsto += *rivsto;
            *rivsto = 0.0;
        }
        *fldsto += (fldinf - fldout - pthout) * dt;
        if *fldsto < 0.0 {
            *rivsto = (*rivsto + *fldsto).max(0.0);
            *fldsto = 0.0;
        }
    }

    fn flux_serial(state: &mut SimulationState, dt: f64) {
        for i in 0..state.len() {
            Self::update_cell(
                &mut state.rivsto[i],
                &mut state.fldsto[i],
                state.rivinf[i],
                state.rivout[i],
                state.fldinf[i],
                state.fldout[i],
                state.pthout[i],
                dt,
            );
        }
    }

    fn flux_parallel(state: &mut SimulationState, dt: f64) {
        let rivinf = &state.rivinf;
        let rivout = &state.rivout;
        let fldinf = &state.fldinf;
        let fldout = &state.fldout;
        let pthout = &state.pthout;
        state
            .rivsto
            .par_iter_mut()
            .zip(state.fldsto.par_iter_mut())
            .enumerate()
            .for_each(|(i, (riv, fld))| {
                Self::update_cell(
                    riv, fld, rivinf[i], rivout[i], fldinf[i], fldout[i], pthout[i], dt,
                );
            });
    }
}
