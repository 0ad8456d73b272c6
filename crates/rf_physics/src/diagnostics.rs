// crates/rf_physics/src/diagnostics.rs

//! 诊断量累加
//!
//! 两层时间平均：
//!
//! 1. **子步层**：每个子步以子步长 `dt` 加权累加，外层步结束时除以累计时间
//! 2. **输出层**：每个外层步以 `DT_DEF` 加权累加子步层平均值，输出时平均并清零
//!
//! 最大值（|outflw|、rivdph、storge）在两层中逐级取最大。

use crate::state::SimulationState;

/// 时间平均变量
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeanFields {
    /// 河道流量
    pub rivout: Vec<f64>,
    /// 漫滩流量
    pub fldout: Vec<f64>,
    /// 总流量
    pub outflw: Vec<f64>,
    /// 河道流速
    pub rivvel: Vec<f64>,
    /// 分汊净出流
    pub pthout: Vec<f64>,
    /// 地表径流
    pub runoff: Vec<f64>,
    /// 地下径流
    pub rofsub: Vec<f64>,
    /// 分汊分层流量
    pub pthflw: Vec<f64>,
}

impl MeanFields {
    /// 创建全零
    pub fn new(nseq: usize, npthflw: usize) -> Self {
        let z = || vec![0.0; nseq];
        Self {
            rivout: z(),
            fldout: z(),
            outflw: z(),
            rivvel: z(),
            pthout: z(),
            runoff: z(),
            rofsub: z(),
            pthflw: vec![0.0; npthflw],
        }
    }

    fn cell_fields_mut(&mut self) -> [&mut Vec<f64>; 7] {
        [
            &mut self.rivout,
            &mut self.fldout,
            &mut self.outflw,
            &mut self.rivvel,
            &mut self.pthout,
            &mut self.runoff,
            &mut self.rofsub,
        ]
    }

    /// 清零
    pub fn reset(&mut self) {
        for field in self.cell_fields_mut() {
            field.iter_mut().for_each(|v| *v = 0.0);
        }
        self.pthflw.iter_mut().for_each(|v| *v = 0.0);
    }

    /// 所有变量乘以 `factor`
    pub fn scale(&mut self, factor: f64) {
        for field in self.cell_fields_mut() {
            field.iter_mut().for_each(|v| *v *= factor);
        }
        self.pthflw.iter_mut().for_each(|v| *v *= factor);
    }

    /// 累加另一组变量乘以权重
    pub fn add_weighted(&mut self, other: &MeanFields, weight: f64) {
        add_into(&mut self.rivout, &other.rivout, weight);
        add_into(&mut self.fldout, &other.fldout, weight);
        add_into(&mut self.outflw, &other.outflw, weight);
        add_into(&mut self.rivvel, &other.rivvel, weight);
        add_into(&mut self.pthout, &other.pthout, weight);
        add_into(&mut self.runoff, &other.runoff, weight);
        add_into(&mut self.rofsub, &other.rofsub, weight);
        add_into(&mut self.pthflw, &other.pthflw, weight);
    }

    /// 累加当前状态乘以权重
    pub fn add_state(&mut self, state: &SimulationState, weight: f64) {
        add_into(&mut self.rivout, &state.rivout, weight);
        add_into(&mut self.fldout, &state.fldout, weight);
        add_into(&mut self.outflw, &state.outflw, weight);
        add_into(&mut self.rivvel, &state.rivvel, weight);
        add_into(&mut self.pthout, &state.pthout, weight);
        add_into(&mut self.runoff, &state.runoff, weight);
        add_into(&mut self.rofsub, &state.rofsub, weight);
        add_into(&mut self.pthflw, &state.pthflw, weight);
    }
}

#[inline]
fn add_into(dst: &mut [f64], src: &[f64], weight: f64) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d += s * weight;
    }
}

#[inline]
fn max_into(dst: &mut [f64], src: impl Iterator<Item = f64>) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d = d.max(s);
    }
}

/// 最大值变量
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaxFields {
    /// 最大流量绝对值
    pub maxflw: Vec<f64>,
    /// 最大河道水深
    pub maxdph: Vec<f64>,
    /// 最大总蓄量
    pub maxsto: Vec<f64>,
}

impl MaxFields {
    /// 创建全零
    pub fn new(nseq: usize) -> Self {
        Self {
            maxflw: vec![0.0; nseq],
            maxdph: vec![0.0; nseq],
            maxsto: vec![0.0; nseq],
        }
    }

    /// 清零
    pub fn reset(&mut self) {
        for field in [&mut self.maxflw, &mut self.maxdph, &mut self.maxsto] {
            field.iter_mut().for_each(|v| *v = 0.0);
        }
    }

    /// 与当前状态取最大
    pub fn update_state(&mut self, state: &SimulationState) {
        max_into(&mut self.maxflw, state.outflw.iter().map(|v| v.abs()));
        max_into(&mut self.maxdph, state.rivdph.iter().copied());
        max_into(&mut self.maxsto, state.storge.iter().copied());
    }

    /// 与另一组最大值取最大
    pub fn update_max(&mut self, other: &MaxFields) {
        max_into(&mut self.maxflw, other.maxflw.iter().copied());
        max_into(&mut self.maxdph, other.maxdph.iter().copied());
        max_into(&mut self.maxsto, other.maxsto.iter().copied());
    }
}

/// 一层累加器
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    /// 加权和
    pub sums: MeanFields,
    /// 平均值（最近一次 finalize 的结果）
    pub mean: MeanFields,
    /// 最大值
    pub max: MaxFields,
    /// 累计时间 [s]
    pub elapsed: f64,
}

impl Accumulator {
    /// 创建
    pub fn new(nseq: usize, npthflw: usize) -> Self {
        Self {
            sums: MeanFields::new(nseq, npthflw),
            mean: MeanFields::new(nseq, npthflw),
            max: MaxFields::new(nseq),
            elapsed: 0.0,
        }
    }

    /// 清零和、最大值与累计时间
    pub fn reset(&mut self) {
        self.sums.reset();
        self.max.reset();
        self.elapsed = 0.0;
    }

    /// 计算平均值
    pub fn finalize(&mut self) {
        self.mean.clone_from(&self.sums);
        if self.elapsed > 0.0 {
            self.mean.scale(1.0 / self.elapsed);
        }
    }
}

/// 两层诊断累加
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    /// 子步层
    pub adaptive: Accumulator,
    /// 输出层
    pub output: Accumulator,
}

impl Diagnostics {
    /// 创建
    pub fn new(nseq: usize, npthflw: usize) -> Self {
        Self {
            adaptive: Accumulator::new(nseq, npthflw),
            output: Accumulator::new(nseq, npthflw),
        }
    }

    /// 外层步开始：清零子步层
    pub fn reset_adaptive(&mut self) {
        self.adaptive.reset();
    }

    /// 子步结束：以 `dt` 加权累加
    pub fn accumulate_substep(&mut self, state: &SimulationState, dt: f64) {
        self.adaptive.sums.add_state(state, dt);
        self.adaptive.max.update_state(state);
        self.adaptive.elapsed += dt;
    }

    /// 外层步结束：子步层平均并累加到输出层
    pub fn finish_outer_step(&mut self, dt_def: f64) {
        self.adaptive.finalize();
        self.output.sums.add_weighted(&self.adaptive.mean, dt_def);
        self.output.max.update_max(&self.adaptive.max);
        self.output.elapsed += dt_def;
    }

    /// 输出时刻：计算输出层平均
    pub fn finalize_output(&mut self) {
        self.output.finalize();
    }

    /// 输出完成后清零输出层
    pub fn reset_output(&mut self) {
        self.output.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_time_weighted_average() {
        let mut diag = Diagnostics::new(1, 0);
        let mut state = SimulationState::new(1, 0, 0);

        diag.reset_adaptive();
        state.rivout[0] = 1.0;
        diag.accumulate_substep(&state, 100.0);
        state.rivout[0] = 4.0;
        diag.accumulate_substep(&state, 200.0);
        diag.finish_outer_step(300.0);
        assert!((diag.adaptive.mean.rivout[0] - 3.0).abs() < EPS);

        diag.reset_adaptive();
        state.rivout[0] = 5.0;
        diag.accumulate_substep(&state, 300.0);
        diag.finish_outer_step(300.0);

        diag.finalize_output();
        assert!((diag.output.mean.rivout[0] - 4.0).abs() < EPS);

        diag.reset_output();
        assert_eq!(diag.output.elapsed, 0.0);
        assert_eq!(diag.output.sums.rivout[0], 0.0);
    }

    #[test]
    fn test_maxima_carry_through_layers() {
        let mut diag = Diagnostics::new(2, 0);
        let mut state = SimulationState::new(2, 0, 0);
        state.outflw = vec![-7.0, 2.0];
        state.rivdph = vec![1.0, 3.0];
        diag.accumulate_substep(&state, 60.0);
        state.outflw = vec![1.0, 1.0];
        state.rivdph = vec![2.0, 1.0];
        diag.accumulate_substep(&state, 60.0);
        diag.finish_outer_step(120.0);
        diag.reset_adaptive();

        assert_eq!(diag.output.max.maxflw, vec![7.0, 2.0]);
        assert_eq!(diag.output.max.maxdph, vec![2.0, 3.0]);
    }
}
