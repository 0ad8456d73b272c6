// crates/rf_foundation/src/float.rs

//! 数值常量与有限性检查
//!
//! 局部惯性格式在干单元上依靠下限截断而非报错运行，本模块集中定义这些下限。

use crate::error::{RfError, RfResult};

// ============================================================================
// 数值下限
// ============================================================================

/// 过水断面面积下限 [m²]
pub const AREA_FLOOR: f64 = 1e-10;

/// 半隐式水深下限 [m]
pub const DEPTH_IMPLICIT_FLOOR: f64 = 1e-6;

/// 流量掩码阈值：水深与面积低于此值时流量置零
pub const FLOW_MASK_THRESHOLD: f64 = 1e-5;

/// 回流限制器中出流体积下限 [m³]
pub const OUTFLOW_VOLUME_FLOOR: f64 = 1e-10;

/// 入流裁剪中出流体积阈值 [m³]
pub const CLIP_VOLUME_THRESHOLD: f64 = 1e-8;

/// 自适应步长中最小参考水深 [m]
pub const CFL_DEPTH_FLOOR: f64 = 0.01;

/// 关闭漫滩时河道最大蓄量的替代值 [m³]
pub const UNBOUNDED_STORAGE: f64 = 1e18;

/// 不可过流分层的高程哨兵值 [m]
pub const CLOSED_LAYER_ELEVATION: f64 = 1e20;

// ============================================================================
// 有限性检查
// ============================================================================

/// 返回数组中第一个非有限值的位置与数值
#[inline]
pub fn first_non_finite(values: &[f64]) -> Option<(usize, f64)> {
    values
        .iter()
        .enumerate()
        .find(|(_, v)| !v.is_finite())
        .map(|(i, &v)| (i, v))
}

/// 检查数组全部有限，否则返回带单元序号的错误
pub fn check_finite(variable: &'static str, values: &[f64]) -> RfResult<()> {
    match first_non_finite(values) {
        Some((cell, value)) => Err(RfError::non_finite(variable, cell, value)),
        None => Ok(()),
    }
}
