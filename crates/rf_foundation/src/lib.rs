// crates/rf_foundation/src/lib.rs

//! RivFlood Foundation Layer
//!
//! 基础层，提供整个项目共享的错误类型和数值工具。
//!
//! # 模块概览
//!
//! - [`error`]: 统一错误类型 `RfError`
//! - [`float`]: 数值下限常量和有限性检查
//! - [`kahan_sum`]: 水量平衡使用的补偿求和

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod float;
pub mod kahan_sum;

// 重导出常用类型
pub use error::{RfError, RfResult};
pub use kahan_sum::{kahan_sum, KahanSum};

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::error::{RfError, RfResult};
    pub use crate::float::check_finite;
    pub use crate::kahan_sum::{kahan_sum, KahanSum};
}
