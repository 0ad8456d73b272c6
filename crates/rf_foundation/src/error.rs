// crates/rf_foundation/src/error.rs

//! 错误处理模块，定义统一错误类型
//!
//! 提供 `RfError` 枚举和 `RfResult` 类型别名，用于整个项目的错误处理。
//!
//! # 错误分类
//!
//! 1. **配置错误**: 河网拓扑成环、时间步长不整除、特性开关冲突，启动前即终止
//! 2. **数据可用性错误**: 强迫数据不覆盖模拟时段，初始化时终止
//! 3. **数值错误**: 热循环中出现 NaN/Inf，报告变量名与单元序号后终止
//!
//! 干单元或退化单元的近零水深、面积不属于错误，由求解器下限截断处理。
//!
//! # 示例
//!
//! ```
//! use rf_foundation::error::{RfError, RfResult};
//!
//! fn check_network() -> RfResult<()> {
//!     Err(RfError::configuration("河网存在环路"))
//! }
//! assert!(check_network().is_err());
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// 统一结果类型
pub type RfResult<T> = Result<T, RfError>;

/// RivFlood 错误类型
#[derive(Error, Debug)]
pub enum RfError {
    // ========================================================================
    // IO 相关错误
    // ========================================================================
    /// IO 错误
    #[error("IO错误: {message}")]
    Io {
        /// 描述性错误信息
        message: String,
        /// 可选的底层 IO 错误
        #[source]
        source: Option<std::io::Error>,
    },

    /// 文件解析错误
    #[error("文件解析错误: {file} 第{line}行: {message}")]
    ParseError {
        /// 文件路径
        file: PathBuf,
        /// 行号
        line: usize,
        /// 错误信息
        message: String,
    },

    // ========================================================================
    // 输入数据错误
    // ========================================================================
    /// 无效输入
    #[error("无效的输入数据: {message}")]
    InvalidInput {
        /// 说明无效原因
        message: String,
    },

    /// 数组大小不匹配
    #[error("数组大小不匹配: {name} 期望{expected}, 实际{actual}")]
    SizeMismatch {
        /// 数据名称
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },

    /// 索引越界
    #[error("索引越界: {index_type} 索引 {index} 超出范围 0..{len}")]
    IndexOutOfBounds {
        /// 索引类别描述
        index_type: &'static str,
        /// 访问的索引
        index: usize,
        /// 上界（长度）
        len: usize,
    },

    // ========================================================================
    // 启动期致命错误
    // ========================================================================
    /// 配置错误（拓扑异常、时间步不整除、特性冲突）
    #[error("配置错误: {message}")]
    Configuration {
        /// 具体错误信息
        message: String,
    },

    /// 数据可用性错误（强迫数据未覆盖模拟时段）
    #[error("数据不可用: {message}")]
    DataAvailability {
        /// 具体错误信息
        message: String,
    },

    /// 功能未实现
    #[error("功能未实现: {feature}")]
    NotImplemented {
        /// 未实现的功能描述
        feature: String,
    },

    // ========================================================================
    // 运行期致命错误
    // ========================================================================
    /// 非有限值（NaN/Inf）
    #[error("非有限值: {variable}[{cell}] = {value}")]
    NonFinite {
        /// 变量名
        variable: &'static str,
        /// 单元序号（从 0 开始）
        cell: usize,
        /// 非法值
        value: f64,
    },

    /// 不变量被破坏
    #[error("不变量被破坏: {invariant} (单元 {cell}): {detail}")]
    InvariantViolation {
        /// 不变量名称
        invariant: &'static str,
        /// 单元序号（从 0 开始）
        cell: usize,
        /// 详细说明
        detail: String,
    },

}

// ========================================================================
// 便捷构造方法
// ========================================================================

impl RfError {
    /// 从IO错误创建（带源）
    pub fn io_with_source(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(source),
        }
    }

    /// 解析错误
    pub fn parse(file: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::ParseError {
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    /// 无效输入
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// 数组大小不匹配
    pub fn size_mismatch(name: &'static str, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            name,
            expected,
            actual,
        }
    }

    /// 索引越界
    pub fn index_out_of_bounds(index_type: &'static str, index: usize, len: usize) -> Self {
        Self::IndexOutOfBounds {
            index_type,
            index,
            len,
        }
    }

    /// 配置错误
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// 数据可用性错误
    pub fn data_availability(message: impl Into<String>) -> Self {
        Self::DataAvailability {
            message: message.into(),
        }
    }

    /// 功能未实现
    pub fn not_implemented(feature: impl Into<String>) -> Self {
        Self::NotImplemented {
            feature: feature.into(),
        }
    }

    /// 非有限值
    pub fn non_finite(variable: &'static str, cell: usize, value: f64) -> Self {
        Self::NonFinite {
            variable,
            cell,
            value,
        }
    }

    /// 不变量被破坏
    pub fn invariant(invariant: &'static str, cell: usize, detail: impl Into<String>) -> Self {
        Self::InvariantViolation {
            invariant,
            cell,
            detail: detail.into(),
        }
    }

    /// 是否为启动期结构性错误（不可重试）
    pub fn is_startup_error(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. } | Self::DataAvailability { .. } | Self::NotImplemented { .. }
        )
    }
}

// ========================================================================
// 验证辅助方法
// ========================================================================

impl RfError {
    /// 检查数组大小是否匹配
    #[inline]
    pub fn check_size(name: &'static str, expected: usize, actual: usize) -> RfResult<()> {
        if expected != actual {
            Err(Self::size_mismatch(name, expected, actual))
        } else {
            Ok(())
        }
    }

    /// 检查索引是否在范围内
    #[inline]
    pub fn check_index(index_type: &'static str, index: usize, len: usize) -> RfResult<()> {
        if index >= len {
            Err(Self::index_out_of_bounds(index_type, index, len))
        } else {
            Ok(())
        }
    }
}

// ========================================================================
// 标准库错误转换
// ========================================================================

impl From<std::io::Error> for RfError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: Some(err),
        }
    }
}
