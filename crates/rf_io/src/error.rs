// crates/rf_io/src/error.rs

//! IO 层错误类型
//!
//! 覆盖地图读取、分汊表解析、径流强迫、输出与重启文件的错误，
//! 可无损转换为 [`RfError`]。

use rf_foundation::RfError;
use std::path::PathBuf;
use thiserror::Error;

/// IO 操作结果
pub type IoResult<T> = Result<T, IoError>;

/// IO 错误
#[derive(Error, Debug)]
pub enum IoError {
    /// 二进制地图错误
    #[error("地图文件错误 {path}: {reason}")]
    Map {
        /// 文件路径
        path: PathBuf,
        /// 原因
        reason: String,
    },

    /// 文本表解析错误
    #[error("表格解析错误 {file} 第{line}行: {message}")]
    Table {
        /// 文件路径
        file: PathBuf,
        /// 行号（从 1 开始）
        line: usize,
        /// 错误信息
        message: String,
    },

    /// 径流强迫错误
    #[error("径流强迫错误 {path}: {reason}")]
    Forcing {
        /// 文件路径
        path: PathBuf,
        /// 原因
        reason: String,
    },

    /// 强迫数据缺失
    #[error("强迫数据缺失: {path}")]
    ForcingMissing {
        /// 第一个缺失的文件
        path: PathBuf,
    },

    /// 重启文件错误
    #[error("重启文件错误 {path}: {reason}")]
    Checkpoint {
        /// 文件路径
        path: PathBuf,
        /// 原因
        reason: String,
    },

    /// 重启文件校验失败
    #[error("重启文件校验失败: 期望 {expected:08x}, 实际 {found:08x}")]
    Checksum {
        /// 期望值
        expected: u32,
        /// 实际值
        found: u32,
    },

    /// 底层错误
    #[error(transparent)]
    Foundation(#[from] RfError),

    /// 标准 IO 错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),
}

impl IoError {
    /// 地图错误
    pub fn map(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Map {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// 表格错误
    pub fn table(file: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::Table {
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    /// 强迫错误
    pub fn forcing(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Forcing {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// 重启文件错误
    pub fn checkpoint(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Checkpoint {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<IoError> for RfError {
    fn from(err: IoError) -> Self {
        match err {
            IoError::Map { path, reason } => {
                RfError::invalid_input(format!("地图 {}: {}", path.display(), reason))
            }
            IoError::Table {
                file,
                line,
                message,
            } => RfError::parse(file, line, message),
            IoError::Forcing { path, reason } => {
                RfError::invalid_input(format!("径流 {}: {}", path.display(), reason))
            }
            IoError::ForcingMissing { path } => {
                RfError::data_availability(format!("缺少径流文件 {}", path.display()))
            }
            IoError::Checkpoint { path, reason } => {
                RfError::invalid_input(format!("重启文件 {}: {}", path.display(), reason))
            }
            IoError::Checksum { expected, found } => RfError::invalid_input(format!(
                "重启文件校验失败: 期望 {:08x}, 实际 {:08x}",
                expected, found
            )),
            IoError::Foundation(e) => e,
            IoError::Io(e) => RfError::from(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_forcing_is_startup_error() {
        let err: RfError = IoError::ForcingMissing {
            path: PathBuf::from("runoff/Roff____20000102.one"),
        }
        .into();
        assert!(err.is_startup_error());
        assert!(err.to_string().contains("20000102"));
    }

    #[test]
    fn test_table_keeps_line() {
        let err: RfError = IoError::table("bifprm.txt", 3, "列数不足").into();
        match err {
            RfError::ParseError { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected {other:?}"),
        }
    }
}
