// crates/rf_config/src/lib.rs

//! RivFlood Config Layer (Layer 2)
//!
//! 配置层，提供运行配置、特性开关和配置错误类型。
//!
//! # 模块概览
//!
//! - [`run_config`]: RunConfig 及其子配置（全部带默认值，JSON 序列化）
//! - [`features`]: FeatureToggle 可选特性表
//! - [`error`]: 配置错误类型
//!
//! # 层级架构
//!
//! ```text
//! Layer 5: rf_cli        ─> RunConfig::from_file
//! Layer 3: rf_physics    ─> 读取 PhysicsParams / TimeConfig / FeatureFlags
//!          rf_io         ─> 读取 InputConfig / ForcingConfig / OutputConfig
//! Layer 2: rf_config     (本层)
//! Layer 1: rf_foundation
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod features;
pub mod run_config;

// 重导出核心类型
pub use error::ConfigError;
pub use features::{FeatureFlags, FeatureStatus, FeatureToggle};
pub use run_config::{
    ForcingConfig, GridConfig, InputConfig, OutputConfig, PhysicsParams, RestartConfig,
    RunConfig, RunoffFiles, TimeConfig,
};
