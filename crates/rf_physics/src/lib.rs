// crates/rf_physics/src/lib.rs

//! 河网汇流与漫滩物理核心
//!
//! 提供局部惯性河网汇流求解功能，包括：
//! - 河网拓扑 (network) - 下游指针、拓扑排序、分汊通道
//! - 地形参数 (topography) - 河道与漫滩几何派生量
//! - 状态管理 (state) - 单元变量、水量平衡、重启快照
//! - 漫滩水位 (fldstg) - 总蓄量在河道与漫滩之间的分配
//! - 流量求解 (discharge) - 出流、分汊、入流裁剪
//! - 自适应步长 (adaptive) - CFL 子步规划
//! - 蓄量更新 (storage) - 显式前向差分与径流注入
//! - 诊断量 (diagnostics) - 子步层与输出层平均、最大值
//! - 径流强迫 (forcing) - 插值矩阵与强迫来源接口
//! - 时间管理 (time)
//! - 驱动器 (driver) - 外层步状态机与事件
//!
//! # 子步流程
//!
//! ```text
//! fldstg → [adaptive] → { outflow → pathway → inflow → storage → fldstg } × NT
//! ```
//!
//! 各阶段顺序固定；阶段内部按单元并行（超过 `parallel_threshold` 时）。

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adaptive;
pub mod diagnostics;
pub mod discharge;
pub mod driver;
pub mod fldstg;
pub mod forcing;
pub mod network;
pub mod state;
pub mod storage;
pub mod time;
pub mod topography;

// 重导出常用类型
pub use adaptive::{AdaptiveStepController, SubStepPlan};
pub use diagnostics::{Accumulator, Diagnostics, MaxFields, MeanFields};
pub use discharge::{compute_inflow, compute_outflow, compute_pathway_flow, DischargeParams};
pub use driver::{
    DriverPhase, EventDispatcher, EventListener, FnListener, LoggingListener, NullOutput,
    NullRestart, OutputFrame, OutputSink, RestartSink, RunSummary, Simulation, SimulationEvent,
};
pub use fldstg::{partition_cell, FloodStageSolver, StagePartition};
pub use forcing::{ConstantRunoff, InputMatrix, RunoffSource};
pub use network::{
    DownstreamMap, NetworkTopology, PathwayRecord, PathwaySet, PathwayTable,
};
pub use state::{PreviousStep, RestartSnapshot, SimulationState, WaterBalance};
pub use storage::StorageUpdater;
pub use time::TimeManager;
pub use topography::{CellGeometry, Topography, TopographyInput};

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::driver::{
        EventDispatcher, NullOutput, NullRestart, OutputSink, RestartSink, Simulation,
        SimulationEvent,
    };
    pub use crate::forcing::{ConstantRunoff, RunoffSource};
    pub use crate::network::{NetworkTopology, PathwayTable};
    pub use crate::state::{RestartSnapshot, SimulationState};
    pub use crate::topography::{Topography, TopographyInput};
}
