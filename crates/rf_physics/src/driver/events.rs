// crates/rf_physics/src/driver/events.rs

//! 运行事件
//!
//! 驱动器不写任何全局日志文件，所有诊断信息以 [`SimulationEvent`]
//! 发送给注册到 [`EventDispatcher`] 的监听器。[`LoggingListener`]
//! 把事件转发到 `tracing`。

use chrono::NaiveDateTime;
use parking_lot::RwLock;
use rf_config::FeatureToggle;
use std::sync::Arc;

use crate::state::WaterBalance;

/// 水量平衡报告单位换算 [m³ -> 10⁹ m³]
pub const BALANCE_UNIT: f64 = 1.0e-9;

/// 运行事件
#[derive(Debug, Clone)]
pub enum SimulationEvent {
    /// 运行开始
    RunStarted {
        /// 起始时间
        start: NaiveDateTime,
        /// 结束时间
        end: NaiveDateTime,
        /// 外层步数
        nsteps: u64,
        /// 单元数
        nseq: usize,
    },
    /// 外层步被拆分为多个子步
    SubStepsPlanned {
        /// 外层步序号
        kstep: u64,
        /// 子步数
        nt: usize,
        /// 子步长 [s]
        dt: f64,
    },
    /// 子步水量平衡
    WaterBalance {
        /// 外层步序号
        kstep: u64,
        /// 子步序号（从 1 开始）
        isub: usize,
        /// 平衡标量
        balance: WaterBalance,
    },
    /// 已写出诊断输出
    OutputWritten {
        /// 输出时刻
        time: NaiveDateTime,
        /// 外层步序号
        kstep: u64,
    },
    /// 已写出重启文件
    RestartWritten {
        /// 快照时刻
        time: NaiveDateTime,
    },
    /// 启用但未实现的特性被跳过
    FeatureSkipped {
        /// 特性
        feature: FeatureToggle,
    },
    /// 分汊表中端点不在河网内的通道被排除
    PathwaysExcluded {
        /// 排除数
        count: usize,
    },
    /// 运行完成
    RunFinished {
        /// 完成的外层步数
        steps: u64,
        /// 结束时刻
        time: NaiveDateTime,
    },
    /// 运行失败
    RunFailed {
        /// 错误信息
        message: String,
    },
}

impl SimulationEvent {
    /// 获取事件名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "RunStarted",
            Self::SubStepsPlanned { .. } => "SubStepsPlanned",
            Self::WaterBalance { .. } => "WaterBalance",
            Self::OutputWritten { .. } => "OutputWritten",
            Self::RestartWritten { .. } => "RestartWritten",
            Self::FeatureSkipped { .. } => "FeatureSkipped",
            Self::PathwaysExcluded { .. } => "PathwaysExcluded",
            Self::RunFinished { .. } => "RunFinished",
            Self::RunFailed { .. } => "RunFailed",
        }
    }
}

/// 事件监听器trait
pub trait EventListener: Send + Sync {
    /// 处理事件
    fn on_event(&self, event: &SimulationEvent);

    /// 获取监听器名称 (用于调试)
    fn name(&self) -> &str {
        "anonymous"
    }
}

/// 函数式事件监听器
pub struct FnListener<F>
where
    F: Fn(&SimulationEvent) + Send + Sync,
{
    name: String,
    handler: F,
}

impl<F> FnListener<F>
where
    F: Fn(&SimulationEvent) + Send + Sync,
{
    /// 创建函数式监听器
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }
}

impl<F> EventListener for FnListener<F>
where
    F: Fn(&SimulationEvent) + Send + Sync,
{
    fn on_event(&self, event: &SimulationEvent) {
        (self.handler)(event);
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// 日志事件监听器
///
/// 默认只记录运行级事件；`verbose` 模式下额外记录每个子步的水量平衡。
pub struct LoggingListener {
    verbose: bool,
}

impl LoggingListener {
    /// 创建日志监听器
    pub fn new() -> Self {
        Self { verbose: false }
    }

    /// 设置详细模式
    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }
}

impl Default for LoggingListener {
    fn default() -> Self {
        Self::new()
    }
}

impl EventListener for LoggingListener {
    fn on_event(&self, event: &SimulationEvent) {
        match event {
            SimulationEvent::RunStarted {
                start,
                end,
                nsteps,
                nseq,
            } => tracing::info!(
                "Run started: {} -> {} ({} steps, {} cells)",
                start,
                end,
                nsteps,
                nseq
            ),
            SimulationEvent::SubStepsPlanned { kstep, nt, dt } => {
                tracing::info!("Step {}: {} sub-steps of {:.1}s", kstep, nt, dt)
            }
            SimulationEvent::WaterBalance {
                kstep,
                isub,
                balance,
            } if self.verbose => tracing::debug!(
                "Step {}.{}: storage {:.6e} -> {:.6e}, in {:.6e}, out {:.6e}, error {:.3e} / {:.3e} (1e9 m3)",
                kstep,
                isub,
                balance.storage_pre * BALANCE_UNIT,
                balance.storage_new * BALANCE_UNIT,
                balance.inflow * BALANCE_UNIT,
                balance.outflow * BALANCE_UNIT,
                balance.flux_error() * BALANCE_UNIT,
                balance.stage_error() * BALANCE_UNIT,
            ),
            SimulationEvent::OutputWritten { time, kstep } => {
                tracing::debug!("Output written at {} (step {})", time, kstep)
            }
            SimulationEvent::RestartWritten { time } => {
                tracing::info!("Restart written at {}", time)
            }
            SimulationEvent::FeatureSkipped { feature } => {
                tracing::warn!("Feature '{}' is enabled but not implemented, skipped", feature)
            }
            SimulationEvent::PathwaysExcluded { count } => {
                tracing::warn!("{} bifurcation pathways outside the network excluded", count)
            }
            SimulationEvent::RunFinished { steps, time } => {
                tracing::info!("Run finished at {} after {} steps", time, steps)
            }
            SimulationEvent::RunFailed { message } => tracing::error!("Run failed: {}", message),
            _ => {}
        }
    }

    fn name(&self) -> &str {
        "LoggingListener"
    }
}

/// 事件分发器
#[derive(Default)]
pub struct EventDispatcher {
    listeners: RwLock<Vec<Arc<dyn EventListener>>>,
}

impl EventDispatcher {
    /// 创建新的事件分发器
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// 添加监听器
    pub fn add_listener(&self, listener: Arc<dyn EventListener>) {
        let name = listener.name().to_string();
        self.listeners.write().push(listener);
        tracing::debug!("Added event listener: {}", name);
    }

    /// 添加函数式监听器
    pub fn add_fn_listener<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(&SimulationEvent) + Send + Sync + 'static,
    {
        self.add_listener(Arc::new(FnListener::new(name, handler)));
    }

    /// 分发事件
    pub fn emit(&self, event: SimulationEvent) {
        let listeners = self.listeners.read();
        tracing::trace!("Emitting event: {}", event.name());
        for listener in listeners.iter() {
            listener.on_event(&event);
        }
    }

    /// 获取监听器数量
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listener_count", &self.listener_count())
            .finish()
    }
}
