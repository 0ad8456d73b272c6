// crates/rf_physics/src/driver/mod.rs

//! 时间步驱动器
//!
//! # 状态机
//!
//! ```text
//! Idle ──> SubStepping ──> OutputPending? ──> RestartPending? ──> Idle
//!                                                   └──(kstep == nsteps)──> Terminal
//! ```
//!
//! 每个外层步：
//!
//! 1. 需要时读取径流强迫
//! 2. 漫滩分配，规划子步
//! 3. 重复 NT 次：出流 → 分汊 → 入流裁剪 → 保存上一子步 → 蓄量更新 →
//!    漫滩分配 → 有限性检查 → 水量平衡事件 → 诊断累加
//! 4. 子步层平均，需要时写输出与重启
//!
//! 文件读写由 [`RunoffSource`]、[`OutputSink`]、[`RestartSink`] 的实现者负责。

pub mod events;

use std::sync::Arc;

use chrono::NaiveDateTime;
use rf_config::{FeatureToggle, RunConfig};
use rf_foundation::{RfError, RfResult};

use crate::adaptive::{AdaptiveStepController, SubStepPlan};
use crate::diagnostics::Diagnostics;
use crate::discharge::{compute_inflow, compute_outflow, compute_pathway_flow, DischargeParams};
use crate::fldstg::FloodStageSolver;
use crate::forcing::RunoffSource;
use crate::network::{NetworkTopology, PathwaySet, PathwayTable};
use crate::state::{RestartSnapshot, SimulationState};
use crate::storage::StorageUpdater;
use crate::time::TimeManager;
use crate::topography::Topography;

pub use events::{
    EventDispatcher, EventListener, FnListener, LoggingListener, SimulationEvent, BALANCE_UNIT,
};

// ============================================================================
// 协作者接口
// ============================================================================

/// 驱动器阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverPhase {
    /// 外层步之间
    Idle,
    /// 子步循环中
    SubStepping,
    /// 正在写输出
    OutputPending,
    /// 正在写重启文件
    RestartPending,
    /// 运行结束
    Terminal,
}

/// 一次输出所需的全部数据
#[derive(Debug, Clone, Copy)]
pub struct OutputFrame<'a> {
    /// 输出时刻（外层步结束时刻）
    pub time: NaiveDateTime,
    /// 外层步序号
    pub kstep: u64,
    /// 河网
    pub network: &'a NetworkTopology,
    /// 当前状态（瞬时量）
    pub state: &'a SimulationState,
    /// 诊断量（输出层平均值与最大值）
    pub diagnostics: &'a Diagnostics,
    /// 分汊通道
    pub pathways: &'a PathwaySet,
}

/// 诊断输出接收者
pub trait OutputSink {
    /// 写出一帧
    fn write_frame(&mut self, frame: &OutputFrame<'_>) -> RfResult<()>;
}

/// 重启快照接收者
pub trait RestartSink {
    /// 写出快照
    fn write_restart(&mut self, snapshot: &RestartSnapshot) -> RfResult<()>;
}

/// 丢弃所有输出
#[derive(Debug, Clone, Copy, Default)]
pub struct NullOutput;

impl OutputSink for NullOutput {
    fn write_frame(&mut self, _frame: &OutputFrame<'_>) -> RfResult<()> {
        Ok(())
    }
}

/// 丢弃所有重启快照
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRestart;

impl RestartSink for NullRestart {
    fn write_restart(&mut self, _snapshot: &RestartSnapshot) -> RfResult<()> {
        Ok(())
    }
}

/// 运行摘要
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    /// 完成的外层步数
    pub steps: u64,
    /// 子步总数
    pub substeps: u64,
    /// 输出次数
    pub outputs: u64,
    /// 重启文件写出次数
    pub restarts: u64,
    /// 结束时刻
    pub end_time: NaiveDateTime,
}

// ============================================================================
// 驱动器
// ============================================================================

/// 河网汇流模拟
pub struct Simulation {
    config: RunConfig,
    network: NetworkTopology,
    topography: Topography,
    pathways: PathwaySet,
    excluded_pathways: usize,
    state: SimulationState,
    diagnostics: Diagnostics,
    time: TimeManager,

    params: DischargeParams,
    adaptive: AdaptiveStepController,
    stage: FloodStageSolver,
    storage: StorageUpdater,

    events: Arc<EventDispatcher>,
    phase: DriverPhase,
    skipped: Vec<FeatureToggle>,
    last_plan: Option<SubStepPlan>,
    summary: RunSummary,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("nseq", &self.network.nseq_all())
            .field("npthout", &self.pathways.len())
            .field("kstep", &self.time.kstep())
            .field("phase", &self.phase)
            .finish()
    }
}

impl Simulation {
    /// 创建模拟并以海平面一致的初值初始化状态
    ///
    /// 启用但未实现的特性在 `features.strict` 下直接报错。
    pub fn new(
        config: RunConfig,
        network: NetworkTopology,
        topography: Topography,
    ) -> RfResult<Self> {
        topography.check_network(&network)?;

        let skipped = config.features.unimplemented_enabled();
        if config.features.strict {
            if let Some(feature) = skipped.first() {
                return Err(RfError::not_implemented(feature.key()));
            }
        }

        let n = network.nseq_all();
        let physics = &config.physics;
        let params = DischargeParams::from_config(physics, &config.features);
        let adaptive = AdaptiveStepController::new(
            config.time.dt,
            physics.pcadp,
            physics.pgrv,
            physics.pdstmth,
            config.features.adaptive_step,
        );
        let mut state = SimulationState::new(n, 0, 1);
        state.initialize_sea_level(&network, &topography);
        let time = TimeManager::new(&config.time);
        let summary = RunSummary {
            steps: 0,
            substeps: 0,
            outputs: 0,
            restarts: 0,
            end_time: time.current(),
        };

        Ok(Self {
            pathways: PathwaySet::empty(1),
            excluded_pathways: 0,
            diagnostics: Diagnostics::new(n, 0),
            stage: FloodStageSolver::new(physics.parallel_threshold),
            storage: StorageUpdater::new(physics.parallel_threshold),
            events: Arc::new(EventDispatcher::new()),
            phase: DriverPhase::Idle,
            last_plan: None,
            config,
            network,
            topography,
            state,
            time,
            params,
            adaptive,
            skipped,
            summary,
        })
    }

    /// 注入事件分发器
    pub fn with_events(mut self, events: Arc<EventDispatcher>) -> Self {
        self.events = events;
        self
    }

    /// 挂载分汊通道表
    ///
    /// 只有启用 `bifurcation` 时通道才参与计算；不在河网内的记录被剔除。
    pub fn with_pathways(mut self, table: &PathwayTable) -> Self {
        if !self.config.features.bifurcation {
            return self;
        }
        let physics = &self.config.physics;
        let (set, excluded) =
            PathwaySet::from_table(table, &self.network, physics.pmanriv, physics.pmanfld);
        let npthflw = set.len() * set.npthlev;
        self.state.pthflw = vec![0.0; npthflw];
        self.state.pthflw_pre = vec![0.0; npthflw];
        self.state.pthflw_sum = vec![0.0; set.len()];
        self.diagnostics = Diagnostics::new(self.network.nseq_all(), npthflw);
        self.pathways = set;
        self.excluded_pathways = excluded;
        self
    }

    /// 从重启快照恢复状态
    ///
    /// 快照不含上一子步变量时，由漫滩分配结果补齐上一子步水深与漫滩蓄量。
    pub fn restore(&mut self, snapshot: &RestartSnapshot) -> RfResult<()> {
        self.state.restore(snapshot)?;
        if snapshot.previous.is_none() {
            self.stage.apply(&self.topography, &mut self.state);
            self.state.rivdph_pre.copy_from_slice(&self.state.rivdph);
            self.state.fldsto_pre.copy_from_slice(&self.state.fldsto);
        }
        if snapshot.time != self.time.start() {
            tracing::warn!(
                "Restart snapshot time {} differs from run start {}",
                snapshot.time,
                self.time.start()
            );
        }
        Ok(())
    }

    /// 设置当前径流 [m³/s]
    pub fn set_runoff(&mut self, surface: &[f64], subsurface: &[f64]) -> RfResult<()> {
        RfError::check_size("runoff", self.state.len(), surface.len())?;
        RfError::check_size("rofsub", self.state.len(), subsurface.len())?;
        self.state.runoff.copy_from_slice(surface);
        if self.config.features.runoff_split {
            self.state.rofsub.copy_from_slice(subsurface);
        } else {
            self.state.rofsub.iter_mut().for_each(|v| *v = 0.0);
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // 访问器
    // ------------------------------------------------------------------------

    /// 河网
    pub fn network(&self) -> &NetworkTopology {
        &self.network
    }

    /// 地形参数
    pub fn topography(&self) -> &Topography {
        &self.topography
    }

    /// 分汊通道
    pub fn pathways(&self) -> &PathwaySet {
        &self.pathways
    }

    /// 当前状态
    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    /// 可变状态
    pub fn state_mut(&mut self) -> &mut SimulationState {
        &mut self.state
    }

    /// 诊断量
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// 时间管理器
    pub fn time(&self) -> &TimeManager {
        &self.time
    }

    /// 当前阶段
    pub fn phase(&self) -> DriverPhase {
        self.phase
    }

    /// 最近一次子步计划
    pub fn last_plan(&self) -> Option<SubStepPlan> {
        self.last_plan
    }

    /// 启用但未实现的特性
    pub fn skipped_features(&self) -> &[FeatureToggle] {
        &self.skipped
    }

    /// 运行配置
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // 推进
    // ------------------------------------------------------------------------

    /// 推进一个外层步的物理过程（不涉及强迫、输出与重启）
    pub fn advance_physics(&mut self) -> RfResult<()> {
        self.phase = DriverPhase::SubStepping;
        let kstep = self.time.kstep();
        let bifurcation = self.config.features.bifurcation && !self.pathways.is_empty();

        self.stage.apply(&self.topography, &mut self.state);
        let plan = self
            .adaptive
            .plan(&self.network, &self.topography, &self.state);
        if plan.nt > 2 {
            self.events.emit(SimulationEvent::SubStepsPlanned {
                kstep,
                nt: plan.nt,
                dt: plan.dt,
            });
        }
        self.last_plan = Some(plan);
        self.diagnostics.reset_adaptive();

        let dt = plan.dt;
        for isub in 1..=plan.nt {
            compute_outflow(
                &self.network,
                &self.topography,
                &mut self.state,
                &self.params,
                dt,
            );
            if !self.params.floodplain_outflow {
                self.state.clear_floodplain_outflow();
            }
            if bifurcation {
                compute_pathway_flow(
                    &self.pathways,
                    &self.topography,
                    &mut self.state,
                    &self.params,
                    dt,
                );
            }
            compute_inflow(
                &self.network,
                bifurcation.then_some(&self.pathways),
                &mut self.state,
                dt,
            );

            self.state.store_previous();
            self.storage.apply(&mut self.state, dt);
            self.stage.apply(&self.topography, &mut self.state);
            self.state.check_finite()?;

            self.events.emit(SimulationEvent::WaterBalance {
                kstep,
                isub,
                balance: self.state.balance,
            });
            self.diagnostics.accumulate_substep(&self.state, dt);
        }

        self.diagnostics.finish_outer_step(self.config.time.dt);
        self.summary.substeps += plan.nt as u64;
        Ok(())
    }

    /// 执行一个完整外层步
    pub fn step(
        &mut self,
        source: &mut dyn RunoffSource,
        output: &mut dyn OutputSink,
        restart: &mut dyn RestartSink,
    ) -> RfResult<()> {
        if self.phase == DriverPhase::Terminal || self.time.is_finished() {
            self.phase = DriverPhase::Terminal;
            return Ok(());
        }

        let steps_per_input = self.config.time.steps_per_input();
        if self.time.kstep() % steps_per_input == 0 {
            let n = self.state.len();
            let mut surface = vec![0.0; n];
            let mut subsurface = vec![0.0; n];
            source.runoff_at(self.time.current(), &mut surface, &mut subsurface)?;
            self.set_runoff(&surface, &subsurface)?;
        }

        self.time.advance();
        self.advance_physics()?;

        let kstep = self.time.kstep();
        let next = self.time.next();

        if self.time.output_due(self.config.time.output_interval_hours) {
            self.phase = DriverPhase::OutputPending;
            self.diagnostics.finalize_output();
            if self.config.output.enabled {
                output.write_frame(&OutputFrame {
                    time: next,
                    kstep,
                    network: &self.network,
                    state: &self.state,
                    diagnostics: &self.diagnostics,
                    pathways: &self.pathways,
                })?;
                self.summary.outputs += 1;
                self.events
                    .emit(SimulationEvent::OutputWritten { time: next, kstep });
            }
            self.diagnostics.reset_output();
        }

        if self.config.restart.write
            && self.time.restart_due(self.config.time.restart_interval_hours)
        {
            self.phase = DriverPhase::RestartPending;
            let snapshot = self.state.snapshot(next, self.config.restart.store_only);
            restart.write_restart(&snapshot)?;
            self.summary.restarts += 1;
            self.events
                .emit(SimulationEvent::RestartWritten { time: next });
        }

        self.time.commit();
        self.summary.steps = kstep;
        self.summary.end_time = self.time.current();
        self.phase = if self.time.is_finished() {
            DriverPhase::Terminal
        } else {
            DriverPhase::Idle
        };
        Ok(())
    }

    /// 从起始时间运行到结束时间
    pub fn run(
        &mut self,
        source: &mut dyn RunoffSource,
        output: &mut dyn OutputSink,
        restart: &mut dyn RestartSink,
    ) -> RfResult<RunSummary> {
        let start = self.time.current();
        let end = self.config.time.end;
        source.check_availability(start, end)?;

        self.events.emit(SimulationEvent::RunStarted {
            start,
            end,
            nsteps: self.time.nsteps(),
            nseq: self.network.nseq_all(),
        });
        for &feature in &self.skipped {
            self.events.emit(SimulationEvent::FeatureSkipped { feature });
        }
        if self.excluded_pathways > 0 {
            self.events.emit(SimulationEvent::PathwaysExcluded {
                count: self.excluded_pathways,
            });
        }

        while self.phase != DriverPhase::Terminal && !self.time.is_finished() {
            if let Err(err) = self.step(source, output, restart) {
                self.events.emit(SimulationEvent::RunFailed {
                    message: err.to_string(),
                });
                return Err(err);
            }
        }
        self.phase = DriverPhase::Terminal;

        self.events.emit(SimulationEvent::RunFinished {
            steps: self.summary.steps,
            time: self.summary.end_time,
        });
        Ok(self.summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forcing::ConstantRunoff;
    use crate::network::PathwayRecord;
    use crate::topography::{CellGeometry, TopographyInput};
    use chrono::{Duration, NaiveDate};
    use parking_lot::Mutex;

    fn config(days: i64, dt: f64) -> RunConfig {
        let mut config = RunConfig::default();
        let start = NaiveDate::from_ymd_opt(2000, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        config.time.start = start;
        config.time.end = start + Duration::days(days);
        config.time.dt = dt;
        config.time.dtin = 86400.0;
        config.grid.nlfp = 2;
        config.physics.parallel_threshold = usize::MAX;
        config
    }

    fn channel(n: usize, config: &RunConfig) -> (NetworkTopology, Topography) {
        let next = (0..n).map(|i| if i + 1 < n { Some(i + 1) } else { None }).collect();
        let network = NetworkTopology::from_sequence(next).unwrap();
        let mut input = TopographyInput::uniform(
            n,
            &CellGeometry {
                grarea: 1.0e6,
                elevtn: 0.0,
                nxtdst: 1000.0,
                rivlen: 1000.0,
                rivwth: 50.0,
                rivhgt: 5.0,
                rivman: 0.03,
                fldhgt: vec![1.0, 2.0],
            },
        );
        for i in 0..n {
            input.elevtn[i] = 0.1 * (n - 1 - i) as f64;
        }
        let topo = Topography::build(input, config.grid.nlfp, true).unwrap();
        (network, topo)
    }

    struct Recorder {
        names: Mutex<Vec<&'static str>>,
    }

    impl EventListener for Recorder {
        fn on_event(&self, event: &SimulationEvent) {
            self.names.lock().push(event.name());
        }
    }

    #[derive(Default)]
    struct CountingOutput {
        frames: Vec<(NaiveDateTime, f64)>,
    }

    impl OutputSink for CountingOutput {
        fn write_frame(&mut self, frame: &OutputFrame<'_>) -> RfResult<()> {
            self.frames
                .push((frame.time, frame.diagnostics.output.mean.outflw[0]));
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingRestart {
        snapshots: Vec<RestartSnapshot>,
    }

    impl RestartSink for CountingRestart {
        fn write_restart(&mut self, snapshot: &RestartSnapshot) -> RfResult<()> {
            self.snapshots.push(snapshot.clone());
            Ok(())
        }
    }

    #[test]
    fn test_run_emits_events_and_writes() {
        let config = config(2, 3600.0);
        let (network, topo) = channel(3, &config);
        let events = Arc::new(EventDispatcher::new());
        let recorder = Arc::new(Recorder {
            names: Mutex::new(Vec::new()),
        });
        events.add_listener(recorder.clone());

        let mut sim = Simulation::new(config, network, topo)
            .unwrap()
            .with_events(events);
        let mut source = ConstantRunoff::surface(vec![1.0, 1.0, 1.0]);
        let mut output = CountingOutput::default();
        let mut restart = CountingRestart::default();
        let summary = sim.run(&mut source, &mut output, &mut restart).unwrap();

        assert_eq!(summary.steps, 48);
        assert_eq!(summary.outputs, 2);
        assert_eq!(summary.restarts, 1);
        assert_eq!(output.frames.len(), 2);
        assert!(output.frames[1].1 > 0.0);
        assert_eq!(sim.phase(), DriverPhase::Terminal);

        let names = recorder.names.lock();
        assert_eq!(names.first(), Some(&"RunStarted"));
        assert_eq!(names.last(), Some(&"RunFinished"));
        assert!(names.iter().filter(|n| **n == "WaterBalance").count() >= 48);
    }

    #[test]
    fn test_state_stays_non_negative() {
        let config = config(1, 600.0);
        let (network, topo) = channel(4, &config);
        let mut sim = Simulation::new(config, network, topo).unwrap();
        let mut source = ConstantRunoff::surface(vec![5.0, 0.0, 0.0, 0.0]);
        for _ in 0..20 {
            sim.step(&mut source, &mut NullOutput, &mut NullRestart).unwrap();
            let state = sim.state();
            assert!(state.rivsto.iter().all(|v| *v >= 0.0));
            assert!(state.fldsto.iter().all(|v| *v >= 0.0));
        }
    }

    #[test]
    fn test_zero_link_distance_rejected_at_startup() {
        let config = config(1, 3600.0);
        let (network, mut topo) = channel(3, &config);
        topo.nxtdst[1] = 0.0;
        let err = Simulation::new(config, network, topo).unwrap_err();
        assert!(matches!(err, RfError::InvariantViolation { cell: 1, .. }));
    }

    #[test]
    fn test_strict_rejects_unimplemented_feature() {
        let mut config = config(1, 3600.0);
        config.features.dam = true;
        config.features.strict = true;
        let (network, topo) = channel(2, &config);
        let err = Simulation::new(config, network, topo).unwrap_err();
        assert!(matches!(err, RfError::NotImplemented { .. }));
    }

    #[test]
    fn test_unimplemented_feature_reported() {
        let mut config = config(1, 86400.0);
        config.features.levee = true;
        let (network, topo) = channel(2, &config);
        let events = Arc::new(EventDispatcher::new());
        let skipped = Arc::new(Mutex::new(Vec::new()));
        let sink = skipped.clone();
        events.add_fn_listener("skipped", move |e| {
            if let SimulationEvent::FeatureSkipped { feature } = e {
                sink.lock().push(*feature);
            }
        });
        let mut sim = Simulation::new(config, network, topo)
            .unwrap()
            .with_events(events);
        sim.run(&mut ConstantRunoff::zero(2), &mut NullOutput, &mut NullRestart)
            .unwrap();
        assert_eq!(*skipped.lock(), vec![FeatureToggle::Levee]);
    }

    #[test]
    fn test_restore_store_only_fills_previous_depth() {
        let config = config(1, 3600.0);
        let (network, topo) = channel(2, &config);
        let mut sim = Simulation::new(config, network, topo).unwrap();
        let snapshot = RestartSnapshot {
            time: sim.time().start(),
            rivsto: vec![50_000.0, 100_000.0],
            fldsto: vec![0.0, 0.0],
            previous: None,
        };
        sim.restore(&snapshot).unwrap();
        assert!((sim.state().rivdph_pre[0] - 1.0).abs() < 1e-12);
        assert!((sim.state().rivdph_pre[1] - 2.0).abs() < 1e-12);
        assert_eq!(sim.state().rivout_pre, vec![0.0, 0.0]);
    }

    #[test]
    fn test_pathways_only_with_bifurcation_enabled() {
        let mut config = config(1, 3600.0);
        let (network, topo) = channel(3, &config);
        let table = PathwayTable {
            npthlev: 1,
            records: vec![PathwayRecord {
                upstream: (1, 1),
                downstream: (3, 1),
                distance: 2000.0,
                elevation: 0.0,
                depth: 1.0,
                widths: vec![10.0],
            }],
        };
        let sim = Simulation::new(config.clone(), network.clone(), topo.clone())
            .unwrap()
            .with_pathways(&table);
        assert!(sim.pathways().is_empty());

        config.features.bifurcation = true;
        let sim = Simulation::new(config, network, topo)
            .unwrap()
            .with_pathways(&table);
        assert_eq!(sim.pathways().len(), 1);
        assert_eq!(sim.state().pthflw.len(), 1);
    }
}
