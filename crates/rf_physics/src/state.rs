// crates/rf_physics/src/state.rs

//! 模拟状态
//!
//! 所有单元变量按序号存放在稠密数组中，每个子步被求解器原地更新。
//!
//! # 变量分组
//!
//! | 分组 | 变量 |
//! |---|---|
//! | 预报量 | `rivsto`, `fldsto` |
//! | 诊断量 | `rivout`, `fldout`, `rivdph`, `flddph`, `fldfrc`, `fldare`, `sfcelv`, `rivvel`, `outflw`, `storge` |
//! | 上一子步 | `rivout_pre`, `fldout_pre`, `rivdph_pre`, `fldsto_pre`, `pthflw_pre` |
//! | 单元间交换 | `rivinf`, `fldinf`, `pthout` |
//! | 分汊通道 | `pthflw`, `pthflw_sum` |
//!
//! 全局水量平衡标量集中在 [`WaterBalance`]。

use chrono::NaiveDateTime;
use rf_foundation::float::check_finite;
use rf_foundation::{RfError, RfResult};
use serde::{Deserialize, Serialize};

use crate::network::NetworkTopology;
use crate::topography::Topography;

// ============================================================================
// 全局水量平衡
// ============================================================================

/// 全局水量平衡标量 [m³]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WaterBalance {
    /// 漫滩分配前总蓄量
    pub stage_pre: f64,
    /// 漫滩分配后总蓄量
    pub stage_new: f64,
    /// 蓄量更新前总蓄量
    pub storage_pre: f64,
    /// 通量更新后、径流注入前总蓄量
    pub storage_next: f64,
    /// 径流注入后总蓄量
    pub storage_new: f64,
    /// 子步内单元入流总量
    pub inflow: f64,
    /// 子步内单元出流总量
    pub outflow: f64,
    /// 河道总蓄量
    pub river_storage: f64,
    /// 漫滩总蓄量
    pub flood_storage: f64,
    /// 淹没总面积 [m²]
    pub flooded_area: f64,
}

impl WaterBalance {
    /// 通量更新的平衡误差 (DERROR)
    pub fn flux_error(&self) -> f64 {
        -(self.storage_pre - self.storage_next + self.inflow - self.outflow)
    }

    /// 漫滩分配的平衡误差 (DERROR2)
    pub fn stage_error(&self) -> f64 {
        -(self.stage_pre - self.stage_new)
    }
}

// ============================================================================
// 状态
// ============================================================================

/// 单元与通道状态
#[derive(Debug, Clone, Default)]
pub struct SimulationState {
    /// 河道蓄量 [m³]
    pub rivsto: Vec<f64>,
    /// 漫滩蓄量 [m³]
    pub fldsto: Vec<f64>,

    /// 河道流量 [m³/s]
    pub rivout: Vec<f64>,
    /// 漫滩流量 [m³/s]
    pub fldout: Vec<f64>,
    /// 河道水深 [m]
    pub rivdph: Vec<f64>,
    /// 漫滩水深 [m]
    pub flddph: Vec<f64>,
    /// 淹没比例 [0-1]
    pub fldfrc: Vec<f64>,
    /// 淹没面积 [m²]
    pub fldare: Vec<f64>,
    /// 水面高程 [m]
    pub sfcelv: Vec<f64>,
    /// 河道流速 [m/s]
    pub rivvel: Vec<f64>,
    /// 总流量（河道+漫滩）[m³/s]
    pub outflw: Vec<f64>,
    /// 总蓄量（河道+漫滩）[m³]
    pub storge: Vec<f64>,

    /// 上一子步河道流量
    pub rivout_pre: Vec<f64>,
    /// 上一子步漫滩流量
    pub fldout_pre: Vec<f64>,
    /// 上一子步河道水深
    pub rivdph_pre: Vec<f64>,
    /// 上一子步漫滩蓄量
    pub fldsto_pre: Vec<f64>,

    /// 河道入流 [m³/s]
    pub rivinf: Vec<f64>,
    /// 漫滩入流 [m³/s]
    pub fldinf: Vec<f64>,
    /// 分汊净出流 [m³/s]
    pub pthout: Vec<f64>,

    /// 地表径流 [m³/s]
    pub runoff: Vec<f64>,
    /// 地下径流 [m³/s]
    pub rofsub: Vec<f64>,

    /// 分汊分层流量 `[path * npthlev + layer]`
    pub pthflw: Vec<f64>,
    /// 上一子步分汊分层流量
    pub pthflw_pre: Vec<f64>,
    /// 分汊通道净流量
    pub pthflw_sum: Vec<f64>,

    /// 全局水量平衡
    pub balance: WaterBalance,
}

impl SimulationState {
    /// 创建全零状态
    pub fn new(nseq: usize, npth: usize, npthlev: usize) -> Self {
        let z = || vec![0.0; nseq];
        Self {
            rivsto: z(),
            fldsto: z(),
            rivout: z(),
            fldout: z(),
            rivdph: z(),
            flddph: z(),
            fldfrc: z(),
            fldare: z(),
            sfcelv: z(),
            rivvel: z(),
            outflw: z(),
            storge: z(),
            rivout_pre: z(),
            fldout_pre: z(),
            rivdph_pre: z(),
            fldsto_pre: z(),
            rivinf: z(),
            fldinf: z(),
            pthout: z(),
            runoff: z(),
            rofsub: z(),
            pthflw: vec![0.0; npth * npthlev],
            pthflw_pre: vec![0.0; npth * npthlev],
            pthflw_sum: vec![0.0; npth],
            balance: WaterBalance::default(),
        }
    }

    /// 单元数
    pub fn len(&self) -> usize {
        self.rivsto.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.rivsto.is_empty()
    }

    /// 海平面一致的冷启动初值
    ///
    /// 河口单元以边界水位为海面；河段单元逆序处理，以下游单元水面为海面，
    /// 水深截断在 `[0, rivhgt]`。漫滩蓄量为零。
    pub fn initialize_sea_level(&mut self, network: &NetworkTopology, topo: &Topography) {
        let n = network.nseq_all();
        let fill = |sea: f64, i: usize| (sea - topo.rivelv[i]).max(0.0).min(topo.rivhgt[i]);

        for i in network.nseq_riv()..n {
            self.rivdph_pre[i] = fill(topo.dwnelv[i], i);
        }
        for i in (0..network.nseq_riv()).rev() {
            if let Some(j) = network.next(i) {
                let sea = topo.rivelv[j] + self.rivdph_pre[j];
                self.rivdph_pre[i] = fill(sea, i);
            }
        }
        for i in 0..n {
            self.rivsto[i] =
                (self.rivdph_pre[i] * topo.rivlen[i] * topo.rivwth[i]).min(topo.rivstomax[i]);
            self.fldsto[i] = 0.0;
        }
        self.fldsto_pre.iter_mut().for_each(|v| *v = 0.0);
    }

    /// 保存上一子步变量 (vars_pre)
    pub fn store_previous(&mut self) {
        self.rivout_pre.copy_from_slice(&self.rivout);
        self.fldout_pre.copy_from_slice(&self.fldout);
        self.rivdph_pre.copy_from_slice(&self.rivdph);
        self.fldsto_pre.copy_from_slice(&self.fldsto);
        self.pthflw_pre.copy_from_slice(&self.pthflw);
    }

    /// 关闭漫滩流量时清零当前与上一子步漫滩流量
    pub fn clear_floodplain_outflow(&mut self) {
        self.fldout.iter_mut().for_each(|v| *v = 0.0);
        self.fldout_pre.iter_mut().for_each(|v| *v = 0.0);
    }

    /// 检查所有预报量与流量有限
    pub fn check_finite(&self) -> RfResult<()> {
        check_finite("rivsto", &self.rivsto)?;
        check_finite("fldsto", &self.fldsto)?;
        check_finite("rivout", &self.rivout)?;
        check_finite("fldout", &self.fldout)?;
        check_finite("rivdph", &self.rivdph)?;
        check_finite("flddph", &self.flddph)?;
        check_finite("sfcelv", &self.sfcelv)?;
        check_finite("pthflw", &self.pthflw)?;
        Ok(())
    }

    /// 生成重启快照
    pub fn snapshot(&self, time: NaiveDateTime, store_only: bool) -> RestartSnapshot {
        let previous = (!store_only).then(|| PreviousStep {
            rivout_pre: self.rivout_pre.clone(),
            fldout_pre: self.fldout_pre.clone(),
            rivdph_pre: self.rivdph_pre.clone(),
            fldsto_pre: self.fldsto_pre.clone(),
            pthflw_pre: self.pthflw_pre.clone(),
        });
        RestartSnapshot {
            time,
            rivsto: self.rivsto.clone(),
            fldsto: self.fldsto.clone(),
            previous,
        }
    }

    /// 从重启快照恢复
    ///
    /// 仅恢复状态；快照不含上一子步变量时这些变量保持零值，
    /// 由调用方在漫滩分配后补齐水深与漫滩蓄量。
    pub fn restore(&mut self, snapshot: &RestartSnapshot) -> RfResult<()> {
        let n = self.len();
        RfError::check_size("restart.rivsto", n, snapshot.rivsto.len())?;
        RfError::check_size("restart.fldsto", n, snapshot.fldsto.len())?;
        self.rivsto.copy_from_slice(&snapshot.rivsto);
        self.fldsto.copy_from_slice(&snapshot.fldsto);

        match &snapshot.previous {
            Some(prev) => {
                RfError::check_size("restart.rivout_pre", n, prev.rivout_pre.len())?;
                RfError::check_size("restart.fldout_pre", n, prev.fldout_pre.len())?;
                RfError::check_size("restart.rivdph_pre", n, prev.rivdph_pre.len())?;
                RfError::check_size("restart.fldsto_pre", n, prev.fldsto_pre.len())?;
                RfError::check_size(
                    "restart.pthflw_pre",
                    self.pthflw_pre.len(),
                    prev.pthflw_pre.len(),
                )?;
                self.rivout_pre.copy_from_slice(&prev.rivout_pre);
                self.fldout_pre.copy_from_slice(&prev.fldout_pre);
                self.rivdph_pre.copy_from_slice(&prev.rivdph_pre);
                self.fldsto_pre.copy_from_slice(&prev.fldsto_pre);
                self.pthflw_pre.copy_from_slice(&prev.pthflw_pre);
            }
            None => {
                self.rivout_pre.iter_mut().for_each(|v| *v = 0.0);
                self.fldout_pre.iter_mut().for_each(|v| *v = 0.0);
                self.pthflw_pre.iter_mut().for_each(|v| *v = 0.0);
            }
        }
        Ok(())
    }
}

// ============================================================================
// 重启快照
// ============================================================================

/// 上一子步变量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviousStep {
    /// 河道流量
    pub rivout_pre: Vec<f64>,
    /// 漫滩流量
    pub fldout_pre: Vec<f64>,
    /// 河道水深
    pub rivdph_pre: Vec<f64>,
    /// 漫滩蓄量
    pub fldsto_pre: Vec<f64>,
    /// 分汊分层流量
    pub pthflw_pre: Vec<f64>,
}

/// 重启快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestartSnapshot {
    /// 快照对应的模拟时间
    pub time: NaiveDateTime,
    /// 河道蓄量
    pub rivsto: Vec<f64>,
    /// 漫滩蓄量
    pub fldsto: Vec<f64>,
    /// 上一子步变量（仅保存蓄量时为 None）
    pub previous: Option<PreviousStep>,
}
