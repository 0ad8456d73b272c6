// crates/rf_config/src/run_config.rs

//! RunConfig - 模拟运行配置
//!
//! 所有标量参数、时间设置、文件路径和特性开关集中在一个可序列化结构中，
//! 构建后在整个运行期间只读。
//!
//! # 使用示例
//!
//! ```
//! use rf_config::RunConfig;
//!
//! let config = RunConfig::default();
//! assert!(config.validate().is_ok());
//! assert_eq!(config.time.total_steps(), 366);
//! ```

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::features::FeatureFlags;

/// 运行配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    /// 网格尺寸
    #[serde(default)]
    pub grid: GridConfig,

    /// 物理参数
    #[serde(default)]
    pub physics: PhysicsParams,

    /// 时间设置
    #[serde(default)]
    pub time: TimeConfig,

    /// 特性开关
    #[serde(default)]
    pub features: FeatureFlags,

    /// 地图输入文件
    #[serde(default)]
    pub input: InputConfig,

    /// 径流强迫
    #[serde(default)]
    pub forcing: ForcingConfig,

    /// 输出设置
    #[serde(default)]
    pub output: OutputConfig,

    /// 重启设置
    #[serde(default)]
    pub restart: RestartConfig,
}

// ============================================================================
// 网格
// ============================================================================

/// 网格尺寸与缺测值
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    /// X 方向格点数
    #[serde(default = "default_nx")]
    pub nx: usize,
    /// Y 方向格点数
    #[serde(default = "default_ny")]
    pub ny: usize,
    /// 漫滩高程剖面层数
    #[serde(default = "default_nlfp")]
    pub nlfp: usize,
    /// 整型缺测值（区域外）
    #[serde(default = "default_imis")]
    pub imis: i32,
    /// 实型缺测值
    #[serde(default = "default_rmis")]
    pub rmis: f64,
}

fn default_nx() -> usize { 360 }
fn default_ny() -> usize { 180 }
fn default_nlfp() -> usize { 10 }
fn default_imis() -> i32 { -9999 }
fn default_rmis() -> f64 { 1.0e20 }

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            nx: default_nx(),
            ny: default_ny(),
            nlfp: default_nlfp(),
            imis: default_imis(),
            rmis: default_rmis(),
        }
    }
}

// ============================================================================
// 物理参数
// ============================================================================

/// 物理与数值参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicsParams {
    /// 河道 Manning 系数
    #[serde(default = "default_pmanriv")]
    pub pmanriv: f64,
    /// 漫滩 Manning 系数
    #[serde(default = "default_pmanfld")]
    pub pmanfld: f64,
    /// 重力加速度 [m/s²]
    #[serde(default = "default_pgrv")]
    pub pgrv: f64,
    /// 河口下游距离 [m]
    #[serde(default = "default_pdstmth")]
    pub pdstmth: f64,
    /// 自适应步长 CFL 系数
    #[serde(default = "default_pcadp")]
    pub pcadp: f64,
    /// 最小坡度（运动波模式使用）
    #[serde(default = "default_pminslp")]
    pub pminslp: f64,
    /// 漫滩与分汊坡度截断值
    #[serde(default = "default_slope_clamp")]
    pub slope_clamp: f64,
    /// 单个子步内允许抽取的储量比例
    #[serde(default = "default_limiter_fraction")]
    pub limiter_fraction: f64,
    /// 单元数超过此值时使用并行核
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,
}

fn default_pmanriv() -> f64 { 0.03 }
fn default_pmanfld() -> f64 { 0.10 }
fn default_pgrv() -> f64 { 9.8 }
fn default_pdstmth() -> f64 { 10000.0 }
fn default_pcadp() -> f64 { 0.7 }
fn default_pminslp() -> f64 { 1.0e-5 }
fn default_slope_clamp() -> f64 { 0.005 }
fn default_limiter_fraction() -> f64 { 0.05 }
fn default_parallel_threshold() -> usize { 4096 }

impl Default for PhysicsParams {
    fn default() -> Self {
        Self {
            pmanriv: default_pmanriv(),
            pmanfld: default_pmanfld(),
            pgrv: default_pgrv(),
            pdstmth: default_pdstmth(),
            pcadp: default_pcadp(),
            pminslp: default_pminslp(),
            slope_clamp: default_slope_clamp(),
            limiter_fraction: default_limiter_fraction(),
            parallel_threshold: default_parallel_threshold(),
        }
    }
}

// ============================================================================
// 时间
// ============================================================================

/// 时间设置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeConfig {
    /// 起始时间
    #[serde(default = "default_start")]
    pub start: NaiveDateTime,
    /// 结束时间
    #[serde(default = "default_end")]
    pub end: NaiveDateTime,
    /// 外层时间步长 [s]
    #[serde(default = "default_dt")]
    pub dt: f64,
    /// 强迫输入间隔 [s]
    #[serde(default = "default_dtin")]
    pub dtin: f64,
    /// 输出间隔 [h]
    #[serde(default = "default_output_interval_hours")]
    pub output_interval_hours: u32,
    /// 重启写出间隔：0 仅在结束时，1..=24 按小时，30 每月初
    #[serde(default)]
    pub restart_interval_hours: u32,
}

fn ymd_midnight(year: i32, month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap_or_default()
        .and_time(NaiveTime::default())
}

fn default_start() -> NaiveDateTime { ymd_midnight(2000, 1, 1) }
fn default_end() -> NaiveDateTime { ymd_midnight(2001, 1, 1) }
fn default_dt() -> f64 { 86400.0 }
fn default_dtin() -> f64 { 86400.0 }
fn default_output_interval_hours() -> u32 { 24 }

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            start: default_start(),
            end: default_end(),
            dt: default_dt(),
            dtin: default_dtin(),
            output_interval_hours: default_output_interval_hours(),
            restart_interval_hours: 0,
        }
    }
}

impl TimeConfig {
    /// 总外层步数
    pub fn total_steps(&self) -> u64 {
        let span = (self.end - self.start).num_seconds();
        if span <= 0 || self.dt <= 0.0 {
            return 0;
        }
        (span as f64 / self.dt).floor() as u64
    }

    /// 每次读入强迫对应的外层步数
    pub fn steps_per_input(&self) -> u64 {
        if self.dt <= 0.0 {
            return 1;
        }
        ((self.dtin / self.dt).round() as u64).max(1)
    }

    /// 外层步长（整秒）
    pub fn dt_seconds(&self) -> i64 {
        self.dt.round() as i64
    }
}

// ============================================================================
// 输入文件
// ============================================================================

/// 地图输入文件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// 下游指针 (int32 nextx + nexty)
    #[serde(default = "default_nextxy")]
    pub nextxy: PathBuf,
    /// 单元集水面积
    #[serde(default = "default_grarea")]
    pub grarea: PathBuf,
    /// 岸顶高程
    #[serde(default = "default_elevtn")]
    pub elevtn: PathBuf,
    /// 至下游距离
    #[serde(default = "default_nxtdst")]
    pub nxtdst: PathBuf,
    /// 河道长度
    #[serde(default = "default_rivlen")]
    pub rivlen: PathBuf,
    /// 河道宽度
    #[serde(default = "default_rivwth")]
    pub rivwth: PathBuf,
    /// 河道深度
    #[serde(default = "default_rivhgt")]
    pub rivhgt: PathBuf,
    /// 漫滩高程剖面（NLFP 层）
    #[serde(default = "default_fldhgt")]
    pub fldhgt: PathBuf,
    /// 河道 Manning 系数图（缺省时使用 pmanriv）
    #[serde(default)]
    pub rivman: Option<PathBuf>,
    /// 平均海平面图
    #[serde(default)]
    pub mean_sea_level: Option<PathBuf>,
    /// 分汊通道参数表
    #[serde(default)]
    pub bifurcation: Option<PathBuf>,
}

fn default_nextxy() -> PathBuf { PathBuf::from("./nextxy.bin") }
fn default_grarea() -> PathBuf { PathBuf::from("./ctmare.bin") }
fn default_elevtn() -> PathBuf { PathBuf::from("./elevtn.bin") }
fn default_nxtdst() -> PathBuf { PathBuf::from("./nxtdst.bin") }
fn default_rivlen() -> PathBuf { PathBuf::from("./rivlen.bin") }
fn default_rivwth() -> PathBuf { PathBuf::from("./rivwth.bin") }
fn default_rivhgt() -> PathBuf { PathBuf::from("./rivhgt.bin") }
fn default_fldhgt() -> PathBuf { PathBuf::from("./fldhgt.bin") }

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            nextxy: default_nextxy(),
            grarea: default_grarea(),
            elevtn: default_elevtn(),
            nxtdst: default_nxtdst(),
            rivlen: default_rivlen(),
            rivwth: default_rivwth(),
            rivhgt: default_rivhgt(),
            fldhgt: default_fldhgt(),
            rivman: None,
            mean_sea_level: None,
            bifurcation: None,
        }
    }
}

/// 径流文件命名规则 `{dir}/{prefix}{YYYYMMDD}{suffix}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunoffFiles {
    /// 目录
    pub dir: PathBuf,
    /// 文件名前缀
    pub prefix: String,
    /// 文件名后缀
    pub suffix: String,
}

impl RunoffFiles {
    /// 某日的文件路径
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!(
            "{}{}{}",
            self.prefix,
            date.format("%Y%m%d"),
            self.suffix
        ))
    }
}

/// 径流强迫设置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForcingConfig {
    /// 输入插值矩阵
    #[serde(default = "default_inpmat")]
    pub inpmat: PathBuf,
    /// 每个河网单元的贡献格点数
    #[serde(default = "default_inpn")]
    pub inpn: usize,
    /// 输入网格 X 方向格点数
    #[serde(default = "default_nx")]
    pub nxin: usize,
    /// 输入网格 Y 方向格点数
    #[serde(default = "default_ny")]
    pub nyin: usize,
    /// 地表径流文件
    #[serde(default = "default_surface_runoff")]
    pub surface: RunoffFiles,
    /// 地下径流文件（径流分离时使用）
    #[serde(default)]
    pub subsurface: Option<RunoffFiles>,
    /// 单位换算：输入值 / drofunit = m³/m²/s
    #[serde(default = "default_drofunit")]
    pub drofunit: f64,
}

fn default_inpmat() -> PathBuf { PathBuf::from("./inpmat.bin") }
fn default_inpn() -> usize { 1 }
fn default_drofunit() -> f64 { 86400.0 * 1000.0 }
fn default_surface_runoff() -> RunoffFiles {
    RunoffFiles {
        dir: PathBuf::from("./runoff"),
        prefix: "Roff____".to_string(),
        suffix: ".one".to_string(),
    }
}

impl Default for ForcingConfig {
    fn default() -> Self {
        Self {
            inpmat: default_inpmat(),
            inpn: default_inpn(),
            nxin: default_nx(),
            nyin: default_ny(),
            surface: default_surface_runoff(),
            subsurface: None,
            drofunit: default_drofunit(),
        }
    }
}

// ============================================================================
// 输出与重启
// ============================================================================

/// 输出设置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// 是否写出 (LOUTPUT)
    #[serde(default = "default_output_enabled")]
    pub enabled: bool,
    /// 输出目录
    #[serde(default = "default_output_dir")]
    pub directory: PathBuf,
    /// 文件名标签（如年份）
    #[serde(default)]
    pub tag: String,
    /// 输出变量名
    #[serde(default = "default_output_variables")]
    pub variables: Vec<String>,
}

fn default_output_enabled() -> bool { true }
fn default_output_dir() -> PathBuf { PathBuf::from("./out") }
fn default_output_variables() -> Vec<String> {
    ["rivout", "rivsto", "rivdph", "fldsto", "flddph", "fldfrc", "sfcelv", "outflw", "storge"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            enabled: default_output_enabled(),
            directory: default_output_dir(),
            tag: String::new(),
            variables: default_output_variables(),
        }
    }
}

/// 重启设置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartConfig {
    /// 从重启文件启动 (LRESTART)
    #[serde(default)]
    pub enabled: bool,
    /// 读入的重启文件
    #[serde(default)]
    pub input_file: Option<PathBuf>,
    /// 是否写出重启文件
    #[serde(default = "default_restart_write")]
    pub write: bool,
    /// 写出目录
    #[serde(default = "default_restart_dir")]
    pub directory: PathBuf,
    /// 写出文件前缀
    #[serde(default = "default_restart_prefix")]
    pub prefix: String,
    /// 仅保存储量 (LSTOONLY)
    #[serde(default)]
    pub store_only: bool,
}

fn default_restart_write() -> bool { true }
fn default_restart_dir() -> PathBuf { PathBuf::from("./") }
fn default_restart_prefix() -> String { "restart".to_string() }

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            input_file: None,
            write: default_restart_write(),
            directory: default_restart_dir(),
            prefix: default_restart_prefix(),
            store_only: false,
        }
    }
}

// ============================================================================
// 加载与验证
// ============================================================================

impl RunConfig {
    /// 从 JSON 文件加载并验证
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        let config: RunConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        for warning in config.warnings() {
            tracing::warn!("{}", warning);
        }
        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content).map_err(ConfigError::Io)?;
        Ok(())
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 网格
        if self.grid.nx == 0 || self.grid.ny == 0 {
            return Err(ConfigError::invalid(
                "grid.nx/ny",
                format!("{}x{}", self.grid.nx, self.grid.ny),
                "网格尺寸必须为正",
            ));
        }
        if self.grid.nlfp == 0 {
            return Err(ConfigError::invalid("grid.nlfp", self.grid.nlfp, "漫滩层数至少为 1"));
        }

        // 物理参数
        let p = &self.physics;
        for (key, value) in [
            ("physics.pgrv", p.pgrv),
            ("physics.pmanriv", p.pmanriv),
            ("physics.pmanfld", p.pmanfld),
            ("physics.pdstmth", p.pdstmth),
            ("physics.slope_clamp", p.slope_clamp),
        ] {
            if !(value > 0.0) {
                return Err(ConfigError::invalid(key, value, "必须为正"));
            }
        }
        if !(p.pcadp > 0.0 && p.pcadp <= 1.0) {
            return Err(ConfigError::invalid("physics.pcadp", p.pcadp, "必须在 (0, 1] 范围内"));
        }
        if !(p.limiter_fraction > 0.0 && p.limiter_fraction <= 1.0) {
            return Err(ConfigError::invalid(
                "physics.limiter_fraction",
                p.limiter_fraction,
                "必须在 (0, 1] 范围内",
            ));
        }

        // 时间步长
        let t = &self.time;
        if t.dt < 60.0 || (t.dt % 60.0) != 0.0 {
            return Err(ConfigError::invalid("time.dt", t.dt, "必须不小于 60 且为 60 的整数倍"));
        }
        if t.dtin <= 0.0 || (t.dtin % t.dt) != 0.0 {
            return Err(ConfigError::invalid("time.dtin", t.dtin, "必须为 dt 的整数倍"));
        }
        if t.end <= t.start {
            return Err(ConfigError::invalid("time.end", t.end, "结束时间必须晚于起始时间"));
        }
        if !(1..=24).contains(&t.output_interval_hours) {
            return Err(ConfigError::invalid(
                "time.output_interval_hours",
                t.output_interval_hours,
                "必须在 1..=24 范围内",
            ));
        }
        if !(t.restart_interval_hours <= 24 || t.restart_interval_hours == 30) {
            return Err(ConfigError::invalid(
                "time.restart_interval_hours",
                t.restart_interval_hours,
                "必须为 0、1..=24 或 30",
            ));
        }

        // 特性组合
        if self.features.kinematic && self.features.bifurcation {
            return Err(ConfigError::Incompatible {
                a: "kinematic".into(),
                b: "bifurcation".into(),
            });
        }
        if self.features.bifurcation && self.input.bifurcation.is_none() {
            return Err(ConfigError::Missing("input.bifurcation".into()));
        }
        if self.features.mean_sea_level && self.input.mean_sea_level.is_none() {
            return Err(ConfigError::Missing("input.mean_sea_level".into()));
        }
        if self.features.runoff_split && self.forcing.subsurface.is_none() {
            return Err(ConfigError::Missing("forcing.subsurface".into()));
        }
        if self.restart.enabled && self.restart.input_file.is_none() {
            return Err(ConfigError::Missing("restart.input_file".into()));
        }
        if self.forcing.inpn == 0 {
            return Err(ConfigError::invalid("forcing.inpn", 0, "至少为 1"));
        }
        if !(self.forcing.drofunit > 0.0) {
            return Err(ConfigError::invalid("forcing.drofunit", self.forcing.drofunit, "必须为正"));
        }

        Ok(())
    }

    /// 非致命的配置警告
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.features.kinematic && self.features.adaptive_step {
            warnings.push("运动波模式下不建议启用自适应步长".to_string());
        }
        if !self.features.floodplain && self.features.floodplain_outflow {
            warnings.push("关闭漫滩储量时漫滩流量始终为零".to_string());
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RunConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.grid.nlfp, 10);
        assert!((config.physics.pgrv - 9.8).abs() < 1e-12);
    }

    #[test]
    fn test_dt_must_be_minute_multiple() {
        let mut config = RunConfig::default();
        config.time.dt = 90.0;
        assert!(config.validate().is_err());
        config.time.dt = 30.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_dtin_must_be_dt_multiple() {
        let mut config = RunConfig::default();
        config.time.dt = 3600.0;
        config.time.dtin = 5400.0;
        assert!(config.validate().is_err());
        config.time.dtin = 10800.0;
        assert!(config.validate().is_ok());
        assert_eq!(config.time.steps_per_input(), 3);
    }

    #[test]
    fn test_kinematic_with_bifurcation_is_fatal() {
        let mut config = RunConfig::default();
        config.features.kinematic = true;
        config.features.bifurcation = true;
        config.input.bifurcation = Some(PathBuf::from("bifprm.txt"));
        assert!(matches!(config.validate(), Err(ConfigError::Incompatible { .. })));
    }

    #[test]
    fn test_kinematic_with_adaptive_warns() {
        let mut config = RunConfig::default();
        config.features.kinematic = true;
        assert!(config.validate().is_ok());
        assert_eq!(config.warnings().len(), 1);
    }

    #[test]
    fn test_total_steps() {
        let mut config = RunConfig::default();
        config.time.end = ymd_midnight(2000, 1, 2);
        config.time.dt = 3600.0;
        assert_eq!(config.time.total_steps(), 24);
    }

    #[test]
    fn test_runoff_file_name() {
        let files = default_surface_runoff();
        let path = files.path_for(NaiveDate::from_ymd_opt(2000, 3, 7).unwrap());
        assert!(path.ends_with("Roff____20000307.one"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        let mut config = RunConfig::default();
        config.physics.pcadp = 0.5;
        config.save_to_file(&path).unwrap();
        let loaded = RunConfig::from_file(&path).unwrap();
        assert!((loaded.physics.pcadp - 0.5).abs() < 1e-12);
        assert_eq!(loaded.time.start, config.time.start);
    }

    #[test]
    fn test_partial_json() {
        let json = r#"{ "grid": { "nx": 4, "ny": 3 }, "time": { "dt": 600.0, "dtin": 3600.0 } }"#;
        let config: RunConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.grid.nx, 4);
        assert_eq!(config.grid.nlfp, 10);
        assert!(config.validate().is_ok());
    }
}
