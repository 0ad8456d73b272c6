// crates/rf_io/src/output.rs

//! 诊断输出
//!
//! 每个变量一个文件 `{dir}/{var}{tag}.bin`，每次输出追加一条
//! `NX×NY` float32 记录，河网外格点填 `rmis`。`pthflw` 以通道为单位，
//! 每次追加 `NPTHLEV` 条长度为 `NPTHOUT` 的记录。
//!
//! 同目录下的 `{tag}` 清单（JSON）记录变量名称、单位与已写记录数。

use std::fs::File;
use std::path::{Path, PathBuf};

use rf_config::OutputConfig;
use rf_foundation::{RfError, RfResult};
use rf_physics::driver::{OutputFrame, OutputSink};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{IoError, IoResult};
use crate::maps::write_f32_records;

/// 可输出变量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputVariable {
    /// 河道流量
    Rivout,
    /// 河道蓄量
    Rivsto,
    /// 河道水深
    Rivdph,
    /// 河道流速
    Rivvel,
    /// 漫滩流量
    Fldout,
    /// 漫滩蓄量
    Fldsto,
    /// 漫滩水深
    Flddph,
    /// 淹没比例
    Fldfrc,
    /// 淹没面积
    Fldare,
    /// 水面高程
    Sfcelv,
    /// 总出流
    Outflw,
    /// 总蓄量
    Storge,
    /// 分汊净出流
    Pthout,
    /// 分汊分层流量
    Pthflw,
    /// 最大出流
    Maxflw,
    /// 最大河道水深
    Maxdph,
    /// 最大蓄量
    Maxsto,
    /// 地表径流
    Runoff,
    /// 地下径流
    Rofsub,
}

impl OutputVariable {
    /// 全部变量
    pub const ALL: [OutputVariable; 19] = [
        Self::Rivout,
        Self::Rivsto,
        Self::Rivdph,
        Self::Rivvel,
        Self::Fldout,
        Self::Fldsto,
        Self::Flddph,
        Self::Fldfrc,
        Self::Fldare,
        Self::Sfcelv,
        Self::Outflw,
        Self::Storge,
        Self::Pthout,
        Self::Pthflw,
        Self::Maxflw,
        Self::Maxdph,
        Self::Maxsto,
        Self::Runoff,
        Self::Rofsub,
    ];

    /// 文件名中的变量名
    pub fn name(self) -> &'static str {
        match self {
            Self::Rivout => "rivout",
            Self::Rivsto => "rivsto",
            Self::Rivdph => "rivdph",
            Self::Rivvel => "rivvel",
            Self::Fldout => "fldout",
            Self::Fldsto => "fldsto",
            Self::Flddph => "flddph",
            Self::Fldfrc => "fldfrc",
            Self::Fldare => "fldare",
            Self::Sfcelv => "sfcelv",
            Self::Outflw => "outflw",
            Self::Storge => "storge",
            Self::Pthout => "pthout",
            Self::Pthflw => "pthflw",
            Self::Maxflw => "maxflw",
            Self::Maxdph => "maxdph",
            Self::Maxsto => "maxsto",
            Self::Runoff => "runoff",
            Self::Rofsub => "rofsub",
        }
    }

    /// 按名称查找
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.name() == name)
    }

    /// 描述
    pub fn long_name(self) -> &'static str {
        match self {
            Self::Rivout => "river discharge",
            Self::Rivsto => "river storage",
            Self::Rivdph => "river water depth",
            Self::Rivvel => "river flow velocity",
            Self::Fldout => "floodplain discharge",
            Self::Fldsto => "floodplain storage",
            Self::Flddph => "floodplain water depth",
            Self::Fldfrc => "flooded fraction",
            Self::Fldare => "flooded area",
            Self::Sfcelv => "water surface elevation",
            Self::Outflw => "total discharge (river + floodplain)",
            Self::Storge => "total storage (river + floodplain)",
            Self::Pthout => "net bifurcation outflow",
            Self::Pthflw => "bifurcation layer discharge",
            Self::Maxflw => "maximum discharge",
            Self::Maxdph => "maximum river depth",
            Self::Maxsto => "maximum storage",
            Self::Runoff => "surface runoff input",
            Self::Rofsub => "subsurface runoff input",
        }
    }

    /// 单位
    pub fn unit(self) -> &'static str {
        match self {
            Self::Rivout | Self::Fldout | Self::Outflw | Self::Pthout | Self::Pthflw => "m3/s",
            Self::Maxflw | Self::Runoff | Self::Rofsub => "m3/s",
            Self::Rivsto | Self::Fldsto | Self::Storge | Self::Maxsto => "m3",
            Self::Rivdph | Self::Flddph | Self::Maxdph => "m",
            Self::Sfcelv => "m",
            Self::Rivvel => "m/s",
            Self::Fldfrc => "-",
            Self::Fldare => "m2",
        }
    }

    /// 按序号排列的单元值；`pthflw` 返回 None
    ///
    /// 通量类变量取输出时段平均，状态类取瞬时值，最大值取时段最大。
    pub fn cell_values<'a>(self, frame: &'a OutputFrame<'_>) -> Option<&'a [f64]> {
        let mean = &frame.diagnostics.output.mean;
        let max = &frame.diagnostics.output.max;
        let state = frame.state;
        let values = match self {
            Self::Rivout => &mean.rivout,
            Self::Rivvel => &mean.rivvel,
            Self::Fldout => &mean.fldout,
            Self::Outflw => &mean.outflw,
            Self::Pthout => &mean.pthout,
            Self::Runoff => &mean.runoff,
            Self::Rofsub => &mean.rofsub,
            Self::Rivsto => &state.rivsto,
            Self::Rivdph => &state.rivdph,
            Self::Fldsto => &state.fldsto,
            Self::Flddph => &state.flddph,
            Self::Fldfrc => &state.fldfrc,
            Self::Fldare => &state.fldare,
            Self::Sfcelv => &state.sfcelv,
            Self::Storge => &state.storge,
            Self::Maxflw => &max.maxflw,
            Self::Maxdph => &max.maxdph,
            Self::Maxsto => &max.maxsto,
            Self::Pthflw => return None,
        };
        Some(values.as_slice())
    }
}

/// 清单中的单个变量
#[derive(Debug, Serialize)]
struct ManifestEntry {
    name: &'static str,
    long_name: &'static str,
    unit: &'static str,
    file: PathBuf,
}

/// 输出清单
#[derive(Debug, Serialize)]
struct Manifest {
    nx: usize,
    ny: usize,
    rmis: f64,
    records: usize,
    last_time: Option<String>,
    variables: Vec<ManifestEntry>,
}

/// 二进制诊断输出
#[derive(Debug)]
pub struct BinaryOutputWriter {
    directory: PathBuf,
    tag: String,
    rmis: f64,
    variables: Vec<OutputVariable>,
    records: usize,
}

impl BinaryOutputWriter {
    /// 创建输出目录并清空同名文件
    pub fn new(config: &OutputConfig, rmis: f64) -> IoResult<Self> {
        let variables = config
            .variables
            .iter()
            .map(|name| {
                OutputVariable::from_name(name).ok_or_else(|| {
                    IoError::Foundation(RfError::configuration(format!("未知输出变量: {name}")))
                })
            })
            .collect::<IoResult<Vec<_>>>()?;

        std::fs::create_dir_all(&config.directory)?;
        let writer = Self {
            directory: config.directory.clone(),
            tag: config.tag.clone(),
            rmis,
            variables,
            records: 0,
        };
        for var in &writer.variables {
            File::create(writer.path_of(*var))?;
        }
        info!(
            "输出目录 {}: {} 个变量",
            writer.directory.display(),
            writer.variables.len()
        );
        Ok(writer)
    }

    /// 变量文件路径
    pub fn path_of(&self, var: OutputVariable) -> PathBuf {
        self.directory.join(format!("{}{}.bin", var.name(), self.tag))
    }

    /// 清单路径
    pub fn manifest_path(&self) -> PathBuf {
        self.directory.join(format!("manifest{}.json", self.tag))
    }

    /// 输出变量
    pub fn variables(&self) -> &[OutputVariable] {
        &self.variables
    }

    /// 已写帧数
    pub fn records(&self) -> usize {
        self.records
    }

    fn write_cells(&self, path: &Path, frame: &OutputFrame<'_>, values: &[f64]) -> IoResult<()> {
        let cells: Vec<f32> = values.iter().map(|v| *v as f32).collect();
        let grid = frame.network.scatter(&cells, self.rmis as f32);
        write_f32_records(path, &[&grid], true)
    }

    fn write_paths(&self, path: &Path, frame: &OutputFrame<'_>) -> IoResult<()> {
        let paths = frame.pathways;
        let values = &frame.diagnostics.output.mean.pthflw;
        RfError::check_size("pthflw", paths.len() * paths.npthlev, values.len())?;
        let layers: Vec<Vec<f32>> = (0..paths.npthlev)
            .map(|layer| {
                (0..paths.len())
                    .map(|p| values[paths.index(p, layer)] as f32)
                    .collect()
            })
            .collect();
        let refs: Vec<&[f32]> = layers.iter().map(|l| l.as_slice()).collect();
        write_f32_records(path, &refs, true)
    }

    fn write_manifest(&self, frame: &OutputFrame<'_>) -> IoResult<()> {
        let manifest = Manifest {
            nx: frame.network.nx(),
            ny: frame.network.ny(),
            rmis: self.rmis,
            records: self.records,
            last_time: Some(frame.time.format("%Y-%m-%d %H:%M").to_string()),
            variables: self
                .variables
                .iter()
                .map(|v| ManifestEntry {
                    name: v.name(),
                    long_name: v.long_name(),
                    unit: v.unit(),
                    file: self.path_of(*v),
                })
                .collect(),
        };
        let json = serde_json::to_string_pretty(&manifest)
            .map_err(|e| IoError::map(self.manifest_path(), e.to_string()))?;
        std::fs::write(self.manifest_path(), json)?;
        Ok(())
    }

    fn write(&mut self, frame: &OutputFrame<'_>) -> IoResult<()> {
        for var in self.variables.clone() {
            let path = self.path_of(var);
            match var.cell_values(frame) {
                Some(values) => self.write_cells(&path, frame, values)?,
                None => self.write_paths(&path, frame)?,
            }
        }
        self.records += 1;
        self.write_manifest(frame)?;
        debug!("输出第 {} 帧 {}", self.records, frame.time);
        Ok(())
    }
}

impl OutputSink for BinaryOutputWriter {
    fn write_frame(&mut self, frame: &OutputFrame<'_>) -> RfResult<()> {
        Ok(self.write(frame)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for var in OutputVariable::ALL {
            assert_eq!(OutputVariable::from_name(var.name()), Some(var));
            assert!(!var.long_name().is_empty());
            assert!(!var.unit().is_empty());
        }
        assert_eq!(OutputVariable::from_name("rivsto2"), None);
    }

    #[test]
    fn test_unknown_variable_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = OutputConfig {
            enabled: true,
            directory: dir.path().to_path_buf(),
            tag: "_test".into(),
            variables: vec!["rivout".into(), "bogus".into()],
        };
        let err = BinaryOutputWriter::new(&config, 1e20).unwrap_err();
        assert!(err.to_string().contains("bogus"));
    }
}
