// crates/rf_io/src/forcing.rs

//! 二进制径流强迫
//!
//! # 文件约定
//!
//! - 每日一个文件 `{dir}/{prefix}{YYYYMMDD}{suffix}`，含 `86400 / dtin` 条
//!   `NXIN×NYIN` float32 记录，按当日秒数选取记录
//! - 插值矩阵 `inpmat` 位于河网网格上：`inpn` 条 int32 X 记录、
//!   `inpn` 条 int32 Y 记录、`inpn` 条 float32 面积记录
//!
//! 初始化时逐日检查模拟时段内文件是否齐全，缺失即终止。

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use rf_config::{RunConfig, RunoffFiles};
use rf_foundation::{RfError, RfResult};
use rf_physics::forcing::{InputMatrix, RunoffSource};
use rf_physics::network::NetworkTopology;
use tracing::{debug, info};

use crate::error::{IoError, IoResult};
use crate::maps::{read_f32_records, read_i32_records};

const SECONDS_PER_DAY: u32 = 86_400;

/// 读取插值矩阵
pub fn read_input_matrix(
    path: &Path,
    network: &NetworkTopology,
    inpn: usize,
) -> IoResult<InputMatrix> {
    let (nx, ny) = (network.nx(), network.ny());
    let mut ints = read_i32_records(path, nx, ny, 3 * inpn)?;
    ints.truncate(2 * inpn);
    let (ix, iy) = ints.split_at(inpn);
    let area: Vec<Vec<f64>> = read_f32_records(path, nx, ny, 3 * inpn)?
        .into_iter()
        .skip(2 * inpn)
        .map(|r| r.into_iter().map(f64::from).collect())
        .collect();
    Ok(InputMatrix::from_grids(network, ix, iy, &area)?)
}

/// 逐日二进制径流来源
#[derive(Debug)]
pub struct BinaryRunoffSource {
    matrix: InputMatrix,
    nxin: usize,
    nyin: usize,
    dtin: u32,
    rmis: f64,
    drofunit: f64,
    surface: RunoffFiles,
    subsurface: Option<RunoffFiles>,
    buffer: Vec<f64>,
}

impl BinaryRunoffSource {
    /// 由插值矩阵与运行配置创建
    ///
    /// 仅在 `runoff_split` 开启时读取地下径流。
    pub fn new(matrix: InputMatrix, config: &RunConfig) -> IoResult<Self> {
        let forcing = &config.forcing;
        let dtin = config.time.dtin as u32;
        if dtin == 0 || SECONDS_PER_DAY % dtin != 0 {
            return Err(IoError::forcing(
                &forcing.surface.dir,
                format!("dtin = {} 不能整除一天", config.time.dtin),
            ));
        }
        let subsurface = if config.features.runoff_split {
            forcing.subsurface.clone()
        } else {
            None
        };
        Ok(Self {
            matrix,
            nxin: forcing.nxin,
            nyin: forcing.nyin,
            dtin,
            rmis: config.grid.rmis,
            drofunit: forcing.drofunit,
            surface: forcing.surface.clone(),
            subsurface,
            buffer: vec![0.0; forcing.nxin * forcing.nyin],
        })
    }

    /// 读取插值矩阵并创建
    pub fn from_config(config: &RunConfig, network: &NetworkTopology) -> IoResult<Self> {
        let matrix = read_input_matrix(&config.forcing.inpmat, network, config.forcing.inpn)?;
        info!(
            "插值矩阵 {}: inpn = {}, 输入网格 {}x{}",
            config.forcing.inpmat.display(),
            matrix.inpn(),
            config.forcing.nxin,
            config.forcing.nyin
        );
        Self::new(matrix, config)
    }

    /// 每日记录数
    pub fn records_per_day(&self) -> usize {
        (SECONDS_PER_DAY / self.dtin) as usize
    }

    /// 时刻对应的文件与记录序号
    pub fn locate(&self, files: &RunoffFiles, time: NaiveDateTime) -> (PathBuf, usize) {
        let record = time.num_seconds_from_midnight() / self.dtin;
        (files.path_for(time.date()), record as usize)
    }

    /// 时段内第一个缺失的文件
    pub fn first_missing(&self, start: NaiveDateTime, end: NaiveDateTime) -> Option<PathBuf> {
        let mut date: NaiveDate = start.date();
        while date.and_hms_opt(0, 0, 0)? < end {
            for files in std::iter::once(&self.surface).chain(self.subsurface.as_ref()) {
                let path = files.path_for(date);
                if !path.is_file() {
                    return Some(path);
                }
            }
            date = date.succ_opt()?;
        }
        None
    }

    fn read_record(&mut self, path: &Path, record: usize) -> IoResult<()> {
        let record_bytes = self.nxin * self.nyin * 4;
        let mut file = File::open(path).map_err(|e| IoError::forcing(path, e.to_string()))?;
        let expected = (record_bytes * self.records_per_day()) as u64;
        let len = file.metadata()?.len();
        if len != expected {
            return Err(IoError::forcing(
                path,
                format!("文件大小 {} 字节, 期望 {} 字节", len, expected),
            ));
        }

        let mut bytes = vec![0u8; record_bytes];
        file.seek(SeekFrom::Start((record * record_bytes) as u64))?;
        file.read_exact(&mut bytes)?;

        let missing = self.rmis as f32;
        for (dst, c) in self.buffer.iter_mut().zip(bytes.chunks_exact(4)) {
            let v = f32::from_le_bytes([c[0], c[1], c[2], c[3]]);
            *dst = if v == missing { self.rmis } else { f64::from(v) };
        }
        Ok(())
    }

    fn load_into(&mut self, files: RunoffFiles, time: NaiveDateTime, out: &mut [f64]) -> RfResult<()> {
        let (path, record) = self.locate(&files, time);
        debug!("径流 {} 记录 {}", path.display(), record);
        self.read_record(&path, record)?;
        self.matrix
            .interpolate(&self.buffer, self.nxin, self.nyin, self.rmis, self.drofunit, out)
    }
}

impl RunoffSource for BinaryRunoffSource {
    fn check_availability(&self, start: NaiveDateTime, end: NaiveDateTime) -> RfResult<()> {
        match self.first_missing(start, end) {
            Some(path) => Err(IoError::ForcingMissing { path }.into()),
            None => Ok(()),
        }
    }

    fn runoff_at(
        &mut self,
        time: NaiveDateTime,
        surface: &mut [f64],
        subsurface: &mut [f64],
    ) -> RfResult<()> {
        self.load_into(self.surface.clone(), time, surface)?;
        match self.subsurface.clone() {
            Some(files) => self.load_into(files, time, subsurface),
            None => {
                RfError::check_size("rofsub", surface.len(), subsurface.len())?;
                subsurface.iter_mut().for_each(|v| *v = 0.0);
                Ok(())
            }
        }
    }
}
