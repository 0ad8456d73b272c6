// crates/rf_physics/src/forcing.rs

//! 径流强迫
//!
//! 输入网格上的径流深度率经面积加权插值矩阵映射到河网单元，
//! 再除以 `drofunit` 得到体积流量 [m³/s]。
//!
//! 文件读取由 [`RunoffSource`] 的实现者负责，本模块只定义接口与插值。

use chrono::NaiveDateTime;
use rf_foundation::{RfError, RfResult};

use crate::network::NetworkTopology;

// ============================================================================
// 插值矩阵
// ============================================================================

/// 输入网格到河网单元的插值矩阵
///
/// 每个单元最多 `inpn` 个贡献格点，坐标从 1 开始，0 或负值表示空位。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputMatrix {
    inpn: usize,
    /// 贡献格点 X 坐标 `[seq * inpn + k]`
    pub ix: Vec<i32>,
    /// 贡献格点 Y 坐标
    pub iy: Vec<i32>,
    /// 贡献面积 [m²]
    pub area: Vec<f64>,
}

impl InputMatrix {
    /// 由按序号排列的数组创建
    pub fn new(inpn: usize, ix: Vec<i32>, iy: Vec<i32>, area: Vec<f64>) -> RfResult<Self> {
        RfError::check_size("inpmat.iy", ix.len(), iy.len())?;
        RfError::check_size("inpmat.area", ix.len(), area.len())?;
        if inpn == 0 || ix.len() % inpn != 0 {
            return Err(RfError::invalid_input(format!(
                "插值矩阵长度 {} 不是 inpn = {} 的整数倍",
                ix.len(),
                inpn
            )));
        }
        Ok(Self { inpn, ix, iy, area })
    }

    /// 由河网网格上的 `inpn` 层记录抽取
    pub fn from_grids(
        network: &NetworkTopology,
        ix_grids: &[Vec<i32>],
        iy_grids: &[Vec<i32>],
        area_grids: &[Vec<f64>],
    ) -> RfResult<Self> {
        let inpn = ix_grids.len();
        RfError::check_size("inpmat.iy", inpn, iy_grids.len())?;
        RfError::check_size("inpmat.area", inpn, area_grids.len())?;
        let per_layer_ix = ix_grids
            .iter()
            .map(|g| network.gather(g))
            .collect::<RfResult<Vec<_>>>()?;
        let per_layer_iy = iy_grids
            .iter()
            .map(|g| network.gather(g))
            .collect::<RfResult<Vec<_>>>()?;
        let per_layer_area = area_grids
            .iter()
            .map(|g| network.gather(g))
            .collect::<RfResult<Vec<_>>>()?;

        let n = network.nseq_all();
        let mut ix = Vec::with_capacity(n * inpn);
        let mut iy = Vec::with_capacity(n * inpn);
        let mut area = Vec::with_capacity(n * inpn);
        for i in 0..n {
            for k in 0..inpn {
                ix.push(per_layer_ix[k][i]);
                iy.push(per_layer_iy[k][i]);
                area.push(per_layer_area[k][i]);
            }
        }
        Self::new(inpn, ix, iy, area)
    }

    /// 每个单元的贡献格点数
    pub fn inpn(&self) -> usize {
        self.inpn
    }

    /// 单元数
    pub fn nseq(&self) -> usize {
        if self.inpn == 0 {
            0
        } else {
            self.ix.len() / self.inpn
        }
    }

    /// 插值到河网单元
    ///
    /// `buffer` 为输入网格行优先数组；缺测值与越界格点被跳过。
    pub fn interpolate(
        &self,
        buffer: &[f64],
        nxin: usize,
        nyin: usize,
        rmis: f64,
        drofunit: f64,
        out: &mut [f64],
    ) -> RfResult<()> {
        RfError::check_size("runoff buffer", nxin * nyin, buffer.len())?;
        RfError::check_size("runoff", self.nseq(), out.len())?;

        for (i, value) in out.iter_mut().enumerate() {
            let mut sum = 0.0;
            for k in 0..self.inpn {
                let idx = i * self.inpn + k;
                let (x, y) = (self.ix[idx], self.iy[idx]);
                if x <= 0 || y <= 0 || x as usize > nxin || y as usize > nyin {
                    continue;
                }
                let v = buffer[(y as usize - 1) * nxin + (x as usize - 1)];
                if v == rmis || !v.is_finite() {
                    continue;
                }
                sum += v * self.area[idx] / drofunit;
            }
            *value = sum;
        }
        Ok(())
    }
}

// ============================================================================
// 强迫来源
// ============================================================================

/// 径流强迫来源
pub trait RunoffSource {
    /// 检查模拟时段 `[start, end)` 的数据是否齐全
    fn check_availability(&self, _start: NaiveDateTime, _end: NaiveDateTime) -> RfResult<()> {
        Ok(())
    }

    /// 读取从 `time` 开始的强迫时段，写入每个单元的地表与地下径流 [m³/s]
    fn runoff_at(
        &mut self,
        time: NaiveDateTime,
        surface: &mut [f64],
        subsurface: &mut [f64],
    ) -> RfResult<()>;
}

/// 恒定径流
#[derive(Debug, Clone, Default)]
pub struct ConstantRunoff {
    /// 地表径流 [m³/s]
    pub surface: Vec<f64>,
    /// 地下径流 [m³/s]
    pub subsurface: Vec<f64>,
}

impl ConstantRunoff {
    /// 零径流
    pub fn zero(nseq: usize) -> Self {
        Self {
            surface: vec![0.0; nseq],
            subsurface: vec![0.0; nseq],
        }
    }

    /// 仅地表径流
    pub fn surface(surface: Vec<f64>) -> Self {
        let n = surface.len();
        Self {
            surface,
            subsurface: vec![0.0; n],
        }
    }
}

impl RunoffSource for ConstantRunoff {
    fn runoff_at(
        &mut self,
        _time: NaiveDateTime,
        surface: &mut [f64],
        subsurface: &mut [f64],
    ) -> RfResult<()> {
        RfError::check_size("runoff", surface.len(), self.surface.len())?;
        RfError::check_size("rofsub", subsurface.len(), self.subsurface.len())?;
        surface.copy_from_slice(&self.surface);
        subsurface.copy_from_slice(&self.subsurface);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_interpolate_area_weighted() {
        // 两个单元，每个两个贡献格点，输入网格 2x2
        let matrix = InputMatrix::new(
            2,
            vec![1, 2, 1, 0],
            vec![1, 1, 2, 0],
            vec![100.0, 200.0, 50.0, 999.0],
        )
        .unwrap();
        let buffer = vec![1.0, 2.0, 3.0, 4.0];
        let mut out = vec![0.0; 2];
        matrix.interpolate(&buffer, 2, 2, 1e20, 10.0, &mut out).unwrap();
        assert!((out[0] - (100.0 + 400.0) / 10.0).abs() < EPS);
        assert!((out[1] - 150.0 / 10.0).abs() < EPS);
    }

    #[test]
    fn test_missing_and_out_of_range_skipped() {
        let matrix = InputMatrix::new(2, vec![1, 3], vec![1, 1], vec![1.0, 1.0]).unwrap();
        let buffer = vec![1e20, 5.0];
        let mut out = vec![0.0; 1];
        matrix.interpolate(&buffer, 2, 1, 1e20, 1.0, &mut out).unwrap();
        assert_eq!(out[0], 0.0);
    }

    #[test]
    fn test_from_grids() {
        let network = NetworkTopology::from_sequence(vec![Some(1), None]).unwrap();
        let matrix = InputMatrix::from_grids(
            &network,
            &[vec![1, 2]],
            &[vec![1, 1]],
            &[vec![10.0, 20.0]],
        )
        .unwrap();
        assert_eq!(matrix.nseq(), 2);
        assert_eq!(matrix.ix, vec![1, 2]);
        assert_eq!(matrix.area, vec![10.0, 20.0]);
    }

    #[test]
    fn test_constant_runoff() {
        let mut source = ConstantRunoff::surface(vec![1.0, 2.0]);
        let mut surface = vec![0.0; 2];
        let mut subsurface = vec![0.0; 2];
        let time = chrono::NaiveDate::from_ymd_opt(2000, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        source.runoff_at(time, &mut surface, &mut subsurface).unwrap();
        assert_eq!(surface, vec![1.0, 2.0]);
        assert_eq!(subsurface, vec![0.0, 0.0]);
    }
}
