// crates/rf_physics/src/topography.rs

//! 单元静态地形参数
//!
//! 地形在初始化时由输入地图派生一次，运行期间只读。
//!
//! # 派生量
//!
//! - `rivstomax = rivlen * rivwth * rivhgt`：河道满槽蓄量（关闭漫滩时为 1e18）
//! - `rivelv = elevtn - rivhgt`：河床高程
//! - `dwthinc = grarea / rivlen / nlfp`：每层漫滩宽度增量
//! - `fldstomax[l]`：水位达到第 l 层顶时的总蓄量，随层号单调不减
//! - `fldgrd[l]`：第 l 层的漫滩高程梯度
//! - `dwnelv = elevtn (+ 平均海平面)`：河口下游边界水位

use rf_foundation::float::UNBOUNDED_STORAGE;
use rf_foundation::{RfError, RfResult};
use serde::{Deserialize, Serialize};

use crate::network::NetworkTopology;

/// 按序号排列的地形输入
#[derive(Debug, Clone, Default)]
pub struct TopographyInput {
    /// 单元集水面积 [m²]
    pub grarea: Vec<f64>,
    /// 岸顶高程 [m]
    pub elevtn: Vec<f64>,
    /// 至下游单元距离 [m]
    pub nxtdst: Vec<f64>,
    /// 河道长度 [m]
    pub rivlen: Vec<f64>,
    /// 河道宽度 [m]
    pub rivwth: Vec<f64>,
    /// 河道深度 [m]
    pub rivhgt: Vec<f64>,
    /// 河道 Manning 系数
    pub rivman: Vec<f64>,
    /// 漫滩高程剖面，`[seq * nlfp + layer]`
    pub fldhgt: Vec<f64>,
    /// 平均海平面 [m]
    pub mean_sea_level: Option<Vec<f64>>,
}

/// 单个单元的几何参数，用于构造均匀河道
#[derive(Debug, Clone)]
pub struct CellGeometry {
    /// 集水面积 [m²]
    pub grarea: f64,
    /// 岸顶高程 [m]
    pub elevtn: f64,
    /// 至下游距离 [m]
    pub nxtdst: f64,
    /// 河道长度 [m]
    pub rivlen: f64,
    /// 河道宽度 [m]
    pub rivwth: f64,
    /// 河道深度 [m]
    pub rivhgt: f64,
    /// Manning 系数
    pub rivman: f64,
    /// 漫滩剖面（相对岸顶的高度），长度为 nlfp
    pub fldhgt: Vec<f64>,
}

impl TopographyInput {
    /// 每个单元参数相同的输入
    pub fn uniform(nseq: usize, cell: &CellGeometry) -> Self {
        Self {
            grarea: vec![cell.grarea; nseq],
            elevtn: vec![cell.elevtn; nseq],
            nxtdst: vec![cell.nxtdst; nseq],
            rivlen: vec![cell.rivlen; nseq],
            rivwth: vec![cell.rivwth; nseq],
            rivhgt: vec![cell.rivhgt; nseq],
            rivman: vec![cell.rivman; nseq],
            fldhgt: (0..nseq).flat_map(|_| cell.fldhgt.iter().copied()).collect(),
            mean_sea_level: None,
        }
    }

    /// 单元数
    pub fn len(&self) -> usize {
        self.grarea.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.grarea.is_empty()
    }
}

/// 派生后的地形
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topography {
    nlfp: usize,
    /// 单元集水面积 [m²]
    pub grarea: Vec<f64>,
    /// 岸顶高程 [m]
    pub elevtn: Vec<f64>,
    /// 至下游距离 [m]
    pub nxtdst: Vec<f64>,
    /// 河道长度 [m]
    pub rivlen: Vec<f64>,
    /// 河道宽度 [m]
    pub rivwth: Vec<f64>,
    /// 河道深度 [m]
    pub rivhgt: Vec<f64>,
    /// 河道 Manning 系数
    pub rivman: Vec<f64>,
    /// 河道满槽蓄量 [m³]
    pub rivstomax: Vec<f64>,
    /// 河床高程 [m]
    pub rivelv: Vec<f64>,
    /// 漫滩每层宽度增量 [m]
    pub dwthinc: Vec<f64>,
    /// 分层累计蓄量上限 [m³]
    pub fldstomax: Vec<f64>,
    /// 分层高程梯度
    pub fldgrd: Vec<f64>,
    /// 河口边界水位 [m]
    pub dwnelv: Vec<f64>,
}

impl Topography {
    /// 由输入派生地形
    pub fn build(input: TopographyInput, nlfp: usize, floodplain: bool) -> RfResult<Self> {
        let n = input.len();
        RfError::check_size("elevtn", n, input.elevtn.len())?;
        RfError::check_size("nxtdst", n, input.nxtdst.len())?;
        RfError::check_size("rivlen", n, input.rivlen.len())?;
        RfError::check_size("rivwth", n, input.rivwth.len())?;
        RfError::check_size("rivhgt", n, input.rivhgt.len())?;
        RfError::check_size("rivman", n, input.rivman.len())?;
        RfError::check_size("fldhgt", n * nlfp, input.fldhgt.len())?;
        if let Some(msl) = &input.mean_sea_level {
            RfError::check_size("mean_sea_level", n, msl.len())?;
        }
        if nlfp == 0 {
            return Err(RfError::configuration("漫滩层数至少为 1"));
        }

        for i in 0..n {
            if !(input.rivlen[i] > 0.0 && input.rivwth[i] > 0.0) {
                return Err(RfError::invariant(
                    "positive_channel_geometry",
                    i,
                    format!("rivlen = {}, rivwth = {}", input.rivlen[i], input.rivwth[i]),
                ));
            }
        }

        let rivstomax: Vec<f64> = (0..n)
            .map(|i| {
                if floodplain {
                    input.rivlen[i] * input.rivwth[i] * input.rivhgt[i]
                } else {
                    UNBOUNDED_STORAGE
                }
            })
            .collect();
        let rivelv: Vec<f64> = (0..n).map(|i| input.elevtn[i] - input.rivhgt[i]).collect();
        let dwthinc: Vec<f64> = (0..n)
            .map(|i| input.grarea[i] / input.rivlen[i] / nlfp as f64)
            .collect();

        let mut fldstomax = vec![0.0; n * nlfp];
        let mut fldgrd = vec![0.0; n * nlfp];
        for i in 0..n {
            let mut stopre = rivstomax[i];
            let mut hgtpre = 0.0;
            let wthpre = input.rivwth[i];
            for l in 0..nlfp {
                let k = i * nlfp + l;
                let hgt = input.fldhgt[k];
                let stonow = input.rivlen[i]
                    * (wthpre + dwthinc[i] * (l as f64 + 0.5))
                    * (hgt - hgtpre);
                fldstomax[k] = stopre + stonow;
                fldgrd[k] = if dwthinc[i] > 0.0 {
                    (hgt - hgtpre) / dwthinc[i]
                } else {
                    0.0
                };
                if fldstomax[k] < stopre {
                    return Err(RfError::invariant(
                        "monotone_floodplain_storage",
                        i,
                        format!("第 {} 层蓄量上限 {} 小于下层 {}", l, fldstomax[k], stopre),
                    ));
                }
                stopre = fldstomax[k];
                hgtpre = hgt;
            }
        }

        let dwnelv = match &input.mean_sea_level {
            Some(msl) => (0..n).map(|i| input.elevtn[i] + msl[i]).collect(),
            None => input.elevtn.clone(),
        };

        Ok(Self {
            nlfp,
            grarea: input.grarea,
            elevtn: input.elevtn,
            nxtdst: input.nxtdst,
            rivlen: input.rivlen,
            rivwth: input.rivwth,
            rivhgt: input.rivhgt,
            rivman: input.rivman,
            rivstomax,
            rivelv,
            dwthinc,
            fldstomax,
            fldgrd,
            dwnelv,
        })
    }

    /// 检查地形与河网一致
    ///
    /// 河段单元至下游距离必须为正，否则坡度与稳定步长均无定义。
    pub fn check_network(&self, network: &NetworkTopology) -> RfResult<()> {
        RfError::check_size("topography", network.nseq_all(), self.len())?;
        for i in 0..network.nseq_riv() {
            if !(self.nxtdst[i] > 0.0) {
                return Err(RfError::invariant(
                    "positive_downstream_distance",
                    i,
                    format!("nxtdst = {}", self.nxtdst[i]),
                ));
            }
        }
        Ok(())
    }

    /// 单元数
    pub fn len(&self) -> usize {
        self.grarea.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.grarea.is_empty()
    }

    /// 漫滩层数
    pub fn nlfp(&self) -> usize {
        self.nlfp
    }

    /// 第 l 层累计蓄量上限
    #[inline]
    pub fn fldstomax(&self, seq: usize, layer: usize) -> f64 {
        self.fldstomax[seq * self.nlfp + layer]
    }

    /// 第 l 层高程梯度
    #[inline]
    pub fn fldgrd(&self, seq: usize, layer: usize) -> f64 {
        self.fldgrd[seq * self.nlfp + layer]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn cell() -> CellGeometry {
        CellGeometry {
            grarea: 1.0e6,
            elevtn: 10.0,
            nxtdst: 1000.0,
            rivlen: 1000.0,
            rivwth: 50.0,
            rivhgt: 2.0,
            rivman: 0.03,
            fldhgt: vec![1.0, 2.0],
        }
    }

    #[test]
    fn test_derived_geometry() {
        let topo = Topography::build(TopographyInput::uniform(1, &cell()), 2, true).unwrap();
        assert!((topo.rivstomax[0] - 1.0e5).abs() < EPS);
        assert!((topo.rivelv[0] - 8.0).abs() < EPS);
        // dwthinc = 1e6 / 1000 / 2
        assert!((topo.dwthinc[0] - 500.0).abs() < EPS);
        // 第 0 层: 1000 * (50 + 250) * 1
        assert!((topo.fldstomax(0, 0) - (1.0e5 + 3.0e5)).abs() < EPS);
        // 第 1 层: 1000 * (50 + 750) * 1
        assert!((topo.fldstomax(0, 1) - (4.0e5 + 8.0e5)).abs() < EPS);
        assert!((topo.fldgrd(0, 0) - 1.0 / 500.0).abs() < EPS);
    }

    #[test]
    fn test_floodplain_disabled_is_unbounded() {
        let topo = Topography::build(TopographyInput::uniform(1, &cell()), 2, false).unwrap();
        assert_eq!(topo.rivstomax[0], UNBOUNDED_STORAGE);
    }

    #[test]
    fn test_non_monotone_profile_rejected() {
        let mut geometry = cell();
        geometry.fldhgt = vec![2.0, 1.0];
        let err = Topography::build(TopographyInput::uniform(1, &geometry), 2, true).unwrap_err();
        assert!(matches!(err, RfError::InvariantViolation { .. }));
    }

    #[test]
    fn test_zero_width_rejected() {
        let mut geometry = cell();
        geometry.rivwth = 0.0;
        assert!(Topography::build(TopographyInput::uniform(2, &geometry), 2, true).is_err());
    }

    #[test]
    fn test_zero_downstream_distance_rejected_on_link() {
        let network = NetworkTopology::from_sequence(vec![Some(1), None]).unwrap();
        let mut input = TopographyInput::uniform(2, &cell());
        input.nxtdst = vec![0.0, 0.0];
        let topo = Topography::build(input, 2, true).unwrap();
        let err = topo.check_network(&network).unwrap_err();
        assert!(matches!(
            err,
            RfError::InvariantViolation { invariant: "positive_downstream_distance", cell: 0, .. }
        ));

        // 河口单元使用 pdstmth，不检查 nxtdst
        let mut input = TopographyInput::uniform(2, &cell());
        input.nxtdst = vec![1000.0, 0.0];
        let topo = Topography::build(input, 2, true).unwrap();
        assert!(topo.check_network(&network).is_ok());
    }

    #[test]
    fn test_mean_sea_level_raises_boundary() {
        let mut input = TopographyInput::uniform(2, &cell());
        input.mean_sea_level = Some(vec![0.5, 0.5]);
        let topo = Topography::build(input, 2, true).unwrap();
        assert!((topo.dwnelv[1] - 10.5).abs() < EPS);
    }
}
