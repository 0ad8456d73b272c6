// crates/rf_physics/src/network/pathway.rs

//! 分汊通道表
//!
//! [`PathwayTable`] 是文本表解析后的原始记录（坐标从 1 开始），
//! [`PathwaySet`] 是映射到河网序号后参与计算的稠密数组。

use rf_foundation::float::CLOSED_LAYER_ELEVATION;
use serde::{Deserialize, Serialize};

use super::NetworkTopology;

/// 一条分汊通道的原始记录
#[derive(Debug, Clone, PartialEq)]
pub struct PathwayRecord {
    /// 上游格点坐标 (ix, iy)，从 1 开始
    pub upstream: (usize, usize),
    /// 下游格点坐标 (jx, jy)，从 1 开始
    pub downstream: (usize, usize),
    /// 通道长度 [m]
    pub distance: f64,
    /// 通道高程 [m]
    pub elevation: f64,
    /// 主通道深度 [m]
    pub depth: f64,
    /// 各层宽度 [m]
    pub widths: Vec<f64>,
}

/// 分汊通道表
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathwayTable {
    /// 分层数 (NPTHLEV)
    pub npthlev: usize,
    /// 记录
    pub records: Vec<PathwayRecord>,
}

/// 映射到河网序号的分汊通道
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathwaySet {
    /// 分层数
    pub npthlev: usize,
    /// 上游单元序号
    pub upstream: Vec<usize>,
    /// 下游单元序号
    pub downstream: Vec<usize>,
    /// 通道长度 [m]
    pub distance: Vec<f64>,
    /// 分层底高程，`[path * npthlev + layer]`
    pub elevation: Vec<f64>,
    /// 分层宽度，`[path * npthlev + layer]`
    pub width: Vec<f64>,
    /// 分层 Manning 系数
    pub manning: Vec<f64>,
}

impl PathwaySet {
    /// 没有通道的空集合
    pub fn empty(npthlev: usize) -> Self {
        Self {
            npthlev,
            ..Default::default()
        }
    }

    /// 通道数 (NPTHOUT)
    pub fn len(&self) -> usize {
        self.upstream.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.upstream.is_empty()
    }

    /// 由原始表构建，返回集合与被剔除的记录数
    ///
    /// 任一端点不在河网内的记录被剔除。
    pub fn from_table(
        table: &PathwayTable,
        network: &NetworkTopology,
        pmanriv: f64,
        pmanfld: f64,
    ) -> (Self, usize) {
        let nlev = table.npthlev;
        let mut set = Self::empty(nlev);
        set.manning = (0..nlev)
            .map(|l| if l == 0 { pmanriv } else { pmanfld })
            .collect();

        let lookup = |(x, y): (usize, usize)| {
            if x == 0 || y == 0 {
                None
            } else {
                network.seq_at(x - 1, y - 1)
            }
        };

        let mut excluded = 0;
        for record in &table.records {
            let (Some(up), Some(dn)) = (lookup(record.upstream), lookup(record.downstream)) else {
                excluded += 1;
                continue;
            };
            set.upstream.push(up);
            set.downstream.push(dn);
            set.distance.push(record.distance);
            for l in 0..nlev {
                let wth = record.widths.get(l).copied().unwrap_or(0.0);
                let elv = if wth <= 0.0 {
                    CLOSED_LAYER_ELEVATION
                } else if l == 0 {
                    record.elevation - record.depth
                } else {
                    record.elevation + (l - 1) as f64
                };
                set.elevation.push(elv);
                set.width.push(wth);
            }
        }
        (set, excluded)
    }

    /// 通道 `path` 第 `layer` 层的平铺索引
    #[inline]
    pub fn index(&self, path: usize, layer: usize) -> usize {
        path * self.npthlev + layer
    }
}
