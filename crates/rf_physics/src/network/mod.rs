// crates/rf_physics/src/network/mod.rs

//! 河网拓扑构建
//!
//! 将二维下游指针图转换为自上游向下游拓扑排序的一维单元序列。
//!
//! # 序列约定
//!
//! - 序号 `0..nseq_riv` 为有下游单元的河段单元，满足 `next[i] > i`
//! - 序号 `nseq_riv..nseq_all` 为河口单元，没有下游单元
//! - 所有数组按序号稠密存储，从 0 开始
//!
//! # 指针编码
//!
//! 下游指针文件中的坐标从 1 开始：
//!
//! | nextx 值 | 含义 |
//! |---|---|
//! | `> 0` | 下游格点坐标 `(nextx, nexty)` |
//! | `== imis` | 区域外 |
//! | 其他非正值 | 河口/内流终点 |
//!
//! # 算法
//!
//! 分层 Kahn 拓扑排序：先按行优先顺序放入全部源头单元，然后逐层推进，
//! 下游单元的全部上游都已就位且自身仍有下游时加入序列。循环结束后
//! 仍有河段单元未入序列说明存在环路，构建失败。

pub mod pathway;

use rf_foundation::{RfError, RfResult};
use serde::{Deserialize, Serialize};

pub use pathway::{PathwayRecord, PathwaySet, PathwayTable};

// ============================================================================
// 下游指针图
// ============================================================================

/// 二维下游指针图（行优先，`index = iy * nx + ix`）
#[derive(Debug, Clone)]
pub struct DownstreamMap {
    /// X 方向格点数
    pub nx: usize,
    /// Y 方向格点数
    pub ny: usize,
    /// 下游 X 坐标（从 1 开始）
    pub next_x: Vec<i32>,
    /// 下游 Y 坐标（从 1 开始）
    pub next_y: Vec<i32>,
    /// 区域外哨兵值
    pub imis: i32,
}

/// 格点分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GridKind {
    Outside,
    Link(usize),
    Mouth,
}

impl DownstreamMap {
    /// 创建并检查尺寸
    pub fn new(nx: usize, ny: usize, next_x: Vec<i32>, next_y: Vec<i32>, imis: i32) -> RfResult<Self> {
        RfError::check_size("nextx", nx * ny, next_x.len())?;
        RfError::check_size("nexty", nx * ny, next_y.len())?;
        Ok(Self {
            nx,
            ny,
            next_x,
            next_y,
            imis,
        })
    }

    fn classify(&self) -> RfResult<Vec<GridKind>> {
        let n = self.nx * self.ny;
        let mut kinds = Vec::with_capacity(n);
        for g in 0..n {
            let nx = self.next_x[g];
            let kind = if nx == self.imis {
                GridKind::Outside
            } else if nx > 0 {
                let jx = nx as usize - 1;
                let ny = self.next_y[g];
                if ny <= 0 || jx >= self.nx || ny as usize > self.ny {
                    return Err(RfError::configuration(format!(
                        "下游指针越界: 格点 ({}, {}) 指向 ({}, {})",
                        g % self.nx + 1,
                        g / self.nx + 1,
                        nx,
                        ny
                    )));
                }
                GridKind::Link((ny as usize - 1) * self.nx + jx)
            } else {
                GridKind::Mouth
            };
            kinds.push(kind);
        }

        // 指向区域外或指向自身的指针
        for (g, kind) in kinds.iter().enumerate() {
            if let GridKind::Link(t) = *kind {
                if t == g || kinds[t] == GridKind::Outside {
                    return Err(RfError::configuration(format!(
                        "悬空下游指针: 格点 ({}, {}) 指向区域外或自身",
                        g % self.nx + 1,
                        g / self.nx + 1
                    )));
                }
            }
        }
        Ok(kinds)
    }
}

// ============================================================================
// 拓扑
// ============================================================================

/// 河网拓扑（构建后只读）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkTopology {
    nx: usize,
    ny: usize,
    /// 每个序号对应的格点 X 坐标（从 0 开始）
    seq_x: Vec<usize>,
    /// 每个序号对应的格点 Y 坐标（从 0 开始）
    seq_y: Vec<usize>,
    /// 下游单元序号，河口单元为 None
    next: Vec<Option<usize>>,
    nseq_riv: usize,
    /// 格点到序号的映射
    grid_to_seq: Vec<Option<usize>>,
}

impl NetworkTopology {
    /// 从下游指针图构建
    pub fn build(map: &DownstreamMap) -> RfResult<Self> {
        let kinds = map.classify()?;
        let n_grid = map.nx * map.ny;

        // 1. 入度
        let mut upstream_count = vec![0usize; n_grid];
        for kind in &kinds {
            if let GridKind::Link(t) = *kind {
                upstream_count[t] += 1;
            }
        }

        let mut grid_to_seq: Vec<Option<usize>> = vec![None; n_grid];
        let mut order: Vec<usize> = Vec::new();

        // 2. 源头单元，行优先
        for g in 0..n_grid {
            if matches!(kinds[g], GridKind::Link(_)) && upstream_count[g] == 0 {
                grid_to_seq[g] = Some(order.len());
                order.push(g);
            }
        }

        // 3. 分层推进
        let mut arrived = vec![0usize; n_grid];
        let mut frontier_start = 0;
        while frontier_start < order.len() {
            let frontier_end = order.len();
            for k in frontier_start..frontier_end {
                let g = order[k];
                let GridKind::Link(t) = kinds[g] else {
                    continue;
                };
                arrived[t] += 1;
                if arrived[t] == upstream_count[t] && matches!(kinds[t], GridKind::Link(_)) {
                    grid_to_seq[t] = Some(order.len());
                    order.push(t);
                }
            }
            frontier_start = frontier_end;
        }

        let n_link = kinds.iter().filter(|k| matches!(k, GridKind::Link(_))).count();
        if order.len() != n_link {
            let stuck = (0..n_grid)
                .find(|&g| matches!(kinds[g], GridKind::Link(_)) && grid_to_seq[g].is_none())
                .unwrap_or(0);
            return Err(RfError::configuration(format!(
                "下游指针存在环路: {} 个河段单元无法排序 (例如格点 ({}, {}))",
                n_link - order.len(),
                stuck % map.nx + 1,
                stuck / map.nx + 1
            )));
        }
        let nseq_riv = order.len();

        // 4. 河口单元，行优先
        for g in 0..n_grid {
            if kinds[g] == GridKind::Mouth {
                grid_to_seq[g] = Some(order.len());
                order.push(g);
            }
        }

        // 5. 下游序号
        let next = order
            .iter()
            .map(|&g| match kinds[g] {
                GridKind::Link(t) => grid_to_seq[t],
                _ => None,
            })
            .collect();

        tracing::debug!(
            "河网构建完成: 河段单元 {}, 河口单元 {}",
            nseq_riv,
            order.len() - nseq_riv
        );

        Ok(Self {
            nx: map.nx,
            ny: map.ny,
            seq_x: order.iter().map(|&g| g % map.nx).collect(),
            seq_y: order.iter().map(|&g| g / map.nx).collect(),
            next,
            nseq_riv,
            grid_to_seq,
        })
    }

    /// 直接由下游序号构建一维河网（无二维网格，nx = nseq, ny = 1）
    ///
    /// `next[i]` 必须满足拓扑顺序：河段单元在前，下游序号大于自身。
    pub fn from_sequence(next: Vec<Option<usize>>) -> RfResult<Self> {
        let n = next.len();
        for &j in next.iter().flatten() {
            RfError::check_index("downstream", j, n)?;
        }
        let nseq_riv = next.iter().take_while(|d| d.is_some()).count();
        if next[nseq_riv..].iter().any(|d| d.is_some()) {
            return Err(RfError::configuration("河口单元必须位于序列末尾"));
        }
        let topo = Self {
            nx: n,
            ny: 1,
            seq_x: (0..n).collect(),
            seq_y: vec![0; n],
            next,
            nseq_riv,
            grid_to_seq: (0..n).map(Some).collect(),
        };
        topo.check_order()?;
        Ok(topo)
    }

    /// 检查拓扑顺序
    pub fn check_order(&self) -> RfResult<()> {
        for i in 0..self.nseq_riv {
            match self.next[i] {
                Some(j) if j > i && j < self.nseq_all() => {}
                other => {
                    return Err(RfError::invariant(
                        "topological_order",
                        i,
                        format!("下游序号 {:?} 不大于自身", other),
                    ))
                }
            }
        }
        Ok(())
    }

    /// X 方向格点数
    pub fn nx(&self) -> usize {
        self.nx
    }

    /// Y 方向格点数
    pub fn ny(&self) -> usize {
        self.ny
    }

    /// 全部单元数 (NSEQALL)
    pub fn nseq_all(&self) -> usize {
        self.next.len()
    }

    /// 河段单元数 (NSEQRIV)
    pub fn nseq_riv(&self) -> usize {
        self.nseq_riv
    }

    /// 下游单元序号
    #[inline]
    pub fn next(&self, seq: usize) -> Option<usize> {
        self.next[seq]
    }

    /// 下游序号数组
    pub fn next_slice(&self) -> &[Option<usize>] {
        &self.next
    }

    /// 是否为河口单元
    #[inline]
    pub fn is_mouth(&self, seq: usize) -> bool {
        seq >= self.nseq_riv
    }

    /// 序号对应的格点坐标（从 0 开始）
    pub fn grid_xy(&self, seq: usize) -> (usize, usize) {
        (self.seq_x[seq], self.seq_y[seq])
    }

    /// 格点坐标（从 0 开始）对应的序号
    pub fn seq_at(&self, ix: usize, iy: usize) -> Option<usize> {
        if ix >= self.nx || iy >= self.ny {
            return None;
        }
        self.grid_to_seq[iy * self.nx + ix]
    }

    /// 从二维网格按序号抽取
    pub fn gather<T: Copy>(&self, grid: &[T]) -> RfResult<Vec<T>> {
        RfError::check_size("grid", self.nx * self.ny, grid.len())?;
        Ok((0..self.nseq_all())
            .map(|i| grid[self.seq_y[i] * self.nx + self.seq_x[i]])
            .collect())
    }

    /// 按序号写回二维网格，区域外填充 `fill`
    pub fn scatter<T: Copy>(&self, values: &[T], fill: T) -> Vec<T> {
        let mut grid = vec![fill; self.nx * self.ny];
        for (i, &v) in values.iter().enumerate().take(self.nseq_all()) {
            grid[self.seq_y[i] * self.nx + self.seq_x[i]] = v;
        }
        grid
    }
}
