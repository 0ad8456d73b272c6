// crates/rf_io/src/bifurcation.rs

//! 分汊通道参数表
//!
//! 文本格式：
//!
//! ```text
//! NPTHOUT NPTHLEV  [注释...]
//! ix iy jx jy dst elv dph wth1 .. wthN  [附加列...]
//! ```
//!
//! 坐标从 1 开始，首行取前两个整数。行数少于 `NPTHOUT` 视为错误，
//! 多余行被忽略。

use std::path::Path;

use rf_physics::network::{PathwayRecord, PathwayTable};
use tracing::info;

use crate::error::{IoError, IoResult};

/// 从文件读取分汊表
pub fn read_pathway_table(path: &Path) -> IoResult<PathwayTable> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| IoError::table(path, 0, format!("无法读取: {e}")))?;
    let table = parse_pathway_table(&content, path)?;
    info!(
        "分汊表 {}: {} 条通道, {} 层",
        path.display(),
        table.records.len(),
        table.npthlev
    );
    Ok(table)
}

/// 解析分汊表文本，`origin` 仅用于错误信息
pub fn parse_pathway_table(content: &str, origin: &Path) -> IoResult<PathwayTable> {
    let mut lines = content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty());

    let (header_idx, header) = lines
        .next()
        .ok_or_else(|| IoError::table(origin, 1, "缺少表头 NPTHOUT NPTHLEV"))?;
    let dims: Vec<usize> = header
        .replace(',', " ")
        .split_whitespace()
        .filter_map(|tok| tok.parse::<usize>().ok())
        .take(2)
        .collect();
    let (npthout, npthlev) = match dims.as_slice() {
        [a, b] => (*a, *b),
        _ => {
            return Err(IoError::table(
                origin,
                header_idx + 1,
                "表头需包含 NPTHOUT 与 NPTHLEV",
            ))
        }
    };
    if npthlev == 0 {
        return Err(IoError::table(origin, header_idx + 1, "NPTHLEV 至少为 1"));
    }

    let mut records = Vec::with_capacity(npthout);
    for (idx, line) in lines.take(npthout) {
        records.push(parse_row(line, npthlev, origin, idx + 1)?);
    }
    if records.len() < npthout {
        return Err(IoError::table(
            origin,
            header_idx + 1,
            format!("声明 {} 条通道, 仅有 {} 行", npthout, records.len()),
        ));
    }

    Ok(PathwayTable { npthlev, records })
}

fn parse_row(line: &str, npthlev: usize, origin: &Path, lineno: usize) -> IoResult<PathwayRecord> {
    let fields = line
        .split_whitespace()
        .map(|tok| {
            tok.parse::<f64>()
                .map_err(|_| IoError::table(origin, lineno, format!("无法解析数值 '{tok}'")))
        })
        .collect::<IoResult<Vec<f64>>>()?;

    let needed = 7 + npthlev;
    if fields.len() < needed {
        return Err(IoError::table(
            origin,
            lineno,
            format!("需要 {} 列, 实际 {} 列", needed, fields.len()),
        ));
    }

    let coord = |v: f64| -> IoResult<usize> {
        if v >= 1.0 && v.fract() == 0.0 {
            Ok(v as usize)
        } else {
            Err(IoError::table(origin, lineno, format!("无效坐标 {v}")))
        }
    };

    Ok(PathwayRecord {
        upstream: (coord(fields[0])?, coord(fields[1])?),
        downstream: (coord(fields[2])?, coord(fields[3])?),
        distance: fields[4],
        elevation: fields[5],
        depth: fields[6],
        widths: fields[7..needed].to_vec(),
    })
}
