// crates/rf_io/src/maps.rs

//! 二进制地图读取
//!
//! 地图为无文件头的小端 4 字节行优先网格，每条记录 `NX×NY` 个值，
//! 多条记录首尾相接：
//!
//! - `nextxy`: 两条 int32 记录（下游 X、下游 Y，坐标从 1 开始）
//! - 地形参数: 一条 float32 记录
//! - `fldhgt`: `NLFP` 条 float32 记录，自下而上
//!
//! 网格值经 [`NetworkTopology::gather`] 抽取为序号数组。

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use rf_config::{GridConfig, RunConfig};
use rf_physics::network::{DownstreamMap, NetworkTopology};
use rf_physics::topography::TopographyInput;
use tracing::debug;

use crate::error::{IoError, IoResult};

const WORD: usize = 4;

// ============================================================================
// 记录级读写
// ============================================================================

fn read_words(path: &Path, nx: usize, ny: usize, nrec: usize) -> IoResult<Vec<[u8; WORD]>> {
    let mut file = File::open(path).map_err(|e| IoError::map(path, format!("无法打开: {e}")))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;

    let expected = nx * ny * nrec * WORD;
    if bytes.len() != expected {
        return Err(IoError::map(
            path,
            format!(
                "文件大小 {} 字节, 期望 {} 条 {}x{} 记录共 {} 字节",
                bytes.len(),
                nrec,
                nx,
                ny,
                expected
            ),
        ));
    }
    Ok(bytes
        .chunks_exact(WORD)
        .map(|c| [c[0], c[1], c[2], c[3]])
        .collect())
}

fn split_records<T>(values: Vec<T>, record_len: usize) -> Vec<Vec<T>> {
    let mut records = Vec::new();
    let mut iter = values.into_iter();
    loop {
        let record: Vec<T> = iter.by_ref().take(record_len).collect();
        if record.is_empty() {
            break;
        }
        records.push(record);
    }
    records
}

/// 读取 `nrec` 条 float32 记录
pub fn read_f32_records(path: &Path, nx: usize, ny: usize, nrec: usize) -> IoResult<Vec<Vec<f32>>> {
    let values = read_words(path, nx, ny, nrec)?
        .into_iter()
        .map(f32::from_le_bytes)
        .collect();
    Ok(split_records(values, nx * ny))
}

/// 读取 `nrec` 条 int32 记录
pub fn read_i32_records(path: &Path, nx: usize, ny: usize, nrec: usize) -> IoResult<Vec<Vec<i32>>> {
    let values = read_words(path, nx, ny, nrec)?
        .into_iter()
        .map(i32::from_le_bytes)
        .collect();
    Ok(split_records(values, nx * ny))
}

/// 读取单条 float32 记录并转为 f64
pub fn read_f64_grid(path: &Path, nx: usize, ny: usize) -> IoResult<Vec<f64>> {
    let mut records = read_f32_records(path, nx, ny, 1)?;
    Ok(records
        .pop()
        .unwrap_or_default()
        .into_iter()
        .map(f64::from)
        .collect())
}

/// 写出 float32 记录（`append` 为真时追加到文件末尾）
pub fn write_f32_records(path: &Path, records: &[&[f32]], append: bool) -> IoResult<()> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)?;
    let mut writer = BufWriter::new(file);
    for record in records {
        for v in record.iter() {
            writer.write_all(&v.to_le_bytes())?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// 写出 int32 记录
pub fn write_i32_records(path: &Path, records: &[&[i32]]) -> IoResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for record in records {
        for v in record.iter() {
            writer.write_all(&v.to_le_bytes())?;
        }
    }
    writer.flush()?;
    Ok(())
}

// ============================================================================
// 河网与地形
// ============================================================================

/// 读取下游指向图
pub fn read_downstream_map(path: &Path, grid: &GridConfig) -> IoResult<DownstreamMap> {
    let mut records = read_i32_records(path, grid.nx, grid.ny, 2)?.into_iter();
    let (next_x, next_y) = match (records.next(), records.next()) {
        (Some(x), Some(y)) => (x, y),
        _ => return Err(IoError::map(path, "缺少 nextx/nexty 记录")),
    };
    Ok(DownstreamMap::new(grid.nx, grid.ny, next_x, next_y, grid.imis)?)
}

/// 读取下游指向图并构建河网
pub fn load_network(config: &RunConfig) -> IoResult<NetworkTopology> {
    let map = read_downstream_map(&config.input.nextxy, &config.grid)?;
    let network = NetworkTopology::build(&map)?;
    debug!(
        "河网: {} 个单元, {} 个河口",
        network.nseq_all(),
        network.nseq_all() - network.nseq_riv()
    );
    Ok(network)
}

fn gather_map(path: &Path, grid: &GridConfig, network: &NetworkTopology) -> IoResult<Vec<f64>> {
    let values = read_f64_grid(path, grid.nx, grid.ny)?;
    Ok(network.gather(&values)?)
}

/// 读取全部地形地图并按序号排列
///
/// 缺少 `rivman` 时使用 `pmanriv`；平均海平面仅在特性开启时读取。
pub fn read_topography_maps(
    config: &RunConfig,
    network: &NetworkTopology,
) -> IoResult<TopographyInput> {
    let grid = &config.grid;
    let input = &config.input;
    let n = network.nseq_all();

    let rivman = match &input.rivman {
        Some(path) => gather_map(path, grid, network)?,
        None => vec![config.physics.pmanriv; n],
    };

    let layers = read_f32_records(&input.fldhgt, grid.nx, grid.ny, grid.nlfp)?
        .into_iter()
        .map(|record| network.gather(&record))
        .collect::<Result<Vec<_>, _>>()?;
    let mut fldhgt = Vec::with_capacity(n * grid.nlfp);
    for i in 0..n {
        for layer in &layers {
            fldhgt.push(f64::from(layer[i]));
        }
    }

    let mean_sea_level = match (&input.mean_sea_level, config.features.mean_sea_level) {
        (Some(path), true) => Some(gather_map(path, grid, network)?),
        _ => None,
    };

    Ok(TopographyInput {
        grarea: gather_map(&input.grarea, grid, network)?,
        elevtn: gather_map(&input.elevtn, grid, network)?,
        nxtdst: gather_map(&input.nxtdst, grid, network)?,
        rivlen: gather_map(&input.rivlen, grid, network)?,
        rivwth: gather_map(&input.rivwth, grid, network)?,
        rivhgt: gather_map(&input.rivhgt, grid, network)?,
        rivman,
        fldhgt,
        mean_sea_level,
    })
}
