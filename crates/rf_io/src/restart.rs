// crates/rf_io/src/restart.rs

//! 重启文件
//!
//! # 文件格式（小端）
//!
//! | 字段 | 类型 |
//! |---|---|
//! | 魔数 `RFRS` | 4 字节 |
//! | 版本 | u32 |
//! | 模拟时间（Unix 秒） | i64 |
//! | 网格 NX, NY | u64 × 2 |
//! | 单元数 NSEQ | u64 |
//! | 分汊分层数 NPTHOUT×NPTHLEV | u64 |
//! | 是否含上一子步变量 | u8 |
//! | rivsto, fldsto | f64 × NX×NY |
//! | rivout_pre, fldout_pre, rivdph_pre, fldsto_pre | f64 × NX×NY（可选） |
//! | pthflw_pre | f64 × NPTHOUT×NPTHLEV（可选） |
//! | CRC32 | u32 |
//!
//! 单元变量按行优先二维图存放，河网外格点填缺测值；读入时按同一河网抽回序号。
//! 写入先落到临时文件再重命名。加载只恢复状态，不含河网与地形。

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime};
use rf_config::RestartConfig;
use rf_foundation::{RfError, RfResult};
use rf_physics::driver::RestartSink;
use rf_physics::network::NetworkTopology;
use rf_physics::state::{PreviousStep, RestartSnapshot};
use tracing::info;

use crate::error::{IoError, IoResult};

const RESTART_MAGIC: &[u8; 4] = b"RFRS";
const RESTART_VERSION: u32 = 2;
const HEADER_LEN: usize = 4 + 4 + 8 + 8 + 8 + 8 + 8 + 1;

/// 重启文件头
#[derive(Debug, Clone, PartialEq)]
pub struct RestartHeader {
    /// 格式版本
    pub version: u32,
    /// 快照时间
    pub time: NaiveDateTime,
    /// X 方向格点数
    pub nx: usize,
    /// Y 方向格点数
    pub ny: usize,
    /// 单元数
    pub nseq: usize,
    /// 分汊分层数
    pub npthflw: usize,
    /// 是否含上一子步变量
    pub has_previous: bool,
}

impl RestartHeader {
    /// 检查文件网格与河网一致
    pub fn check_network(&self, network: &NetworkTopology) -> RfResult<()> {
        if (self.nx, self.ny) != (network.nx(), network.ny()) {
            return Err(RfError::configuration(format!(
                "重启文件网格 {}x{} 与河网 {}x{} 不一致",
                self.nx,
                self.ny,
                network.nx(),
                network.ny()
            )));
        }
        if self.nseq != network.nseq_all() {
            return Err(RfError::configuration(format!(
                "重启文件单元数 {} 与河网 {} 不一致",
                self.nseq,
                network.nseq_all()
            )));
        }
        Ok(())
    }
}

// ============================================================================
// 写
// ============================================================================

/// 编码快照（不含 CRC）
fn encode(snapshot: &RestartSnapshot, network: &NetworkTopology, rmis: f64) -> IoResult<Vec<u8>> {
    let nseq = network.nseq_all();
    RfError::check_size("rivsto", nseq, snapshot.rivsto.len())?;
    RfError::check_size("fldsto", nseq, snapshot.fldsto.len())?;

    let npthflw = snapshot
        .previous
        .as_ref()
        .map_or(0, |p| p.pthflw_pre.len());
    let ngrid = network.nx() * network.ny();
    let arrays = if snapshot.previous.is_some() { 6 } else { 2 };
    let mut data = Vec::with_capacity(HEADER_LEN + (arrays * ngrid + npthflw) * 8 + 4);

    data.extend_from_slice(RESTART_MAGIC);
    data.extend_from_slice(&RESTART_VERSION.to_le_bytes());
    data.extend_from_slice(&snapshot.time.and_utc().timestamp().to_le_bytes());
    data.extend_from_slice(&(network.nx() as u64).to_le_bytes());
    data.extend_from_slice(&(network.ny() as u64).to_le_bytes());
    data.extend_from_slice(&(nseq as u64).to_le_bytes());
    data.extend_from_slice(&(npthflw as u64).to_le_bytes());
    data.push(snapshot.previous.is_some() as u8);

    let mut push_map = |name: &'static str, values: &[f64]| -> IoResult<()> {
        RfError::check_size(name, nseq, values.len())?;
        for v in network.scatter(values, rmis) {
            data.extend_from_slice(&v.to_le_bytes());
        }
        Ok(())
    };
    push_map("rivsto", &snapshot.rivsto)?;
    push_map("fldsto", &snapshot.fldsto)?;
    if let Some(prev) = &snapshot.previous {
        push_map("rivout_pre", &prev.rivout_pre)?;
        push_map("fldout_pre", &prev.fldout_pre)?;
        push_map("rivdph_pre", &prev.rivdph_pre)?;
        push_map("fldsto_pre", &prev.fldsto_pre)?;
        for v in &prev.pthflw_pre {
            data.extend_from_slice(&v.to_le_bytes());
        }
    }
    Ok(data)
}

/// 写出快照，单元变量按 `network` 展开为二维图
pub fn save_restart(
    path: &Path,
    snapshot: &RestartSnapshot,
    network: &NetworkTopology,
    rmis: f64,
) -> IoResult<()> {
    let data = encode(snapshot, network, rmis)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let temp_path = path.with_extension("bin.tmp");
    {
        let mut writer = BufWriter::new(File::create(&temp_path)?);
        writer.write_all(&data)?;
        writer.write_all(&compute_crc32(&data).to_le_bytes())?;
        writer.flush()?;
    }
    std::fs::rename(&temp_path, path)?;
    Ok(())
}

// ============================================================================
// 读
// ============================================================================

struct ByteReader<'a> {
    path: &'a Path,
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    fn take(&mut self, n: usize) -> IoResult<&'a [u8]> {
        let end = self.offset + n;
        if end > self.data.len() {
            return Err(IoError::checkpoint(self.path, "文件被截断"));
        }
        let bytes = &self.data[self.offset..end];
        self.offset = end;
        Ok(bytes)
    }

    fn word<const N: usize>(&mut self) -> IoResult<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    fn values(&mut self, n: usize) -> IoResult<Vec<f64>> {
        Ok(self
            .take(n * 8)?
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect())
    }

    /// 读一张二维图并按序号抽取
    fn map(&mut self, network: &NetworkTopology) -> IoResult<Vec<f64>> {
        let grid = self.values(network.nx() * network.ny())?;
        Ok(network.gather(&grid)?)
    }

    fn count(&mut self) -> IoResult<usize> {
        Ok(u64::from_le_bytes(self.word()?) as usize)
    }
}

fn parse_header(reader: &mut ByteReader<'_>) -> IoResult<RestartHeader> {
    let path = reader.path;
    if &reader.word::<4>()? != RESTART_MAGIC {
        return Err(IoError::checkpoint(path, "不是重启文件"));
    }
    let version = u32::from_le_bytes(reader.word()?);
    if version != RESTART_VERSION {
        return Err(IoError::checkpoint(
            path,
            format!("不支持的文件版本 {}（当前 {}）", version, RESTART_VERSION),
        ));
    }
    let seconds = i64::from_le_bytes(reader.word()?);
    let time = DateTime::from_timestamp(seconds, 0)
        .map(|t| t.naive_utc())
        .ok_or_else(|| IoError::checkpoint(path, format!("无效时间戳 {seconds}")))?;
    let nx = reader.count()?;
    let ny = reader.count()?;
    let nseq = reader.count()?;
    let npthflw = reader.count()?;
    let has_previous = reader.word::<1>()?[0] != 0;
    Ok(RestartHeader {
        version,
        time,
        nx,
        ny,
        nseq,
        npthflw,
        has_previous,
    })
}

/// 只读取文件头
pub fn read_restart_header(path: &Path) -> IoResult<RestartHeader> {
    let mut file = File::open(path).map_err(|e| IoError::checkpoint(path, e.to_string()))?;
    let mut data = vec![0u8; HEADER_LEN];
    file.read_exact(&mut data)
        .map_err(|_| IoError::checkpoint(path, "文件太小"))?;
    parse_header(&mut ByteReader {
        path,
        data: &data,
        offset: 0,
    })
}

/// 加载快照并校验网格、单元数与分汊分层数
///
/// 仅含蓄量的快照不检查分汊分层数。
pub fn load_restart(
    path: &Path,
    network: &NetworkTopology,
    npthflw: usize,
) -> IoResult<RestartSnapshot> {
    let mut file = File::open(path).map_err(|e| IoError::checkpoint(path, e.to_string()))?;
    let mut all = Vec::new();
    file.read_to_end(&mut all)?;
    if all.len() < HEADER_LEN + 4 {
        return Err(IoError::checkpoint(path, "文件太小"));
    }

    let (data, tail) = all.split_at(all.len() - 4);
    let stored = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
    let computed = compute_crc32(data);
    if stored != computed {
        return Err(IoError::Checksum {
            expected: stored,
            found: computed,
        });
    }

    let mut reader = ByteReader {
        path,
        data,
        offset: 0,
    };
    let header = parse_header(&mut reader)?;
    header
        .check_network(network)
        .map_err(|e| IoError::checkpoint(path, e.to_string()))?;
    if header.has_previous && header.npthflw != npthflw {
        return Err(IoError::checkpoint(
            path,
            format!("分汊分层数 {} 与当前 {} 不一致", header.npthflw, npthflw),
        ));
    }

    let rivsto = reader.map(network)?;
    let fldsto = reader.map(network)?;
    let previous = if header.has_previous {
        Some(PreviousStep {
            rivout_pre: reader.map(network)?,
            fldout_pre: reader.map(network)?,
            rivdph_pre: reader.map(network)?,
            fldsto_pre: reader.map(network)?,
            pthflw_pre: reader.values(header.npthflw)?,
        })
    } else {
        None
    };
    if reader.offset != data.len() {
        return Err(IoError::checkpoint(path, "文件末尾有多余数据"));
    }

    Ok(RestartSnapshot {
        time: header.time,
        rivsto,
        fldsto,
        previous,
    })
}

// ============================================================================
// CRC32
// ============================================================================

/// CRC32（IEEE 多项式）
pub fn compute_crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        let index = ((crc ^ byte as u32) & 0xFF) as usize;
        crc = CRC32_TABLE[index] ^ (crc >> 8);
    }
    !crc
}

const fn generate_crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = 0xEDB8_8320 ^ (crc >> 1);
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

const CRC32_TABLE: [u32; 256] = generate_crc32_table();

// ============================================================================
// 写出器
// ============================================================================

/// 按时间命名的重启文件写出器 `{dir}/{prefix}{YYYYMMDDHH}.bin`
#[derive(Debug)]
pub struct RestartWriter {
    directory: PathBuf,
    prefix: String,
    network: NetworkTopology,
    rmis: f64,
    written: Vec<PathBuf>,
}

impl RestartWriter {
    /// 由配置创建，`network` 决定二维图的展开方式
    pub fn new(config: &RestartConfig, network: &NetworkTopology, rmis: f64) -> IoResult<Self> {
        std::fs::create_dir_all(&config.directory)?;
        Ok(Self {
            directory: config.directory.clone(),
            prefix: config.prefix.clone(),
            network: network.clone(),
            rmis,
            written: Vec::new(),
        })
    }

    /// 某时刻的文件路径
    pub fn path_for(&self, time: NaiveDateTime) -> PathBuf {
        self.directory
            .join(format!("{}{}.bin", self.prefix, time.format("%Y%m%d%H")))
    }

    /// 已写出的文件
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl RestartSink for RestartWriter {
    fn write_restart(&mut self, snapshot: &RestartSnapshot) -> RfResult<()> {
        let path = self.path_for(snapshot.time);
        save_restart(&path, snapshot, &self.network, self.rmis)?;
        info!("重启文件: {}", path.display());
        self.written.push(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rf_physics::network::DownstreamMap;
    use tempfile::tempdir;

    const RMIS: f64 = 1.0e20;

    fn time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2001, 3, 1)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap()
    }

    /// 2x2 网格：(1,1) -> (2,1) -> (2,2) 河口，(1,2) 区域外
    fn network() -> NetworkTopology {
        let map = DownstreamMap::new(2, 2, vec![2, 2, -9999, -9], vec![1, 2, -9999, -9], -9999)
            .unwrap();
        NetworkTopology::build(&map).unwrap()
    }

    fn snapshot(with_previous: bool) -> RestartSnapshot {
        let previous = with_previous.then(|| PreviousStep {
            rivout_pre: vec![1.5, -0.5, 2.0],
            fldout_pre: vec![0.0, 0.1, 0.0],
            rivdph_pre: vec![2.0, 1.0, 0.5],
            fldsto_pre: vec![0.0, 10.0, 0.0],
            pthflw_pre: vec![0.25, -0.25],
        });
        RestartSnapshot {
            time: time(),
            rivsto: vec![1000.0, 2000.0, 500.0],
            fldsto: vec![0.0, 10.0, 0.0],
            previous,
        }
    }

    #[test]
    fn test_crc32_check_value() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_save_load_full() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("restart.bin");
        let network = network();
        save_restart(&path, &snapshot(true), &network, RMIS).unwrap();

        let loaded = load_restart(&path, &network, 2).unwrap();
        assert_eq!(loaded, snapshot(true));
        assert!(!path.with_extension("bin.tmp").exists());

        let header = read_restart_header(&path).unwrap();
        assert_eq!(header.time, time());
        assert_eq!((header.nx, header.ny, header.nseq), (2, 2, 3));
        assert!(header.has_previous);
        assert_eq!(header.npthflw, 2);
    }

    #[test]
    fn test_cell_arrays_stored_as_grid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("restart.bin");
        let network = network();
        let snapshot = snapshot(false);
        save_restart(&path, &snapshot, &network, RMIS).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), HEADER_LEN + 2 * 4 * 8 + 4);
        let grid: Vec<f64> = bytes[HEADER_LEN..HEADER_LEN + 4 * 8]
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(grid, network.scatter(&snapshot.rivsto, RMIS));
        // (1,2) 区域外
        assert_eq!(grid[2], RMIS);
    }

    #[test]
    fn test_store_only_ignores_pathway_count() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("restart.bin");
        let network = network();
        save_restart(&path, &snapshot(false), &network, RMIS).unwrap();
        let loaded = load_restart(&path, &network, 8).unwrap();
        assert!(loaded.previous.is_none());
        assert_eq!(loaded.rivsto, vec![1000.0, 2000.0, 500.0]);
    }

    #[test]
    fn test_count_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("restart.bin");
        save_restart(&path, &snapshot(true), &network(), RMIS).unwrap();

        let other = NetworkTopology::from_sequence(vec![Some(1), Some(2), None]).unwrap();
        assert!(matches!(
            load_restart(&path, &other, 2),
            Err(IoError::Checkpoint { .. })
        ));
        assert!(load_restart(&path, &network(), 3).is_err());
    }

    #[test]
    fn test_snapshot_size_must_match_network() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("restart.bin");
        let other = NetworkTopology::from_sequence(vec![Some(1), None]).unwrap();
        assert!(save_restart(&path, &snapshot(false), &other, RMIS).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_corruption_detected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("restart.bin");
        let network = network();
        save_restart(&path, &snapshot(true), &network, RMIS).unwrap();
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[HEADER_LEN + 3] ^= 0xFF;
        std::fs::write(&path, bytes).unwrap();
        assert!(matches!(
            load_restart(&path, &network, 2),
            Err(IoError::Checksum { .. })
        ));
    }

    #[test]
    fn test_writer_names_by_time() {
        let dir = tempdir().unwrap();
        let config = RestartConfig {
            directory: dir.path().to_path_buf(),
            prefix: "restart".into(),
            ..Default::default()
        };
        let mut writer = RestartWriter::new(&config, &network(), RMIS).unwrap();
        writer.write_restart(&snapshot(false)).unwrap();
        let expected = dir.path().join("restart2001030106.bin");
        assert_eq!(writer.written(), &[expected.clone()]);
        assert!(expected.is_file());
    }
}
