// crates/rf_io/src/lib.rs

//! RivFlood IO 模块
//!
//! 为物理核心提供文件读写，核心本身不做 IO。
//!
//! # 模块
//!
//! - [`maps`]: 二进制地图读取（河网指向、地形参数、漫滩剖面）
//! - [`bifurcation`]: 分汊通道参数表
//! - [`forcing`]: 逐日二进制径流与插值矩阵
//! - [`output`]: 逐变量二进制诊断输出
//! - [`restart`]: 重启文件读写（二维图存放，CRC32 校验）
//! - [`model`]: 按配置读取全部静态输入
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use rf_io::{load_model, BinaryOutputWriter, BinaryRunoffSource, RestartWriter};
//! use rf_physics::Simulation;
//!
//! let inputs = load_model(&config)?;
//! let mut source = BinaryRunoffSource::from_config(&config, &inputs.network)?;
//! let mut output = BinaryOutputWriter::new(&config.output, config.grid.rmis)?;
//! let mut restart = RestartWriter::new(&config.restart, &inputs.network, config.grid.rmis)?;
//! let mut sim = Simulation::new(config, inputs.network, inputs.topography)?;
//! sim.run(&mut source, &mut output, &mut restart)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bifurcation;
pub mod error;
pub mod forcing;
pub mod maps;
pub mod model;
pub mod output;
pub mod restart;

// 重导出常用类型
pub use bifurcation::{parse_pathway_table, read_pathway_table};
pub use error::{IoError, IoResult};
pub use forcing::{read_input_matrix, BinaryRunoffSource};
pub use maps::{load_network, read_downstream_map, read_topography_maps};
pub use model::{load_model, ModelInputs};
pub use output::{BinaryOutputWriter, OutputVariable};
pub use restart::{load_restart, read_restart_header, save_restart, RestartHeader, RestartWriter};
