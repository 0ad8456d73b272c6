// crates/rf_io/src/model.rs

//! 按运行配置读取全部静态输入

use rf_config::RunConfig;
use rf_physics::network::{NetworkTopology, PathwayTable};
use rf_physics::topography::Topography;
use tracing::info;

use crate::bifurcation::read_pathway_table;
use crate::error::IoResult;
use crate::maps::{load_network, read_topography_maps};

/// 静态模型输入
#[derive(Debug, Clone)]
pub struct ModelInputs {
    /// 河网
    pub network: NetworkTopology,
    /// 派生地形
    pub topography: Topography,
    /// 分汊表（仅在开启分汊时读取）
    pub pathways: Option<PathwayTable>,
}

/// 读取河网、地形与分汊表
pub fn load_model(config: &RunConfig) -> IoResult<ModelInputs> {
    let network = load_network(config)?;
    let input = read_topography_maps(config, &network)?;
    let topography = Topography::build(input, config.grid.nlfp, config.features.floodplain)?;
    topography.check_network(&network)?;

    let pathways = match (&config.input.bifurcation, config.features.bifurcation) {
        (Some(path), true) => Some(read_pathway_table(path)?),
        _ => None,
    };

    info!(
        "模型输入: {}x{} 网格, {} 个单元 ({} 个河口), {} 层漫滩",
        network.nx(),
        network.ny(),
        network.nseq_all(),
        network.nseq_all() - network.nseq_riv(),
        config.grid.nlfp
    );
    Ok(ModelInputs {
        network,
        topography,
        pathways,
    })
}
