// apps/rf_cli/src/commands/run.rs

//! 运行模拟命令
//!
//! 读取配置与全部输入，按需从重启文件恢复，然后逐外层步推进到结束时间。

use anyhow::{Context, Result};
use clap::Args;
use rf_config::RunConfig;
use rf_io::{load_model, load_restart, BinaryOutputWriter, BinaryRunoffSource, RestartWriter};
use rf_physics::driver::{EventDispatcher, LoggingListener, NullOutput, OutputSink, Simulation};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// 运行模拟参数
#[derive(Args)]
pub struct RunArgs {
    /// 配置文件路径
    #[arg(short, long)]
    pub config: PathBuf,

    /// 覆盖输出目录
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 逐子步记录水量平衡
    #[arg(long)]
    pub balance: bool,

    /// 不写诊断输出
    #[arg(long)]
    pub no_output: bool,
}

/// 执行运行命令
pub fn execute(args: RunArgs) -> Result<()> {
    info!("=== RivFlood 模拟启动 ===");

    let mut config = RunConfig::from_file(&args.config)
        .with_context(|| format!("无法加载配置 {}", args.config.display()))?;
    if let Some(dir) = args.output {
        config.output.directory = dir;
    }
    if args.no_output {
        config.output.enabled = false;
    }
    for warning in config.warnings() {
        warn!("{}", warning);
    }

    let inputs = load_model(&config).context("读取模型输入失败")?;
    let mut source =
        BinaryRunoffSource::from_config(&config, &inputs.network).context("读取插值矩阵失败")?;

    let events = Arc::new(EventDispatcher::new());
    let listener = if args.balance {
        LoggingListener::new().verbose()
    } else {
        LoggingListener::new()
    };
    events.add_listener(Arc::new(listener));

    let mut sim = Simulation::new(config.clone(), inputs.network, inputs.topography)
        .context("初始化模拟失败")?
        .with_events(events);
    if let Some(table) = &inputs.pathways {
        sim = sim.with_pathways(table);
    }

    if config.restart.enabled {
        let path = config
            .restart
            .input_file
            .as_ref()
            .context("restart.enabled 需要 restart.input_file")?;
        let npthflw = sim.pathways().len() * sim.pathways().npthlev;
        let snapshot = load_restart(path, sim.network(), npthflw)
            .with_context(|| format!("无法读取重启文件 {}", path.display()))?;
        sim.restore(&snapshot).context("恢复重启状态失败")?;
        info!("从重启文件启动: {} ({})", path.display(), snapshot.time);
    }

    let mut binary_output;
    let mut null_output = NullOutput;
    let output: &mut dyn OutputSink = if config.output.enabled {
        binary_output = BinaryOutputWriter::new(&config.output, config.grid.rmis)
            .context("创建输出目录失败")?;
        &mut binary_output
    } else {
        &mut null_output
    };
    let mut restart = RestartWriter::new(&config.restart, sim.network(), config.grid.rmis)
        .context("创建重启目录失败")?;

    let timer = Instant::now();
    let summary = match sim.run(&mut source, output, &mut restart) {
        Ok(summary) => summary,
        Err(e) if e.is_startup_error() => {
            error!("启动检查未通过，未推进任何外层步");
            return Err(e).context("模拟失败");
        }
        Err(e) => {
            error!("模拟中止于第 {} 步 ({})", sim.time().kstep(), sim.time().current());
            return Err(e).context("模拟失败");
        }
    };
    let elapsed = timer.elapsed().as_secs_f64();

    info!("=== 模拟完成 ===");
    info!(
        "外层步: {}, 子步: {}, 结束时刻: {}",
        summary.steps, summary.substeps, summary.end_time
    );
    info!("输出帧: {}, 重启文件: {}", summary.outputs, summary.restarts);
    info!(
        "用时: {:.2} s ({:.1} 步/s)",
        elapsed,
        summary.steps as f64 / elapsed.max(1e-9)
    );
    Ok(())
}
