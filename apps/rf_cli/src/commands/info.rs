// apps/rf_cli/src/commands/info.rs

//! 信息显示命令
//!
//! 显示默认配置、特性开关、输出变量与重启文件头。

use anyhow::{Context, Result};
use clap::Args;
use rf_config::{FeatureStatus, FeatureToggle, RunConfig};
use rf_io::{read_restart_header, OutputVariable};
use std::path::PathBuf;
use tracing::info;

/// 信息显示参数
#[derive(Args)]
pub struct InfoArgs {
    /// 配置文件路径（显示其特性状态）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 显示默认配置
    #[arg(long)]
    pub defaults: bool,

    /// 显示可输出变量
    #[arg(long)]
    pub variables: bool,

    /// 显示重启文件头
    #[arg(long)]
    pub restart: Option<PathBuf>,
}

/// 执行信息命令
pub fn execute(args: InfoArgs) -> Result<()> {
    info!("=== RivFlood 信息 ===");

    let nothing_selected =
        args.config.is_none() && !args.defaults && !args.variables && args.restart.is_none();

    if nothing_selected {
        println!("RivFlood CLI 版本: {}", env!("CARGO_PKG_VERSION"));
        println!("可用线程: {}", available_threads());
        println!();
        print_features(&RunConfig::default());
        println!();
        print_variables();
        return Ok(());
    }

    if args.defaults {
        print_default_config()?;
    }
    if let Some(path) = &args.config {
        let config = RunConfig::from_file(path)
            .with_context(|| format!("无法加载配置 {}", path.display()))?;
        print_features(&config);
    }
    if args.variables {
        print_variables();
    }
    if let Some(path) = &args.restart {
        let header = read_restart_header(path)
            .with_context(|| format!("无法读取重启文件 {}", path.display()))?;
        println!("=== 重启文件 {} ===", path.display());
        println!("版本: {}", header.version);
        println!("时间: {}", header.time);
        println!("网格: {}x{}", header.nx, header.ny);
        println!("单元数: {}", header.nseq);
        println!("分汊分层数: {}", header.npthflw);
        println!(
            "内容: {}",
            if header.has_previous {
                "蓄量 + 上一子步变量"
            } else {
                "仅蓄量"
            }
        );
    }
    Ok(())
}

fn available_threads() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

fn print_default_config() -> Result<()> {
    println!("=== 默认配置 ===");
    let json = serde_json::to_string_pretty(&RunConfig::default())?;
    println!("{}", json);
    Ok(())
}

fn print_features(config: &RunConfig) {
    println!("=== 特性开关 ===");
    for toggle in FeatureToggle::ALL {
        let status = match config.features.resolve(toggle) {
            FeatureStatus::Disabled => "关闭",
            FeatureStatus::Active => "开启",
            FeatureStatus::NotImplemented => "开启 (未实现, 跳过)",
        };
        let implemented = if toggle.is_implemented() { "" } else { " *" };
        println!("  {:<20} {}{}", toggle.key(), status, implemented);
    }
    println!("  (* 表示尚未实现)");
}

fn print_variables() {
    println!("=== 输出变量 ===");
    for var in OutputVariable::ALL {
        println!("  {:<8} {:<8} {}", var.name(), var.unit(), var.long_name());
    }
}
