// apps/rf_cli/src/commands/validate.rs

//! 配置验证命令
//!
//! 依次检查配置文件、静态输入、强迫数据与重启文件，不推进模拟。

use anyhow::{bail, Context, Result};
use clap::Args;
use rf_config::RunConfig;
use rf_io::{load_model, read_restart_header, BinaryRunoffSource, ModelInputs};
use rf_physics::forcing::RunoffSource;
use rf_physics::network::PathwaySet;
use std::path::{Path, PathBuf};
use tracing::info;

/// 验证参数
#[derive(Args)]
pub struct ValidateArgs {
    /// 配置文件路径
    #[arg(short, long)]
    pub config: PathBuf,

    /// 只检查配置文件本身
    #[arg(long)]
    pub config_only: bool,

    /// 严格模式（警告也视为错误）
    #[arg(long)]
    pub strict: bool,
}

/// 验证结果
#[derive(Default)]
struct ValidationResult {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationResult {
    fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn is_ok_strict(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

/// 执行验证命令
pub fn execute(args: ValidateArgs) -> Result<()> {
    info!("=== RivFlood 配置验证 ===");

    let mut result = ValidationResult::default();
    if let Some(config) = validate_config(&args.config, &mut result)? {
        if !args.config_only && result.is_ok() {
            if let Some(inputs) = validate_inputs(&config, &mut result) {
                validate_forcing(&config, &inputs, &mut result);
                validate_restart(&config, &inputs, &mut result);
            }
        }
    }

    print_validation_result(&result, args.strict)
}

fn validate_config(path: &Path, result: &mut ValidationResult) -> Result<Option<RunConfig>> {
    println!("\n检查配置文件: {}", path.display());

    if !path.exists() {
        result.add_error(format!("配置文件不存在: {}", path.display()));
        return Ok(None);
    }

    let content = std::fs::read_to_string(path).context("无法读取配置文件")?;
    let config: RunConfig = match serde_json::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            result.add_error(format!("JSON 解析错误: {}", e));
            return Ok(None);
        }
    };

    if let Err(e) = config.validate() {
        result.add_error(e.to_string());
        return Ok(None);
    }
    for warning in config.warnings() {
        result.add_warning(warning);
    }
    for feature in config.features.unimplemented_enabled() {
        let msg = format!("特性 {} 已开启但未实现", feature);
        if config.features.strict {
            result.add_error(msg);
        } else {
            result.add_warning(format!("{}，运行时将跳过", msg));
        }
    }

    println!("  ✓ 配置文件有效");
    Ok(Some(config))
}

fn validate_inputs(config: &RunConfig, result: &mut ValidationResult) -> Option<ModelInputs> {
    println!("\n检查静态输入");

    let inputs = match load_model(config) {
        Ok(inputs) => inputs,
        Err(e) => {
            result.add_error(format!("读取模型输入失败: {}", e));
            return None;
        }
    };
    let network = &inputs.network;
    println!(
        "  ✓ 河网 {}x{}: {} 个单元, {} 个河口",
        network.nx(),
        network.ny(),
        network.nseq_all(),
        network.nseq_all() - network.nseq_riv()
    );

    if let Some(table) = &inputs.pathways {
        let (set, excluded) = PathwaySet::from_table(
            table,
            network,
            config.physics.pmanriv,
            config.physics.pmanfld,
        );
        println!("  ✓ 分汊通道 {} 条, {} 层", set.len(), set.npthlev);
        if excluded > 0 {
            result.add_warning(format!("{} 条分汊通道端点不在河网内，已剔除", excluded));
        }
    }
    Some(inputs)
}

fn validate_forcing(config: &RunConfig, inputs: &ModelInputs, result: &mut ValidationResult) {
    println!("\n检查径流强迫");

    let source = match BinaryRunoffSource::from_config(config, &inputs.network) {
        Ok(source) => source,
        Err(e) => {
            result.add_error(format!("径流强迫设置无效: {}", e));
            return;
        }
    };
    match source.check_availability(config.time.start, config.time.end) {
        Ok(()) => println!(
            "  ✓ {} 至 {} 的径流文件齐全",
            config.time.start, config.time.end
        ),
        Err(e) => result.add_error(e.to_string()),
    }
}

fn validate_restart(config: &RunConfig, inputs: &ModelInputs, result: &mut ValidationResult) {
    if !config.restart.enabled {
        return;
    }
    let Some(path) = &config.restart.input_file else {
        return;
    };
    println!("\n检查重启文件: {}", path.display());

    match read_restart_header(path) {
        Ok(header) => {
            if let Err(e) = header.check_network(&inputs.network) {
                result.add_error(e.to_string());
            }
            if header.time != config.time.start {
                result.add_warning(format!(
                    "重启文件时间 {} 与起始时间 {} 不同",
                    header.time, config.time.start
                ));
            }
            println!("  ✓ 版本 {}, 时间 {}", header.version, header.time);
        }
        Err(e) => result.add_error(e.to_string()),
    }
}

fn print_validation_result(result: &ValidationResult, strict: bool) -> Result<()> {
    println!("\n=== 验证结果 ===");

    for warning in &result.warnings {
        println!("  ⚠ {}", warning);
    }
    for error in &result.errors {
        println!("  ✗ {}", error);
    }

    let passed = if strict {
        result.is_ok_strict()
    } else {
        result.is_ok()
    };
    if passed {
        println!(
            "验证通过 ({} 个警告)",
            result.warnings.len()
        );
        Ok(())
    } else {
        bail!(
            "验证失败: {} 个错误, {} 个警告",
            result.errors.len(),
            result.warnings.len()
        )
    }
}
