// crates/rf_config/src/features.rs

//! 可选物理特性开关
//!
//! 每个可选特性由 [`FeatureToggle`] 标识。未实现的特性被启用时，
//! [`FeatureFlags::resolve`] 返回 [`FeatureStatus::NotImplemented`]，
//! 调用方据此发出事件或直接失败，而不是静默跳过。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 可选特性标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureToggle {
    /// 自适应子步长
    AdaptiveStep,
    /// 漫滩储量
    Floodplain,
    /// 漫滩流量
    FloodplainOutflow,
    /// 分汊通道
    Bifurcation,
    /// 河口平均海平面
    MeanSeaLevel,
    /// 地表/地下径流分离
    RunoffSplit,
    /// 运动波模式
    Kinematic,
    /// 水库调度
    Dam,
    /// 堤防
    Levee,
    /// 泥沙输运
    Sediment,
    /// 示踪剂
    Tracer,
    /// 地下水延迟
    GroundwaterDelay,
    /// 水面蒸发
    WaterEvaporation,
    /// 混合坡度
    SlopeMix,
    /// 河口指定坡度
    SlopeMouth,
    /// 动态海平面
    DynamicSeaLevel,
    /// 瞬时值输出
    InstantOutput,
}

impl FeatureToggle {
    /// 全部特性
    pub const ALL: [FeatureToggle; 17] = [
        Self::AdaptiveStep,
        Self::Floodplain,
        Self::FloodplainOutflow,
        Self::Bifurcation,
        Self::MeanSeaLevel,
        Self::RunoffSplit,
        Self::Kinematic,
        Self::Dam,
        Self::Levee,
        Self::Sediment,
        Self::Tracer,
        Self::GroundwaterDelay,
        Self::WaterEvaporation,
        Self::SlopeMix,
        Self::SlopeMouth,
        Self::DynamicSeaLevel,
        Self::InstantOutput,
    ];

    /// 该特性是否有实现
    pub fn is_implemented(self) -> bool {
        matches!(
            self,
            Self::AdaptiveStep
                | Self::Floodplain
                | Self::FloodplainOutflow
                | Self::Bifurcation
                | Self::MeanSeaLevel
                | Self::RunoffSplit
        )
    }

    /// 配置键名
    pub fn key(self) -> &'static str {
        match self {
            Self::AdaptiveStep => "adaptive_step",
            Self::Floodplain => "floodplain",
            Self::FloodplainOutflow => "floodplain_outflow",
            Self::Bifurcation => "bifurcation",
            Self::MeanSeaLevel => "mean_sea_level",
            Self::RunoffSplit => "runoff_split",
            Self::Kinematic => "kinematic",
            Self::Dam => "dam",
            Self::Levee => "levee",
            Self::Sediment => "sediment",
            Self::Tracer => "tracer",
            Self::GroundwaterDelay => "groundwater_delay",
            Self::WaterEvaporation => "water_evaporation",
            Self::SlopeMix => "slope_mix",
            Self::SlopeMouth => "slope_mouth",
            Self::DynamicSeaLevel => "dynamic_sea_level",
            Self::InstantOutput => "instant_output",
        }
    }
}

impl fmt::Display for FeatureToggle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// 特性解析结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureStatus {
    /// 未启用
    Disabled,
    /// 已启用且参与计算
    Active,
    /// 已启用但没有实现，计算中不起作用
    NotImplemented,
}

/// 特性开关表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureFlags {
    /// 自适应子步长 (LADPSTP)
    #[serde(default = "default_true")]
    pub adaptive_step: bool,
    /// 漫滩储量 (LFPLAIN)
    #[serde(default = "default_true")]
    pub floodplain: bool,
    /// 漫滩流量 (LFLDOUT)
    #[serde(default = "default_true")]
    pub floodplain_outflow: bool,
    /// 分汊通道 (LPTHOUT)
    #[serde(default)]
    pub bifurcation: bool,
    /// 河口平均海平面 (LMEANSL)
    #[serde(default)]
    pub mean_sea_level: bool,
    /// 地表/地下径流分离 (LROSPLIT)
    #[serde(default)]
    pub runoff_split: bool,
    /// 运动波模式 (LKINE)
    #[serde(default)]
    pub kinematic: bool,
    /// 水库调度 (LDAMOUT)
    #[serde(default)]
    pub dam: bool,
    /// 堤防 (LLEVEE)
    #[serde(default)]
    pub levee: bool,
    /// 泥沙输运 (LSEDOUT)
    #[serde(default)]
    pub sediment: bool,
    /// 示踪剂 (LTRACE)
    #[serde(default)]
    pub tracer: bool,
    /// 地下水延迟 (LGDWDLY)
    #[serde(default)]
    pub groundwater_delay: bool,
    /// 水面蒸发 (LWEVAP)
    #[serde(default)]
    pub water_evaporation: bool,
    /// 混合坡度 (LSLPMIX)
    #[serde(default)]
    pub slope_mix: bool,
    /// 河口指定坡度 (LSLOPEMOUTH)
    #[serde(default)]
    pub slope_mouth: bool,
    /// 动态海平面 (LSEALEV)
    #[serde(default)]
    pub dynamic_sea_level: bool,
    /// 瞬时值输出 (LOUTINS)
    #[serde(default)]
    pub instant_output: bool,
    /// 启用未实现特性时直接失败
    #[serde(default)]
    pub strict: bool,
}

fn default_true() -> bool {
    true
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            adaptive_step: true,
            floodplain: true,
            floodplain_outflow: true,
            bifurcation: false,
            mean_sea_level: false,
            runoff_split: false,
            kinematic: false,
            dam: false,
            levee: false,
            sediment: false,
            tracer: false,
            groundwater_delay: false,
            water_evaporation: false,
            slope_mix: false,
            slope_mouth: false,
            dynamic_sea_level: false,
            instant_output: false,
            strict: false,
        }
    }
}

impl FeatureFlags {
    /// 查询开关原始值
    pub fn is_enabled(&self, toggle: FeatureToggle) -> bool {
        match toggle {
            FeatureToggle::AdaptiveStep => self.adaptive_step,
            FeatureToggle::Floodplain => self.floodplain,
            FeatureToggle::FloodplainOutflow => self.floodplain_outflow,
            FeatureToggle::Bifurcation => self.bifurcation,
            FeatureToggle::MeanSeaLevel => self.mean_sea_level,
            FeatureToggle::RunoffSplit => self.runoff_split,
            FeatureToggle::Kinematic => self.kinematic,
            FeatureToggle::Dam => self.dam,
            FeatureToggle::Levee => self.levee,
            FeatureToggle::Sediment => self.sediment,
            FeatureToggle::Tracer => self.tracer,
            FeatureToggle::GroundwaterDelay => self.groundwater_delay,
            FeatureToggle::WaterEvaporation => self.water_evaporation,
            FeatureToggle::SlopeMix => self.slope_mix,
            FeatureToggle::SlopeMouth => self.slope_mouth,
            FeatureToggle::DynamicSeaLevel => self.dynamic_sea_level,
            FeatureToggle::InstantOutput => self.instant_output,
        }
    }

    /// 解析特性状态
    pub fn resolve(&self, toggle: FeatureToggle) -> FeatureStatus {
        if !self.is_enabled(toggle) {
            FeatureStatus::Disabled
        } else if toggle.is_implemented() {
            FeatureStatus::Active
        } else {
            FeatureStatus::NotImplemented
        }
    }

    /// 已启用但未实现的特性列表
    pub fn unimplemented_enabled(&self) -> Vec<FeatureToggle> {
        FeatureToggle::ALL
            .iter()
            .copied()
            .filter(|&t| self.resolve(t) == FeatureStatus::NotImplemented)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_flags_all_implemented() {
        let flags = FeatureFlags::default();
        assert!(flags.unimplemented_enabled().is_empty());
        assert_eq!(flags.resolve(FeatureToggle::Floodplain), FeatureStatus::Active);
        assert_eq!(flags.resolve(FeatureToggle::Bifurcation), FeatureStatus::Disabled);
    }

    #[test]
    fn test_not_implemented_reported() {
        let flags = FeatureFlags {
            dam: true,
            levee: true,
            ..Default::default()
        };
        assert_eq!(flags.resolve(FeatureToggle::Dam), FeatureStatus::NotImplemented);
        assert_eq!(
            flags.unimplemented_enabled(),
            vec![FeatureToggle::Dam, FeatureToggle::Levee]
        );
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let flags: FeatureFlags = serde_json::from_str(r#"{"bifurcation": true}"#).unwrap();
        assert!(flags.bifurcation);
        assert!(flags.adaptive_step);
        assert!(!flags.kinematic);
    }
}
