// ==========================================
// WiscAr 导入管道 - 领域类型定义
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 分析类型 (Analysis Kind)
// ==========================================
// 数据库中以原始名称存储（与报表行标签一致）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnalysisKind {
    HeatingStep,    // 逐级加热步骤（原始测量）
    AgePlateau,     // 坪年龄（解释值）
    TotalFusionAge, // 全熔年龄（解释值）
}

impl AnalysisKind {
    /// 数据库/报表中使用的名称
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::HeatingStep => "Heating step",
            AnalysisKind::AgePlateau => "Age Plateau",
            AnalysisKind::TotalFusionAge => "Total Fusion Age",
        }
    }

    /// 是否为解释/计算结果
    pub fn is_interpreted(&self) -> bool {
        !matches!(self, AnalysisKind::HeatingStep)
    }

    /// 融合年龄所用参数名（仅解释结果有效）
    pub fn age_parameter(&self) -> Option<&'static str> {
        match self {
            AnalysisKind::HeatingStep => None,
            AnalysisKind::AgePlateau => Some("plateau_age"),
            AnalysisKind::TotalFusionAge => Some("total_fusion_age"),
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 加热变量 (Heating Variable)
// ==========================================
// 整列判定: 全部 ≤ 100 视为激光功率，否则为温度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeatingVariable {
    LaserPower,  // 激光功率 (%)
    Temperature, // 温度 (°C)
}

impl HeatingVariable {
    pub fn parameter(&self) -> &'static str {
        match self {
            HeatingVariable::LaserPower => "power",
            HeatingVariable::Temperature => "Tstep",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            HeatingVariable::LaserPower => "%",
            HeatingVariable::Temperature => "°C",
        }
    }
}

impl fmt::Display for HeatingVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeatingVariable::LaserPower => write!(f, "LASER_POWER"),
            HeatingVariable::Temperature => write!(f, "TEMPERATURE"),
        }
    }
}

// ==========================================
// 地质单元类型 (Geological Unit Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeoUnitKind {
    Formation, // 组
    Member,    // 段
}

impl GeoUnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeoUnitKind::Formation => "formation",
            GeoUnitKind::Member => "member",
        }
    }
}

impl fmt::Display for GeoUnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 数据文件导入状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportStatus {
    Success,
    Failed,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Success => "SUCCESS",
            ImportStatus::Failed => "FAILED",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "SUCCESS" => ImportStatus::Success,
            _ => ImportStatus::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_kind_names() {
        assert_eq!(AnalysisKind::HeatingStep.as_str(), "Heating step");
        assert_eq!(AnalysisKind::AgePlateau.to_string(), "Age Plateau");
        assert!(!AnalysisKind::HeatingStep.is_interpreted());
        assert!(AnalysisKind::TotalFusionAge.is_interpreted());
        assert_eq!(
            AnalysisKind::TotalFusionAge.age_parameter(),
            Some("total_fusion_age")
        );
    }

    #[test]
    fn test_heating_variable_units() {
        assert_eq!(HeatingVariable::LaserPower.unit(), "%");
        assert_eq!(HeatingVariable::LaserPower.parameter(), "power");
        assert_eq!(HeatingVariable::Temperature.unit(), "°C");
        assert_eq!(HeatingVariable::Temperature.parameter(), "Tstep");
    }
}
