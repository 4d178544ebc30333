// ==========================================
// WiscAr 导入管道 - 参数目录
// ==========================================
// 职责: 固定词表（参数/单位/误差度量），由迁移步骤一次性写入
// ==========================================

/// 仪器名称（WiscAr MAP 质谱仪）
pub const INSTRUMENT_NAME: &str = "MAP 215-50";

/// 方法名前缀（拼接 Type 字段）
pub const METHOD_PREFIX: &str = "Ar/Ar ";

/// 参数定义
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterDef {
    pub name: &'static str,
    pub description: &'static str,
    pub unit: &'static str,
}

/// 已知参数目录（14 项 Ar 同位素/年龄参数）
pub const PARAMETER_CATALOG: [ParameterDef; 14] = [
    ParameterDef { name: "Tstep", description: "Temperature of heating step", unit: "°C" },
    ParameterDef { name: "power", description: "Laser power of heating step", unit: "%" },
    ParameterDef { name: "36Ar(a)", description: "Atmospheric 36Ar", unit: "fA" },
    ParameterDef { name: "37Ar(ca)", description: "Calcium-derived 37Ar", unit: "fA" },
    ParameterDef { name: "38Ar(cl)", description: "Chlorine-derived 38Ar", unit: "fA" },
    ParameterDef { name: "39Ar(k)", description: "Potassium-derived 39Ar", unit: "fA" },
    ParameterDef { name: "40Ar(r)", description: "Radiogenic 40Ar", unit: "fA" },
    ParameterDef { name: "%40Ar(r)", description: "Fraction of 40Ar that is radiogenic", unit: "%" },
    ParameterDef { name: "%39Ar(k)", description: "Fraction of total 39Ar(k) released in step", unit: "%" },
    ParameterDef { name: "Age", description: "Apparent age of heating step", unit: "Ma" },
    ParameterDef { name: "K/Ca", description: "K/Ca ratio", unit: "dimensionless" },
    ParameterDef { name: "40Ar(r)/39Ar(k)", description: "Ratio of radiogenic 40Ar to K-derived 39Ar", unit: "dimensionless" },
    ParameterDef { name: "plateau_age", description: "Age plateau", unit: "Ma" },
    ParameterDef { name: "total_fusion_age", description: "Total fusion age", unit: "Ma" },
];

/// 单位词表
pub const UNITS: [&str; 6] = ["°C", "%", "fA", "Ma", "dimensionless", "ka"];

/// 误差度量词表 (名称, 描述)
pub const ERROR_METRICS: [(&str, &str); 2] = [
    ("1s", "1 standard deviation"),
    ("2s", "2 standard deviations"),
];

/// 逐级加热中固定写入的 7 个同位素/百分比参数
pub const HEATING_STEP_PARAMETERS: [&str; 7] = [
    "36Ar(a)", "37Ar(ca)", "38Ar(cl)", "39Ar(k)", "40Ar(r)", "%40Ar(r)", "%39Ar(k)",
];

/// 查找参数定义
pub fn find_parameter(name: &str) -> Option<&'static ParameterDef> {
    PARAMETER_CATALOG.iter().find(|p| p.name == name)
}

/// 参数默认单位（未知参数返回 None）
pub fn unit_for(name: &str) -> Option<&'static str> {
    find_parameter(name).map(|p| p.unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_names_unique() {
        let names: HashSet<_> = PARAMETER_CATALOG.iter().map(|p| p.name).collect();
        assert_eq!(names.len(), PARAMETER_CATALOG.len());
    }

    #[test]
    fn test_catalog_units_are_seeded() {
        for p in PARAMETER_CATALOG.iter() {
            assert!(UNITS.contains(&p.unit), "unit {} not in vocabulary", p.unit);
        }
    }

    #[test]
    fn test_heating_step_parameters_in_catalog() {
        for name in HEATING_STEP_PARAMETERS {
            assert!(find_parameter(name).is_some(), "{} missing", name);
        }
        assert_eq!(unit_for("Age"), Some("Ma"));
        assert_eq!(unit_for("unknown"), None);
    }
}
