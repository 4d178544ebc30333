// ==========================================
// WiscAr 导入管道 - 实验室领域实体
// ==========================================
// 标识: 所有实体以自然键解析（get-or-create）
// 对齐: sql/schema.sql
// ==========================================

use crate::domain::types::{AnalysisKind, GeoUnitKind, ImportStatus};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 数据库行主键
pub type RowId = i64;

// ==========================================
// Resolved - get-or-create 结果
// ==========================================
// created 仅用于日志与报告
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub value: T,
    pub created: bool,
}

impl<T> Resolved<T> {
    pub fn created(value: T) -> Self {
        Self { value, created: true }
    }

    pub fn found(value: T) -> Self {
        Self { value, created: false }
    }

    /// 日志用标签
    pub fn verb(&self) -> &'static str {
        if self.created {
            "created"
        } else {
            "found"
        }
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

// ==========================================
// 词表实体（仪器/方法/材料/单位/误差度量/参数）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedEntity {
    pub id: RowId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub id: RowId,
    pub name: String,          // 参数名（自然键）
    pub description: Option<String>,
}

// ==========================================
// Sample - 样品
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: RowId,
    pub name: String,              // 自然键
    pub material_id: Option<RowId>, // 岩性/材料
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoUnit {
    pub id: RowId,
    pub name: String,
    pub kind: GeoUnitKind,
}

// ==========================================
// Session - 一次分析测试
// ==========================================
// 自然键: (sample, instrument, method, date)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: RowId,
    pub sample_id: RowId,
    pub instrument_id: RowId,
    pub method_id: RowId,
    pub target_id: Option<RowId>,   // 测试目标材料
    pub date: NaiveDateTime,        // 文件修改时间作为日期代理
    pub date_precision: Option<String>,
    pub data: serde_json::Value,    // 通用信息剩余字段
}

/// 新建 Session 的自然键
#[derive(Debug, Clone, PartialEq)]
pub struct SessionKey {
    pub sample_id: RowId,
    pub instrument_id: RowId,
    pub method_id: RowId,
    pub target_id: Option<RowId>,
    pub date: NaiveDateTime,
}

// ==========================================
// Analysis - 测量事件/解释结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub id: RowId,
    pub session_id: RowId,
    pub kind: AnalysisKind,
    pub session_index: Option<i64>, // 仅加热步骤
    pub analysis_name: Option<String>,
    pub is_interpreted: bool,
    pub is_computed: bool,
    pub in_plateau: Option<bool>,   // 仅加热步骤
    pub data: Option<serde_json::Value>,
}

// ==========================================
// Datum - 单个标量测量值
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatumInput {
    pub parameter: String,
    pub value: f64,
    pub error: Option<f64>,
    pub error_metric: Option<String>, // 1s / 2s
    pub unit: String,
    pub description: Option<String>,
}

impl DatumInput {
    pub fn new(parameter: impl Into<String>, value: f64, unit: impl Into<String>) -> Self {
        Self {
            parameter: parameter.into(),
            value,
            error: None,
            error_metric: None,
            unit: unit.into(),
            description: None,
        }
    }

    pub fn with_error(mut self, error: Option<f64>, metric: Option<String>) -> Self {
        self.error = error;
        self.error_metric = if error.is_some() { metric } else { None };
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datum {
    pub id: RowId,
    pub analysis_id: RowId,
    pub parameter: String,
    pub value: f64,
    pub error: Option<f64>,
    pub error_metric: Option<String>,
    pub unit: Option<String>,
    pub description: Option<String>,
}

// ==========================================
// Constant - 外部标定常数（J 值、标样年龄）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantInput {
    pub name: String,          // 常数名（J / standard_age）
    pub label: Option<String>, // 标样标签（FC / AC）
    pub value: f64,
    pub error: Option<f64>,
    pub error_metric: Option<String>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constant {
    pub id: RowId,
    pub session_id: RowId,
    pub name: String,
    pub label: Option<String>,
    pub value: f64,
    pub error: Option<f64>,
    pub unit: Option<String>,
}

// ==========================================
// Publication / Project
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    pub id: RowId,
    pub doi: Option<String>,   // 可解析为 DOI 时的自然键
    pub link: Option<String>,  // 否则使用原始链接
    pub title: Option<String>,
    pub author: Option<String>,
    pub journal: Option<String>,
    pub year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: RowId,
    pub name: String, // 标题摘要（自然键）
    pub description: Option<String>,
}

// ==========================================
// DataFileRecord - 导入簿记
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFileRecord {
    pub id: RowId,
    pub file_path: String,
    pub file_mtime: String,
    pub import_status: ImportStatus,
    pub import_error: Option<String>,
    pub batch_id: Option<String>,
}
