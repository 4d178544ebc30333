// ==========================================
// WiscAr 导入管道 - ArArCalc 会话导入器
// ==========================================
// 流程: 切分 → 解析会话实体(样品/材料/仪器/方法) → 写通用信息
//       → 逐级加热步骤 → 坪年龄(可选) → 全熔年龄(必需) → 提交
// 事务: 每个文件一个工作单元，任一步失败整文件回滚
// ==========================================

use crate::config::ImportOptions;
use crate::db::LabDatabase;
use crate::domain::catalog::{unit_for, HEATING_STEP_PARAMETERS, INSTRUMENT_NAME, METHOD_PREFIX};
use crate::domain::entities::{ConstantInput, DatumInput, RowId, Session, SessionKey};
use crate::domain::types::{AnalysisKind, HeatingVariable};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{file_mtime, open_arar_sheet};
use crate::importer::table_extractor::{
    extract_data_tables, ExtractedTables, HeatingStepRow, IncrementalHeatingTable, InfoBlock,
    ResultRow,
};
use crate::importer::value_parser::{
    classify_heating_variable, error_metric_label, fused_error_metric, parse_numeric,
    split_error, standard_label,
};
use crate::repository::EntityRepository;
use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, info, instrument, trace, warn};

/// Session 日期精度（文件修改时间只可信到天）
pub const DATE_PRECISION: &str = "day";

/// 写入 session.data 的已知属性
const SESSION_ATTRIBUTES: [&str; 4] = [
    "Location",
    "Analyst",
    "Mass Discrimination Law",
    "Irradiation ID",
];

/// 结果块中 40Ar(r)/39Ar(k) 列的表头
const RATIO_HEADERS: [&str; 2] = ["40(r)/39(k)", "40Ar(r)/39Ar(k)"];

const KCA_HEADER: &str = "K/Ca";

// ==========================================
// GeneralInfo - 信息块的类型化视图
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct StandardAge {
    pub label: String, // FC / AC / 源字段标签
    pub value: f64,
    pub error: f64,
    pub source_field: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneralInfo {
    pub sample: String,
    pub material: String,
    pub analysis_type: String,
    pub j_value: Option<(f64, f64)>,
    pub standard: Option<StandardAge>,
    pub attributes: Map<String, Value>, // 其余字段原样保留
}

impl GeneralInfo {
    pub fn from_info(info: &InfoBlock) -> ImportResult<Self> {
        let required = |label: &str| {
            info.get(label).map(str::to_string).ok_or_else(|| {
                ImportError::DataExtraction(format!("信息块缺少必需字段 '{}'", label))
            })
        };

        let mut general = GeneralInfo {
            sample: required("Sample")?,
            material: required("Material")?,
            analysis_type: required("Type")?,
            j_value: None,
            standard: None,
            attributes: Map::new(),
        };

        for (label, value) in info.iter() {
            match label {
                "Sample" | "Material" | "Type" => {}
                "J-value" => {
                    general.j_value = Some(split_error(value)?);
                }
                l if l.starts_with("Standard") => general.take_standard(l, value),
                l if SESSION_ATTRIBUTES.contains(&l) => {
                    general.attributes.insert(l.to_string(), Value::String(value.to_string()));
                }
                l => {
                    warn!(field = l, value, "未识别的通用信息字段，原样写入 session.data");
                    general.attributes.insert(l.to_string(), Value::String(value.to_string()));
                }
            }
        }

        Ok(general)
    }

    /// 第一个可解析的标样字段生效，其余忽略
    fn take_standard(&mut self, label: &str, value: &str) {
        if let Some(existing) = &self.standard {
            debug!(field = label, kept = %existing.source_field, "已有标样年龄，忽略该字段");
            return;
        }

        match split_error(value) {
            Ok((age, error)) => {
                let suffix = label
                    .trim_start_matches("Standard")
                    .trim_matches(|c: char| c.is_whitespace() || matches!(c, '(' | ')' | '-' | ':'));
                let source_label = if suffix.is_empty() { label } else { suffix };
                self.standard = Some(StandardAge {
                    label: standard_label(age, source_label),
                    value: age,
                    error,
                    source_field: label.to_string(),
                });
            }
            Err(e) => {
                debug!(field = label, error = %e, "标样字段无法解析，跳过");
            }
        }
    }
}

// ==========================================
// SessionImporter
// ==========================================
pub struct SessionImporter {
    show_data: bool,
}

impl SessionImporter {
    pub fn new(options: &ImportOptions) -> Self {
        Self {
            show_data: options.show_data,
        }
    }

    /// 导入单个 ArArCalc 文件，返回顶层 Session
    #[instrument(skip(self, db, path), fields(file = %path.display()))]
    pub fn import_file(&self, db: &mut LabDatabase, path: &Path) -> ImportResult<Session> {
        let range = open_arar_sheet(path)?;
        let tables = extract_data_tables(&range)?;

        if self.show_data {
            println!("{}", tables.incremental_heating);
            println!("{}", tables.info);
            println!("{}", tables.results);
        }

        // 文件修改时间作为日期代理（文件被改动后会产生新 session）
        let date = file_mtime(path)?;
        db.unit_of_work(|tx| import_tables(tx, &tables, date))
    }
}

/// 将切分好的三张表写入数据库（调用方负责事务）
pub fn import_tables(
    conn: &Connection,
    tables: &ExtractedTables,
    date: NaiveDateTime,
) -> ImportResult<Session> {
    let general = GeneralInfo::from_info(&tables.info)?;
    let repo = EntityRepository::new(conn);

    // === 会话实体 ===
    let sample = repo.sample(&general.sample)?;
    debug!(sample = %general.sample, status = sample.verb(), "样品");
    let target = repo.material(&general.material)?.into_inner();
    let instrument = repo.instrument(INSTRUMENT_NAME)?.into_inner();
    let method = repo
        .method(&format!("{}{}", METHOD_PREFIX, general.analysis_type))?
        .into_inner();

    let resolved = repo.session(&SessionKey {
        sample_id: sample.value.id,
        instrument_id: instrument.id,
        method_id: method.id,
        target_id: Some(target.id),
        date,
    })?;
    debug!(session_id = resolved.value.id, status = resolved.verb(), "会话");
    let mut session = resolved.into_inner();

    repo.set_session_date_precision(session.id, DATE_PRECISION)?;
    session.date_precision = Some(DATE_PRECISION.to_string());

    // === 通用信息 ===
    session.data = write_general_info(&repo, session.id, &general)?;

    // === 逐级加热 ===
    let heating = &tables.incremental_heating;
    let variable = classify_heating_variable(&heating.step_values());
    for step in &heating.steps {
        import_heating_step(&repo, session.id, step, heating, variable)?;
    }

    // === 解释年龄 ===
    match tables.results.get(AnalysisKind::AgePlateau.as_str()) {
        Some(row) => import_interpreted_age(&repo, session.id, AnalysisKind::AgePlateau, row)?,
        None => debug!("结果块无坪年龄"),
    }

    let fusion = tables
        .results
        .get(AnalysisKind::TotalFusionAge.as_str())
        .ok_or_else(|| ImportError::DataExtraction("结果块缺少 'Total Fusion Age' 行".to_string()))?;
    import_interpreted_age(&repo, session.id, AnalysisKind::TotalFusionAge, fusion)?;

    info!(
        sample = %general.sample,
        session_id = session.id,
        steps = heating.len(),
        heating_variable = variable.parameter(),
        "ArArCalc 文件导入完成"
    );
    Ok(session)
}

fn write_general_info(
    repo: &EntityRepository<'_>,
    session_id: RowId,
    general: &GeneralInfo,
) -> ImportResult<Value> {
    if let Some((value, error)) = general.j_value {
        repo.constant(
            session_id,
            &ConstantInput {
                name: "J".to_string(),
                label: None,
                value,
                error: Some(error),
                error_metric: None,
                unit: Some("dimensionless".to_string()),
            },
        )?;
    }

    if let Some(standard) = &general.standard {
        repo.constant(
            session_id,
            &ConstantInput {
                name: "standard_age".to_string(),
                label: Some(standard.label.clone()),
                value: standard.value,
                error: Some(standard.error),
                error_metric: None,
                unit: Some("Ma".to_string()),
            },
        )?;
    }

    let data = Value::Object(general.attributes.clone());
    repo.set_session_data(session_id, &data)?;
    Ok(data)
}

fn import_heating_step(
    repo: &EntityRepository<'_>,
    session_id: RowId,
    step: &HeatingStepRow,
    table: &IncrementalHeatingTable,
    variable: HeatingVariable,
) -> ImportResult<()> {
    let analysis = repo
        .analysis(session_id, AnalysisKind::HeatingStep, Some(step.session_index as i64))?
        .into_inner();
    repo.update_analysis(analysis.id, Some(&step.label), Some(step.in_plateau), None)?;

    repo.datum(
        analysis.id,
        &DatumInput::new(variable.parameter(), step.step_value, variable.unit()),
    )?;

    let measured = HEATING_STEP_PARAMETERS.iter().chain(["Age", "K/Ca"].iter());
    for parameter in measured {
        let cell = match step.values.get(parameter) {
            Some(cell) => cell,
            None => continue,
        };
        let value = match cell.value {
            Some(v) => v,
            None => {
                trace!(step = %step.label, parameter, "缺失值，跳过");
                continue;
            }
        };
        let metric = table.binding(parameter).and_then(|b| b.error_metric.clone());
        let unit = unit_for(parameter).unwrap_or("dimensionless");
        repo.datum(
            analysis.id,
            &DatumInput::new(*parameter, value, unit).with_error(cell.error, metric),
        )?;
    }

    Ok(())
}

/// 坪年龄与全熔年龄共用：融合年龄、40Ar(r)/39Ar(k)、K/Ca，其余数值写入 analysis.data
fn import_interpreted_age(
    repo: &EntityRepository<'_>,
    session_id: RowId,
    kind: AnalysisKind,
    row: &ResultRow,
) -> ImportResult<()> {
    let analysis = repo.analysis(session_id, kind, None)?.into_inner();
    let mut consumed: Vec<&str> = Vec::new();

    // 融合年龄列: "Age ± 2s (Ma)" → "12.40 ± 0.05 Ma"
    let (age_header, age_cell) = row
        .cells
        .iter()
        .find(|(h, _)| h.starts_with("Age") && h.contains('±'))
        .ok_or_else(|| {
            ImportError::DataExtraction(format!("'{}' 行缺少融合年龄列", row.label))
        })?;
    let age_text = age_cell.as_text().ok_or_else(|| {
        ImportError::DataExtraction(format!("'{}' 行年龄为空", row.label))
    })?;
    let (age, age_error) = split_error(&age_text)?;
    if let Some(parameter) = kind.age_parameter() {
        repo.datum(
            analysis.id,
            &DatumInput::new(parameter, age, "Ma")
                .with_error(Some(age_error), fused_error_metric(age_header)),
        )?;
    }
    consumed.push(age_header.as_str());

    for (parameter, headers) in [("40Ar(r)/39Ar(k)", &RATIO_HEADERS[..]), ("K/Ca", &[KCA_HEADER][..])] {
        if let Some(header) = headers.iter().find(|h| row.get(h).is_some()) {
            consumed.push(*header);
            write_paired_datum(repo, analysis.id, row, parameter, header, &mut consumed)?;
        }
    }

    // 其余数值单元格
    let mut data = Map::new();
    let mut previous: Option<&str> = None;
    for (header, cell) in &row.cells {
        if !consumed.contains(&header.as_str()) {
            let key = match previous {
                Some(prev) if header.starts_with('±') => format!("{} {}", prev, header),
                _ => header.clone(),
            };
            if let Ok(Some(v)) = parse_numeric(cell, header) {
                data.insert(key, Value::from(v));
            }
        }
        if !header.starts_with('±') {
            previous = Some(header.as_str());
        }
    }

    repo.update_analysis(analysis.id, Some(kind.as_str()), None, Some(&Value::Object(data)))?;
    debug!(kind = %kind, age, age_error, "解释年龄已写入");
    Ok(())
}

/// 值列 + 右侧 ± 列
fn write_paired_datum<'r>(
    repo: &EntityRepository<'_>,
    analysis_id: RowId,
    row: &'r ResultRow,
    parameter: &str,
    header: &str,
    consumed: &mut Vec<&'r str>,
) -> ImportResult<()> {
    let value = match row.get(header) {
        Some(cell) => parse_numeric(cell, &format!("{} / {}", row.label, header))?,
        None => None,
    };
    let value = match value {
        Some(v) => v,
        None => return Ok(()),
    };

    let (error, metric) = match row.next_after(header) {
        Some((error_header, cell)) if error_header.starts_with('±') => {
            consumed.push(error_header);
            (
                parse_numeric(cell, &format!("{} / {}", row.label, error_header))?,
                Some(error_metric_label(error_header)),
            )
        }
        _ => (None, None),
    };

    let unit = unit_for(parameter).unwrap_or("dimensionless");
    repo.datum(analysis_id, &DatumInput::new(parameter, value, unit).with_error(error, metric))?;
    Ok(())
}
