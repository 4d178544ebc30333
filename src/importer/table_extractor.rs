// ==========================================
// WiscAr 导入管道 - ArArCalc 报表切分器
// ==========================================
// 职责: 将人工编排的报表工作表切分为三张表
//   1. incremental_heating: 逐级加热表（每行一个步骤）
//   2. info:                分析信息键值块
//   3. results:             结果块（按行标签索引）
// 值/误差列配对由 HEATING_SCHEMA 显式声明，并在切分时一次性校验
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use crate::importer::value_parser::{error_metric_label, is_truthy_marker, parse_numeric, Cell};
use calamine::{Data, Range};
use std::collections::BTreeMap;
use std::fmt;

/// 逐级加热表头行的首列标签
pub const HEATING_HEADER: &str = "Incremental Heating";

/// 信息块起始标签
pub const INFO_HEADER: &str = "Information on Analysis";

/// 结果块表头行的首列标签
pub const RESULTS_HEADER: &str = "Results";

/// 加热变量（温度或激光功率）列的参数占位名
pub const STEP_VARIABLE: &str = "step";

/// 坪区标记列的参数占位名
pub const PLATEAU_FLAG: &str = "in_plateau";

// ==========================================
// 列定义
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub parameter: &'static str,
    pub headers: &'static [&'static str],
    pub paired_error: bool, // 右侧紧邻列为 "± 1s/2s" 误差列
    pub required: bool,
}

/// 逐级加热表列定义
pub const HEATING_SCHEMA: [ColumnSpec; 11] = [
    ColumnSpec {
        parameter: STEP_VARIABLE,
        headers: &["Temp", "Temperature", "Power", "Laser Power"],
        paired_error: false,
        required: true,
    },
    ColumnSpec { parameter: "36Ar(a)", headers: &["36Ar(a)"], paired_error: true, required: true },
    ColumnSpec { parameter: "37Ar(ca)", headers: &["37Ar(ca)"], paired_error: true, required: true },
    ColumnSpec { parameter: "38Ar(cl)", headers: &["38Ar(cl)"], paired_error: true, required: true },
    ColumnSpec { parameter: "39Ar(k)", headers: &["39Ar(k)"], paired_error: true, required: true },
    ColumnSpec { parameter: "40Ar(r)", headers: &["40Ar(r)"], paired_error: true, required: true },
    ColumnSpec {
        parameter: "%40Ar(r)",
        headers: &["40Ar(r) [%]", "%40Ar(r)"],
        paired_error: false,
        required: true,
    },
    ColumnSpec {
        parameter: "%39Ar(k)",
        headers: &["39Ar(k) [%]", "%39Ar(k)"],
        paired_error: false,
        required: true,
    },
    ColumnSpec { parameter: "Age", headers: &["Age", "Age (Ma)"], paired_error: true, required: true },
    ColumnSpec { parameter: "K/Ca", headers: &["K/Ca"], paired_error: true, required: true },
    ColumnSpec {
        parameter: PLATEAU_FLAG,
        headers: &["Plateau", "In Plateau"],
        paired_error: false,
        required: false,
    },
];

/// 切分时解析出的列位置
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnBinding {
    pub parameter: &'static str,
    pub header: String,
    pub index: usize,
    pub error_index: Option<usize>,
    pub error_metric: Option<String>,
}

/// 值与误差（均可缺失）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MeasuredCell {
    pub value: Option<f64>,
    pub error: Option<f64>,
}

// ==========================================
// 逐级加热表
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct HeatingStepRow {
    pub session_index: usize, // 源表中的顺序
    pub label: String,
    pub step_value: f64,      // 温度或激光功率（整列判定）
    pub in_plateau: bool,
    pub values: BTreeMap<&'static str, MeasuredCell>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct IncrementalHeatingTable {
    pub columns: Vec<ColumnBinding>,
    pub steps: Vec<HeatingStepRow>,
}

impl IncrementalHeatingTable {
    pub fn binding(&self, parameter: &str) -> Option<&ColumnBinding> {
        self.columns.iter().find(|c| c.parameter == parameter)
    }

    /// 加热变量整列取值（用于温度/功率判定）
    pub fn step_values(&self) -> Vec<f64> {
        self.steps.iter().map(|s| s.step_value).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

// ==========================================
// 信息块（有序键值）
// ==========================================
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InfoBlock {
    fields: Vec<(String, String)>,
}

impl InfoBlock {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == label)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ==========================================
// 结果块
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub label: String,
    pub cells: Vec<(String, Cell)>,
}

impl ResultRow {
    pub fn get(&self, header: &str) -> Option<&Cell> {
        self.cells.iter().find(|(h, _)| h == header).map(|(_, c)| c)
    }

    /// 表头紧邻的右侧单元格（值列之后的 ± 列）
    pub fn next_after(&self, header: &str) -> Option<(&str, &Cell)> {
        let pos = self.cells.iter().position(|(h, _)| h == header)?;
        self.cells.get(pos + 1).map(|(h, c)| (h.as_str(), c))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultsTable {
    pub headers: Vec<String>,
    pub rows: Vec<ResultRow>,
}

impl ResultsTable {
    pub fn get(&self, label: &str) -> Option<&ResultRow> {
        self.rows.iter().find(|r| r.label == label)
    }
}

// ==========================================
// 切分结果
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedTables {
    pub incremental_heating: IncrementalHeatingTable,
    pub info: InfoBlock,
    pub results: ResultsTable,
}

/// 从 calamine Range 切分
pub fn extract_data_tables(range: &Range<Data>) -> ImportResult<ExtractedTables> {
    let grid = grid_from_range(range);
    extract_from_grid(&grid)
}

/// Range → 单元格网格
pub fn grid_from_range(range: &Range<Data>) -> Vec<Vec<Cell>> {
    range
        .rows()
        .map(|row| row.iter().map(Cell::from).collect())
        .collect()
}

/// 从单元格网格切分
pub fn extract_from_grid(grid: &[Vec<Cell>]) -> ImportResult<ExtractedTables> {
    let incremental_heating = extract_incremental_heating(grid)?;
    let info = extract_info(grid)?;
    let results = extract_results(grid)?;

    Ok(ExtractedTables {
        incremental_heating,
        info,
        results,
    })
}

fn first_cell_text(row: &[Cell]) -> Option<String> {
    row.first().and_then(Cell::as_text)
}

fn find_block_row(grid: &[Vec<Cell>], label: &str) -> Option<usize> {
    grid.iter()
        .position(|row| first_cell_text(row).as_deref() == Some(label))
}

/// 块内数据行：表头之后直到首列为空
fn block_rows(grid: &[Vec<Cell>], header_row: usize) -> impl Iterator<Item = &Vec<Cell>> {
    grid.iter()
        .skip(header_row + 1)
        .take_while(|row| first_cell_text(row).is_some())
}

fn cell_at(row: &[Cell], idx: usize) -> &Cell {
    static EMPTY: Cell = Cell::Empty;
    row.get(idx).unwrap_or(&EMPTY)
}

fn extract_incremental_heating(grid: &[Vec<Cell>]) -> ImportResult<IncrementalHeatingTable> {
    let header_row = find_block_row(grid, HEATING_HEADER).ok_or_else(|| {
        ImportError::DataExtraction(format!("未找到逐级加热表头 '{}'", HEATING_HEADER))
    })?;

    let headers: Vec<Option<String>> = grid[header_row].iter().map(Cell::as_text).collect();
    let columns = bind_columns(&headers)?;

    let mut steps = Vec::new();
    for (session_index, row) in block_rows(grid, header_row).enumerate() {
        let label = first_cell_text(row).unwrap_or_default();
        let mut step_value = None;
        let mut in_plateau = false;
        let mut values = BTreeMap::new();

        for binding in &columns {
            let cell = cell_at(row, binding.index);
            match binding.parameter {
                STEP_VARIABLE => {
                    step_value = parse_numeric(cell, &format!("{} / {}", label, binding.header))?;
                }
                PLATEAU_FLAG => {
                    in_plateau = is_truthy_marker(cell);
                }
                parameter => {
                    let field = format!("{} / {}", label, binding.header);
                    let value = parse_numeric(cell, &field)?;
                    let error = match binding.error_index {
                        Some(idx) => parse_numeric(cell_at(row, idx), &field)?,
                        None => None,
                    };
                    values.insert(parameter, MeasuredCell { value, error });
                }
            }
        }

        let step_value = step_value.ok_or_else(|| {
            ImportError::DataExtraction(format!("加热步骤 '{}' 缺少温度/功率值", label))
        })?;

        steps.push(HeatingStepRow {
            session_index,
            label,
            step_value,
            in_plateau,
            values,
        });
    }

    if steps.is_empty() {
        return Err(ImportError::DataExtraction(
            "逐级加热表没有任何步骤行".to_string(),
        ));
    }

    Ok(IncrementalHeatingTable { columns, steps })
}

/// 按 HEATING_SCHEMA 定位列，并校验配对误差列
fn bind_columns(headers: &[Option<String>]) -> ImportResult<Vec<ColumnBinding>> {
    let mut columns = Vec::new();

    for spec in HEATING_SCHEMA.iter() {
        let found = headers.iter().enumerate().skip(1).find(|(_, h)| {
            h.as_deref()
                .map(|h| spec.headers.contains(&h))
                .unwrap_or(false)
        });

        let (index, header) = match found {
            Some((idx, Some(h))) => (idx, h.clone()),
            _ if spec.required => {
                return Err(ImportError::DataExtraction(format!(
                    "逐级加热表缺少必需列 '{}'（可接受表头: {:?}）",
                    spec.parameter, spec.headers
                )))
            }
            _ => continue,
        };

        let (error_index, error_metric) = if spec.paired_error {
            let error_header = headers
                .get(index + 1)
                .and_then(|h| h.as_deref())
                .filter(|h| h.starts_with('±'))
                .ok_or_else(|| {
                    ImportError::DataExtraction(format!(
                        "列 '{}' 右侧缺少 ± 误差列",
                        header
                    ))
                })?;
            (Some(index + 1), Some(error_metric_label(error_header)))
        } else {
            (None, None)
        };

        columns.push(ColumnBinding {
            parameter: spec.parameter,
            header,
            index,
            error_index,
            error_metric,
        });
    }

    Ok(columns)
}

fn extract_info(grid: &[Vec<Cell>]) -> ImportResult<InfoBlock> {
    let start = find_block_row(grid, INFO_HEADER).ok_or_else(|| {
        ImportError::DataExtraction(format!("未找到信息块 '{}'", INFO_HEADER))
    })?;

    let mut fields = Vec::new();
    for row in block_rows(grid, start) {
        let label = first_cell_text(row).unwrap_or_default();
        let label = label.trim_end_matches(':').trim().to_string();
        let value = row.iter().skip(1).find_map(Cell::as_text);
        if let Some(value) = value {
            fields.push((label, value));
        }
    }

    Ok(InfoBlock { fields })
}

fn extract_results(grid: &[Vec<Cell>]) -> ImportResult<ResultsTable> {
    let header_row = find_block_row(grid, RESULTS_HEADER).ok_or_else(|| {
        ImportError::DataExtraction(format!("未找到结果块表头 '{}'", RESULTS_HEADER))
    })?;

    let header_cols: Vec<(usize, String)> = grid[header_row]
        .iter()
        .enumerate()
        .skip(1)
        .filter_map(|(idx, cell)| cell.as_text().map(|h| (idx, h)))
        .collect();

    let rows = block_rows(grid, header_row)
        .map(|row| ResultRow {
            label: first_cell_text(row).unwrap_or_default(),
            cells: header_cols
                .iter()
                .map(|(idx, h)| (h.clone(), cell_at(row, *idx).clone()))
                .collect(),
        })
        .collect();

    Ok(ResultsTable {
        headers: header_cols.into_iter().map(|(_, h)| h).collect(),
        rows,
    })
}

// ==========================================
// 调试输出（--show-data）
// ==========================================

impl fmt::Display for IncrementalHeatingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<&str> = self.columns.iter().map(|c| c.header.as_str()).collect();
        writeln!(f, "step\t{}", headers.join("\t"))?;
        for step in &self.steps {
            write!(f, "{}\t{}", step.label, step.step_value)?;
            for column in &self.columns {
                if let Some(cell) = step.values.get(column.parameter) {
                    match (cell.value, cell.error) {
                        (Some(v), Some(e)) => write!(f, "\t{} ± {}", v, e)?,
                        (Some(v), None) => write!(f, "\t{}", v)?,
                        _ => write!(f, "\t—")?,
                    }
                }
            }
            writeln!(f, "{}", if step.in_plateau { "\t[plateau]" } else { "" })?;
        }
        Ok(())
    }
}

impl fmt::Display for InfoBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, v) in self.iter() {
            writeln!(f, "{}: {}", k, v)?;
        }
        Ok(())
    }
}

impl fmt::Display for ResultsTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.rows {
            writeln!(f, "[{}]", row.label)?;
            for (h, c) in &row.cells {
                writeln!(f, "  {}: {}", h, c)?;
            }
        }
        Ok(())
    }
}
