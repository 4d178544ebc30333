// ==========================================
// WiscAr 导入管道 - 文件解析器
// ==========================================
// 支持: ArArCalc 报表 (.xls/.xlsx) / 元数据表 (.xlsx/.csv)
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use crate::importer::value_parser::Cell;
use calamine::{open_workbook_auto, Data, Range, Reader};
use chrono::{DateTime, Local, NaiveDateTime, Timelike};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// ArArCalc 报表的首选工作表
pub const ARARCALC_SHEET: &str = "Incremental Heating Summary";

/// 元数据行（表头 → 单元格）
pub type RawRecord = HashMap<String, Cell>;

// ==========================================
// 通用检查
// ==========================================

fn file_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

fn ensure_readable(path: &Path, allowed: &[&str]) -> ImportResult<()> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    let ext = file_extension(path);
    if !allowed.contains(&ext.as_str()) {
        return Err(ImportError::UnsupportedFormat(ext));
    }
    Ok(())
}

/// 文件修改时间（本地时间，截断到秒）
pub fn file_mtime(path: &Path) -> ImportResult<NaiveDateTime> {
    let modified = std::fs::metadata(path)?.modified()?;
    let local: DateTime<Local> = modified.into();
    let naive = local.naive_local();
    Ok(naive.with_nanosecond(0).unwrap_or(naive))
}

// ==========================================
// ArArCalc 报表
// ==========================================

/// 打开报表并选取工作表（优先 "Incremental Heating Summary"，否则第一个）
pub fn open_arar_sheet(path: &Path) -> ImportResult<Range<Data>> {
    ensure_readable(path, &["xls", "xlsx"])?;

    let mut workbook = open_workbook_auto(path)?;
    let sheet_names = workbook.sheet_names();
    let sheet_name = sheet_names
        .iter()
        .find(|name| name.as_str() == ARARCALC_SHEET)
        .or_else(|| sheet_names.first())
        .cloned()
        .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?;

    debug!(file = %path.display(), sheet = %sheet_name, "读取报表工作表");
    Ok(workbook.worksheet_range(&sheet_name)?)
}

// ==========================================
// 元数据表
// ==========================================
pub trait RecordParser {
    /// 解析为行记录（首行为表头，全空行跳过）
    fn parse_records(&self, path: &Path) -> ImportResult<Vec<RawRecord>>;
}

pub struct CsvParser;

impl RecordParser for CsvParser {
    fn parse_records(&self, path: &Path) -> ImportResult<Vec<RawRecord>> {
        ensure_readable(path, &["csv"])?;

        let file = File::open(path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(file);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut records = Vec::new();
        for result in reader.records() {
            let record = result?;
            let row: RawRecord = record
                .iter()
                .zip(headers.iter())
                .filter(|(_, header)| !header.is_empty())
                .map(|(value, header)| (header.clone(), Cell::from(value.trim())))
                .collect();

            if row.values().all(Cell::is_empty) {
                continue;
            }
            records.push(row);
        }

        Ok(records)
    }
}

pub struct ExcelParser;

impl RecordParser for ExcelParser {
    fn parse_records(&self, path: &Path) -> ImportResult<Vec<RawRecord>> {
        ensure_readable(path, &["xlsx", "xls"])?;

        let mut workbook = open_workbook_auto(path)?;
        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?;
        let range = workbook.worksheet_range(&sheet_name)?;

        records_from_range(&range)
    }
}

/// 首行为表头的 Range → 行记录
pub fn records_from_range(range: &Range<Data>) -> ImportResult<Vec<RawRecord>> {
    let mut rows = range.rows();
    let header_row = rows
        .next()
        .ok_or_else(|| ImportError::ExcelParseError("工作表无数据行".to_string()))?;

    let headers: Vec<Option<String>> = header_row
        .iter()
        .map(|cell| Cell::from(cell).as_text())
        .collect();

    let mut records = Vec::new();
    for data_row in rows {
        let row: RawRecord = data_row
            .iter()
            .zip(headers.iter())
            .filter_map(|(cell, header)| header.as_ref().map(|h| (h.clone(), Cell::from(cell))))
            .collect();

        if row.values().all(Cell::is_empty) {
            continue;
        }
        records.push(row);
    }

    Ok(records)
}

/// 根据扩展名选择解析器
pub struct UniversalFileParser;

impl RecordParser for UniversalFileParser {
    fn parse_records(&self, path: &Path) -> ImportResult<Vec<RawRecord>> {
        match file_extension(path).as_str() {
            "csv" => CsvParser.parse_records(path),
            "xlsx" | "xls" => ExcelParser.parse_records(path),
            other => Err(ImportError::UnsupportedFormat(other.to_string())),
        }
    }
}
