// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库、ArArCalc 报表构建器、元数据行构建器
// ==========================================
#![allow(dead_code)]

use calamine::{Data, Range};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use tempfile::TempDir;
use wiscar_import::db::LabDatabase;
use wiscar_import::domain::Session;
use wiscar_import::importer::metadata_importer::MetadataRow;
use wiscar_import::importer::session_importer::import_tables;
use wiscar_import::importer::table_extractor::{extract_data_tables, ExtractedTables};
use wiscar_import::importer::value_parser::Cell;
use wiscar_import::importer::ImportResult;

/// 创建临时数据库文件并迁移
///
/// # 返回
/// - TempDir: 临时目录（需要保持存活）
/// - LabDatabase: 已迁移的数据库
pub fn create_test_db() -> (TempDir, LabDatabase) {
    let dir = tempfile::tempdir().unwrap();
    let db = LabDatabase::open_and_migrate(dir.path().join("lab.db")).unwrap();
    (dir, db)
}

/// 表行数
pub fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
        .unwrap()
}

/// 固定的文件修改时间
pub fn test_date() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2020, 3, 14)
        .unwrap()
        .and_hms_opt(9, 26, 53)
        .unwrap()
}

// ==========================================
// ArArCalc 报表构建器
// ==========================================

pub struct ArArSheet {
    sample: String,
    material: String,
    analysis_type: String,
    steps: Vec<(String, f64, bool)>,
    info_extra: Vec<(String, String)>,
    plateau: Option<String>,
    fusion: Option<String>,
}

impl ArArSheet {
    /// 默认: 3 个温度步骤，仅全熔年龄
    pub fn new(sample: &str) -> Self {
        Self {
            sample: sample.to_string(),
            material: "Sanidine".to_string(),
            analysis_type: "Incremental Heating".to_string(),
            steps: vec![
                ("4D".to_string(), 600.0, false),
                ("4E".to_string(), 700.0, true),
                ("4F".to_string(), 800.0, true),
            ],
            info_extra: Vec::new(),
            plateau: None,
            fusion: Some("12.40 ± 0.05 Ma".to_string()),
        }
    }

    pub fn with_steps(mut self, values: &[f64]) -> Self {
        self.steps = values
            .iter()
            .enumerate()
            .map(|(i, v)| (format!("S{}", i + 1), *v, false))
            .collect();
        self
    }

    pub fn with_info(mut self, label: &str, value: &str) -> Self {
        self.info_extra.push((label.to_string(), value.to_string()));
        self
    }

    pub fn with_plateau(mut self, age: &str) -> Self {
        self.plateau = Some(age.to_string());
        self
    }

    pub fn without_fusion(mut self) -> Self {
        self.fusion = None;
        self
    }

    pub fn grid(&self) -> Vec<Vec<Cell>> {
        let t = |s: &str| Cell::Text(s.to_string());
        let n = Cell::Number;

        let mut grid = vec![[
            "Incremental Heating", "Temp", "36Ar(a)", "± 1s", "37Ar(ca)", "± 1s", "38Ar(cl)",
            "± 1s", "39Ar(k)", "± 1s", "40Ar(r)", "± 1s", "Age", "± 2s", "40Ar(r) [%]",
            "39Ar(k) [%]", "K/Ca", "± 2s", "Plateau",
        ]
        .iter()
        .map(|s| t(s))
        .collect::<Vec<_>>()];

        for (label, value, in_plateau) in &self.steps {
            let mut row = vec![t(label), n(*value)];
            for v in [0.0012, 0.0001, 0.031, 0.002, 0.0004, 0.00002, 1.52, 0.004, 30.1, 0.05] {
                row.push(n(v));
            }
            row.extend([
                n(12.31),
                n(0.42),
                n(88.4),
                n(33.3),
                n(0.45),
                n(0.02),
                if *in_plateau { t("x") } else { Cell::Empty },
            ]);
            grid.push(row);
        }

        grid.push(vec![Cell::Empty]);
        grid.push(vec![t("Information on Analysis")]);
        grid.push(vec![t("Sample"), t(&self.sample)]);
        grid.push(vec![t("Material"), t(&self.material)]);
        grid.push(vec![t("Type"), t(&self.analysis_type)]);
        for (label, value) in &self.info_extra {
            grid.push(vec![t(label), t(value)]);
        }

        grid.push(vec![Cell::Empty]);
        grid.push(
            ["Results", "40(r)/39(k)", "± 2s", "Age ± 2s (Ma)", "MSWD", "K/Ca", "± 2s"]
                .iter()
                .map(|s| t(s))
                .collect(),
        );
        let result_row = |label: &str, age: &str| {
            vec![t(label), n(7.104), n(0.011), t(age), n(1.21), n(0.46), n(0.03)]
        };
        if let Some(age) = &self.plateau {
            grid.push(result_row("Age Plateau", age));
        }
        if let Some(age) = &self.fusion {
            grid.push(result_row("Total Fusion Age", age));
        }
        grid
    }

    /// 转为 calamine Range（与读取 .xls 得到的结构一致）
    pub fn range(&self) -> Range<Data> {
        grid_to_range(&self.grid())
    }

    pub fn tables(&self) -> ExtractedTables {
        extract_data_tables(&self.range()).unwrap()
    }
}

pub fn grid_to_range(grid: &[Vec<Cell>]) -> Range<Data> {
    let height = grid.len() as u32;
    let width = grid.iter().map(|r| r.len()).max().unwrap_or(1) as u32;
    let mut range = Range::new((0, 0), (height - 1, width - 1));
    for (r, row) in grid.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            let data = match cell {
                Cell::Empty => Data::Empty,
                Cell::Number(v) => Data::Float(*v),
                Cell::Text(s) => Data::String(s.clone()),
                Cell::Bool(b) => Data::Bool(*b),
            };
            range.set_value((r as u32, c as u32), data);
        }
    }
    range
}

/// 在一个工作单元内导入报表
pub fn import_sheet(db: &mut LabDatabase, sheet: &ArArSheet, date: NaiveDateTime) -> ImportResult<Session> {
    let tables = extract_data_tables(&sheet.range())?;
    db.unit_of_work(|tx| import_tables(tx, &tables, date))
}

// ==========================================
// 元数据行构建器
// ==========================================

pub fn metadata_row(row_number: usize, sample: &str) -> MetadataRow {
    MetadataRow {
        row_number,
        sample: sample.to_string(),
        ..Default::default()
    }
}
