// ==========================================
// WiscAr 导入管道 - 样品元数据导入器
// ==========================================
// 两遍处理:
//   1. 样品遍: 按样品名分组，校验辐照编号，写入坐标/岩性/地层单元
//   2. 项目遍: 按 (标题, DOI 链接) 分组，建立文献与项目并关联样品/会话
// 事务: 每个分组一个工作单元；失败的分组回滚后继续（除非 stop_on_error）
// ==========================================

use crate::config::ImportOptions;
use crate::db::LabDatabase;
use crate::domain::types::GeoUnitKind;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{RawRecord, RecordParser, UniversalFileParser};
use crate::importer::value_parser::{parse_doi, parse_numeric, title_summary, Cell};
use crate::repository::EntityRepository;
use rusqlite::Connection;
use std::collections::HashMap;
use std::hash::Hash;
use std::path::Path;
use tracing::{debug, error, info, instrument, warn};

// ===== 列别名 =====
const SAMPLE_COLUMNS: &[&str] = &["Sample", "Sample Name"];
const IRRADIATION_COLUMNS: &[&str] = &["Irradiation", "Irradiation ID"];
const LONGITUDE_COLUMNS: &[&str] = &["Longitude", "Lon"];
const LATITUDE_COLUMNS: &[&str] = &["Latitude", "Lat"];
const LITHOLOGY_COLUMNS: &[&str] = &["Lithology", "Material"];
const FORMATION_COLUMNS: &[&str] = &["Formation"];
const MEMBER_COLUMNS: &[&str] = &["Member"];
const TITLE_COLUMNS: &[&str] = &["Title", "Paper Title"];
const AUTHOR_COLUMNS: &[&str] = &["Authors", "Author"];
const JOURNAL_COLUMNS: &[&str] = &["Journal"];
const YEAR_COLUMNS: &[&str] = &["Year"];
const LINK_COLUMNS: &[&str] = &["DOI", "Link", "DOI Link"];

/// session.data 中的辐照编号字段
const SESSION_IRRADIATION_FIELD: &str = "Irradiation ID";

// ==========================================
// MetadataRow - 单行元数据
// ==========================================
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetadataRow {
    pub row_number: usize, // 1 起，不含表头
    pub sample: String,
    pub irradiation: Option<String>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub lithology: Option<String>,
    pub formation: Option<String>,
    pub member: Option<String>,
    pub title: Option<String>,
    pub authors: Option<String>,
    pub journal: Option<String>,
    pub year: Option<i32>,
    pub doi_link: Option<String>,
}

fn column<'r>(record: &'r RawRecord, aliases: &[&str]) -> Option<&'r Cell> {
    aliases
        .iter()
        .filter_map(|alias| record.get(*alias))
        .find(|cell| !cell.is_empty())
}

fn text(record: &RawRecord, aliases: &[&str]) -> Option<String> {
    column(record, aliases).and_then(Cell::as_text)
}

fn number(record: &RawRecord, aliases: &[&str], row_number: usize) -> ImportResult<Option<f64>> {
    match column(record, aliases) {
        Some(cell) => parse_numeric(cell, &format!("第 {} 行 {}", row_number, aliases[0])),
        None => Ok(None),
    }
}

impl MetadataRow {
    /// 无样品名的行返回 None
    pub fn from_record(row_number: usize, record: &RawRecord) -> ImportResult<Option<Self>> {
        let sample = match text(record, SAMPLE_COLUMNS) {
            Some(s) => s,
            None => return Ok(None),
        };

        Ok(Some(MetadataRow {
            row_number,
            sample,
            irradiation: text(record, IRRADIATION_COLUMNS),
            longitude: number(record, LONGITUDE_COLUMNS, row_number)?,
            latitude: number(record, LATITUDE_COLUMNS, row_number)?,
            lithology: text(record, LITHOLOGY_COLUMNS),
            formation: text(record, FORMATION_COLUMNS),
            member: text(record, MEMBER_COLUMNS),
            title: text(record, TITLE_COLUMNS),
            authors: text(record, AUTHOR_COLUMNS),
            journal: text(record, JOURNAL_COLUMNS),
            year: number(record, YEAR_COLUMNS, row_number)?.map(|y| y.round() as i32),
            doi_link: text(record, LINK_COLUMNS),
        }))
    }
}

// ==========================================
// MetadataSheet - 解析后的元数据表
// ==========================================

/// 字段解析失败的行，归入其样品分组的失败
#[derive(Debug)]
pub struct RejectedRow {
    pub row_number: usize,
    pub sample: String,
    pub error: ImportError,
}

#[derive(Debug, Default)]
pub struct MetadataSheet {
    pub rows: Vec<MetadataRow>,
    pub rejected: Vec<RejectedRow>,
}

impl MetadataSheet {
    pub fn from_records(records: &[RawRecord]) -> Self {
        let mut sheet = MetadataSheet::default();
        for (idx, record) in records.iter().enumerate() {
            let row_number = idx + 1;
            match MetadataRow::from_record(row_number, record) {
                Ok(Some(row)) => sheet.rows.push(row),
                Ok(None) => debug!(row_number, "无样品名，跳过该行"),
                Err(error) => {
                    let sample = text(record, SAMPLE_COLUMNS).unwrap_or_default();
                    warn!(row_number, sample = %sample, error = %error, "行解析失败");
                    sheet.rejected.push(RejectedRow {
                        row_number,
                        sample,
                        error,
                    });
                }
            }
        }
        sheet
    }
}

/// 按首次出现顺序分组
fn group_by<'r, K, F>(rows: &'r [MetadataRow], key: F) -> Vec<(K, Vec<&'r MetadataRow>)>
where
    K: Eq + Hash + Clone,
    F: Fn(&MetadataRow) -> Option<K>,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, Vec<&MetadataRow>)> = Vec::new();
    for row in rows {
        let k = match key(row) {
            Some(k) => k,
            None => continue,
        };
        match index.get(&k) {
            Some(&i) => groups[i].1.push(row),
            None => {
                index.insert(k.clone(), groups.len());
                groups.push((k, vec![row]));
            }
        }
    }
    groups
}

// ==========================================
// 汇总
// ==========================================
#[derive(Debug)]
pub struct GroupFailure {
    pub group: String,
    pub error: ImportError,
}

#[derive(Debug, Default)]
pub struct MetadataSummary {
    pub samples: usize,
    pub projects: usize,
    pub failures: Vec<GroupFailure>,
}

impl MetadataSummary {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

// ==========================================
// MetadataImporter
// ==========================================
pub struct MetadataImporter {
    stop_on_error: bool,
}

impl MetadataImporter {
    pub fn new(options: &ImportOptions) -> Self {
        Self {
            stop_on_error: options.stop_on_error,
        }
    }

    #[instrument(skip(self, db, path), fields(file = %path.display()))]
    pub fn import_file(&self, db: &mut LabDatabase, path: &Path) -> ImportResult<MetadataSummary> {
        let records = UniversalFileParser.parse_records(path)?;
        let sheet = MetadataSheet::from_records(&records);
        info!(rows = sheet.rows.len(), rejected = sheet.rejected.len(), "元数据表解析完成");

        self.import_sheet(db, sheet)
    }

    pub fn import_rows(&self, db: &mut LabDatabase, rows: &[MetadataRow]) -> ImportResult<MetadataSummary> {
        self.import_groups(db, rows, Vec::new())
    }

    pub fn import_sheet(&self, db: &mut LabDatabase, sheet: MetadataSheet) -> ImportResult<MetadataSummary> {
        self.import_groups(db, &sheet.rows, sheet.rejected)
    }

    fn import_groups(
        &self,
        db: &mut LabDatabase,
        rows: &[MetadataRow],
        rejected: Vec<RejectedRow>,
    ) -> ImportResult<MetadataSummary> {
        let mut summary = MetadataSummary::default();

        // 每个样品只保留首个解析失败
        let mut rejected_by_sample: HashMap<String, RejectedRow> = HashMap::new();
        for row in rejected {
            rejected_by_sample.entry(row.sample.clone()).or_insert(row);
        }

        // === 样品遍 ===
        // 含解析失败行的样品整组失败；仅有失败行的样品同样计入
        let mut sample_groups = group_by(rows, |r| Some(r.sample.clone()));
        for name in rejected_by_sample.keys() {
            if !sample_groups.iter().any(|(existing, _)| existing == name) {
                sample_groups.push((name.clone(), Vec::new()));
            }
        }
        let first_row = |name: &String, members: &Vec<&MetadataRow>| {
            let valid = members.first().map(|r| r.row_number);
            let invalid = rejected_by_sample.get(name).map(|r| r.row_number);
            valid.into_iter().chain(invalid).min().unwrap_or(usize::MAX)
        };
        sample_groups.sort_by_key(|(name, members)| first_row(name, members));

        for (name, group) in sample_groups {
            let result = match rejected_by_sample.remove(&name) {
                Some(row) => Err(row.error),
                None => db.unit_of_work(|tx| import_sample_group(tx, &name, &group)),
            };
            if self.settle(&mut summary, format!("sample {}", name), result)? {
                summary.samples += 1;
            }
        }

        // === 项目遍 ===
        let project_key = |r: &MetadataRow| r.title.clone().map(|t| (t, r.doi_link.clone()));
        for ((title, link), group) in group_by(rows, project_key) {
            let result =
                db.unit_of_work(|tx| import_project_group(tx, &title, link.as_deref(), &group));
            if self.settle(&mut summary, format!("project {}", title), result)? {
                summary.projects += 1;
            }
        }

        if summary.is_clean() {
            info!(samples = summary.samples, projects = summary.projects, "元数据导入完成");
        } else {
            warn!(
                samples = summary.samples,
                projects = summary.projects,
                failed = summary.failures.len(),
                "元数据导入完成（部分分组失败）"
            );
        }
        Ok(summary)
    }

    /// 分组失败: 记录并继续，或在 stop_on_error 下终止；返回该分组是否成功
    fn settle(
        &self,
        summary: &mut MetadataSummary,
        group: String,
        result: ImportResult<()>,
    ) -> ImportResult<bool> {
        match result {
            Ok(()) => Ok(true),
            Err(e) => {
                error!(group = %group, error = %e, "分组导入失败，已回滚");
                if self.stop_on_error {
                    return Err(e);
                }
                summary.failures.push(GroupFailure { group, error: e });
                Ok(false)
            }
        }
    }
}

fn import_sample_group(conn: &Connection, name: &str, rows: &[&MetadataRow]) -> ImportResult<()> {
    let repo = EntityRepository::new(conn);
    let resolved = repo.sample(name)?;
    debug!(sample = name, status = resolved.verb(), "样品");
    let sample = resolved.into_inner();

    // 每一行都须与已有 session 的辐照编号一致
    let sessions = repo.sessions_for_sample(sample.id)?;
    for row in rows {
        let irradiation = match &row.irradiation {
            Some(i) => i,
            None => continue,
        };
        for session in &sessions {
            let recorded = session
                .data
                .get(SESSION_IRRADIATION_FIELD)
                .and_then(|v| v.as_str());
            if !recorded.map(|r| r.starts_with(irradiation.as_str())).unwrap_or(false) {
                return Err(ImportError::Consistency(format!(
                    "第 {} 行: 样品 {} 的辐照编号 {} 与 session {} 记录的 {:?} 不一致",
                    row.row_number, name, irradiation, session.id, recorded
                )));
            }
        }
    }

    // 属性取分组首行
    let first = rows[0];
    if let (Some(lon), Some(lat)) = (first.longitude, first.latitude) {
        repo.set_sample_location(sample.id, lon, lat)?;
    }
    if let Some(lithology) = &first.lithology {
        let material = repo.material(lithology)?.into_inner();
        repo.set_sample_material(sample.id, material.id)?;
    }
    for (unit, kind) in [
        (&first.formation, GeoUnitKind::Formation),
        (&first.member, GeoUnitKind::Member),
    ] {
        if let Some(unit_name) = unit {
            let geo_unit = repo.geo_unit(unit_name, kind)?.into_inner();
            repo.link_sample_geo_unit(sample.id, geo_unit.id)?;
        }
    }

    Ok(())
}

fn import_project_group(
    conn: &Connection,
    title: &str,
    link: Option<&str>,
    rows: &[&MetadataRow],
) -> ImportResult<()> {
    let repo = EntityRepository::new(conn);

    let authors = rows.iter().find_map(|r| r.authors.as_deref());
    let journal = rows.iter().find_map(|r| r.journal.as_deref());
    let year = rows.iter().find_map(|r| r.year);
    let summary = title_summary(authors, title);

    let project = repo.project(&summary, Some(title))?;
    debug!(project = %summary, status = project.verb(), "项目");
    let project = project.into_inner();

    match link {
        Some(raw) => {
            let (doi, link) = parse_doi(raw);
            let publication = repo.publication(doi.as_deref(), link.as_deref())?.into_inner();
            repo.update_publication_details(publication.id, Some(title), authors, journal, year)?;
            repo.link_project_publication(project.id, publication.id)?;
        }
        None => debug!(project = %summary, "无 DOI/链接，不建立文献"),
    }

    for row in rows {
        match repo.find_sample(&row.sample)? {
            Some(sample) => {
                repo.link_project_sample(project.id, sample.id)?;
                for session in repo.sessions_for_sample(sample.id)? {
                    repo.link_project_session(project.id, session.id)?;
                }
            }
            None => debug!(sample = %row.sample, "样品不存在，跳过项目关联"),
        }
    }

    Ok(())
}
