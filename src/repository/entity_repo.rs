// ==========================================
// WiscAr 导入管道 - 实体解析 Repository
// ==========================================
// 职责: 每类实体一个 get-or-create（按自然键比对，找到则返回，否则插入）
// 红线: 不含业务规则，不控制事务边界（由调用方的工作单元负责）
// ==========================================

use crate::domain::entities::{
    Analysis, Constant, ConstantInput, Datum, DatumInput, GeoUnit, NamedEntity, Parameter,
    Project, Publication, Resolved, RowId, Sample, Session, SessionKey,
};
use crate::domain::types::{AnalysisKind, GeoUnitKind};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, trace};

/// Session 日期的存储格式
pub const SESSION_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ==========================================
// 词表（名称唯一）
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vocabulary {
    Instrument,
    Method,
    Material,
    Unit,
}

impl Vocabulary {
    fn table(&self) -> &'static str {
        match self {
            Vocabulary::Instrument => "instrument",
            Vocabulary::Method => "method",
            Vocabulary::Material => "material",
            Vocabulary::Unit => "unit",
        }
    }
}

// ==========================================
// EntityRepository
// ==========================================
pub struct EntityRepository<'c> {
    conn: &'c Connection,
}

impl<'c> EntityRepository<'c> {
    /// 包装一个连接或事务（Transaction 可解引用为 Connection）
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    // ===== 词表 =====

    /// 按名称 get-or-create 词表项
    pub fn vocabulary(&self, vocab: Vocabulary, name: &str) -> RepositoryResult<Resolved<NamedEntity>> {
        let table = vocab.table();
        let existing: Option<RowId> = self
            .conn
            .query_row(
                &format!("SELECT id FROM {} WHERE name = ?1", table),
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            return Ok(Resolved::found(NamedEntity { id, name: name.to_string() }));
        }

        self.conn.execute(
            &format!("INSERT INTO {} (name) VALUES (?1)", table),
            params![name],
        )?;
        let id = self.conn.last_insert_rowid();
        trace!(table, name, id, "词表项已创建");
        Ok(Resolved::created(NamedEntity { id, name: name.to_string() }))
    }

    pub fn instrument(&self, name: &str) -> RepositoryResult<Resolved<NamedEntity>> {
        self.vocabulary(Vocabulary::Instrument, name)
    }

    pub fn method(&self, name: &str) -> RepositoryResult<Resolved<NamedEntity>> {
        self.vocabulary(Vocabulary::Method, name)
    }

    pub fn material(&self, name: &str) -> RepositoryResult<Resolved<NamedEntity>> {
        self.vocabulary(Vocabulary::Material, name)
    }

    pub fn unit(&self, name: &str) -> RepositoryResult<Resolved<NamedEntity>> {
        self.vocabulary(Vocabulary::Unit, name)
    }

    pub fn error_metric(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> RepositoryResult<Resolved<NamedEntity>> {
        let existing: Option<RowId> = self
            .conn
            .query_row(
                "SELECT id FROM error_metric WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            return Ok(Resolved::found(NamedEntity { id, name: name.to_string() }));
        }

        self.conn.execute(
            "INSERT INTO error_metric (name, description) VALUES (?1, ?2)",
            params![name, description],
        )?;
        Ok(Resolved::created(NamedEntity {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
        }))
    }

    pub fn parameter(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> RepositoryResult<Resolved<Parameter>> {
        let existing = self
            .conn
            .query_row(
                "SELECT id, name, description FROM parameter WHERE name = ?1",
                params![name],
                |row| {
                    Ok(Parameter {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                    })
                },
            )
            .optional()?;

        if let Some(parameter) = existing {
            return Ok(Resolved::found(parameter));
        }

        self.conn.execute(
            "INSERT INTO parameter (name, description) VALUES (?1, ?2)",
            params![name, description],
        )?;
        Ok(Resolved::created(Parameter {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
            description: description.map(str::to_string),
        }))
    }

    // ===== 样品 =====

    pub fn sample(&self, name: &str) -> RepositoryResult<Resolved<Sample>> {
        if let Some(sample) = self.find_sample(name)? {
            return Ok(Resolved::found(sample));
        }

        self.conn
            .execute("INSERT INTO sample (name) VALUES (?1)", params![name])?;
        let id = self.conn.last_insert_rowid();
        debug!(sample = name, id, "样品已创建");
        Ok(Resolved::created(Sample {
            id,
            name: name.to_string(),
            material_id: None,
            longitude: None,
            latitude: None,
        }))
    }

    pub fn find_sample(&self, name: &str) -> RepositoryResult<Option<Sample>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, material_id, longitude, latitude FROM sample WHERE name = ?1",
                params![name],
                map_sample,
            )
            .optional()?)
    }

    pub fn set_sample_location(
        &self,
        sample_id: RowId,
        longitude: f64,
        latitude: f64,
    ) -> RepositoryResult<()> {
        self.conn.execute(
            "UPDATE sample SET longitude = ?1, latitude = ?2 WHERE id = ?3",
            params![longitude, latitude, sample_id],
        )?;
        Ok(())
    }

    pub fn set_sample_material(&self, sample_id: RowId, material_id: RowId) -> RepositoryResult<()> {
        self.conn.execute(
            "UPDATE sample SET material_id = ?1 WHERE id = ?2",
            params![material_id, sample_id],
        )?;
        Ok(())
    }

    pub fn geo_unit(&self, name: &str, kind: GeoUnitKind) -> RepositoryResult<Resolved<GeoUnit>> {
        let existing: Option<RowId> = self
            .conn
            .query_row(
                "SELECT id FROM geo_unit WHERE name = ?1 AND kind = ?2",
                params![name, kind.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        let unit = |id| GeoUnit { id, name: name.to_string(), kind };
        if let Some(id) = existing {
            return Ok(Resolved::found(unit(id)));
        }

        self.conn.execute(
            "INSERT INTO geo_unit (name, kind) VALUES (?1, ?2)",
            params![name, kind.as_str()],
        )?;
        Ok(Resolved::created(unit(self.conn.last_insert_rowid())))
    }

    pub fn link_sample_geo_unit(&self, sample_id: RowId, geo_unit_id: RowId) -> RepositoryResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO sample_geo_unit (sample_id, geo_unit_id) VALUES (?1, ?2)",
            params![sample_id, geo_unit_id],
        )?;
        Ok(())
    }

    // ===== 测试会话 =====

    pub fn session(&self, key: &SessionKey) -> RepositoryResult<Resolved<Session>> {
        let date = key.date.format(SESSION_DATE_FORMAT).to_string();
        let existing = self
            .conn
            .query_row(
                r#"
                SELECT id, sample_id, instrument_id, method_id, target_id, date, date_precision, data
                FROM session
                WHERE sample_id = ?1 AND instrument_id = ?2 AND method_id = ?3 AND date = ?4
                "#,
                params![key.sample_id, key.instrument_id, key.method_id, date],
                map_session,
            )
            .optional()?;

        if let Some(session) = existing {
            return Ok(Resolved::found(session));
        }

        self.conn.execute(
            r#"
            INSERT INTO session (sample_id, instrument_id, method_id, target_id, date, data)
            VALUES (?1, ?2, ?3, ?4, ?5, '{}')
            "#,
            params![key.sample_id, key.instrument_id, key.method_id, key.target_id, date],
        )?;
        Ok(Resolved::created(Session {
            id: self.conn.last_insert_rowid(),
            sample_id: key.sample_id,
            instrument_id: key.instrument_id,
            method_id: key.method_id,
            target_id: key.target_id,
            date: key.date,
            date_precision: None,
            data: serde_json::json!({}),
        }))
    }

    pub fn set_session_date_precision(&self, session_id: RowId, precision: &str) -> RepositoryResult<()> {
        self.conn.execute(
            "UPDATE session SET date_precision = ?1 WHERE id = ?2",
            params![precision, session_id],
        )?;
        Ok(())
    }

    pub fn set_session_data(&self, session_id: RowId, data: &serde_json::Value) -> RepositoryResult<()> {
        self.conn.execute(
            "UPDATE session SET data = ?1 WHERE id = ?2",
            params![serde_json::to_string(data)?, session_id],
        )?;
        Ok(())
    }

    /// 样品下已关联的全部 session（按 id 顺序）
    pub fn sessions_for_sample(&self, sample_id: RowId) -> RepositoryResult<Vec<Session>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, sample_id, instrument_id, method_id, target_id, date, date_precision, data
            FROM session WHERE sample_id = ?1 ORDER BY id
            "#,
        )?;
        let sessions = stmt
            .query_map(params![sample_id], map_session)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    // ===== 分析 =====

    /// 自然键: (session, 分析类型, session_index)
    pub fn analysis(
        &self,
        session_id: RowId,
        kind: AnalysisKind,
        session_index: Option<i64>,
    ) -> RepositoryResult<Resolved<Analysis>> {
        let existing = self
            .conn
            .query_row(
                r#"
                SELECT id, session_id, analysis_type, session_index, analysis_name,
                       is_interpreted, is_computed, in_plateau, data
                FROM analysis
                WHERE session_id = ?1 AND analysis_type = ?2 AND session_index IS ?3
                "#,
                params![session_id, kind.as_str(), session_index],
                map_analysis,
            )
            .optional()?;

        if let Some(analysis) = existing {
            return Ok(Resolved::found(analysis?));
        }

        let interpreted = kind.is_interpreted();
        self.conn.execute(
            r#"
            INSERT INTO analysis (session_id, analysis_type, session_index, is_interpreted, is_computed)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![session_id, kind.as_str(), session_index, interpreted, interpreted],
        )?;
        Ok(Resolved::created(Analysis {
            id: self.conn.last_insert_rowid(),
            session_id,
            kind,
            session_index,
            analysis_name: None,
            is_interpreted: interpreted,
            is_computed: interpreted,
            in_plateau: None,
            data: None,
        }))
    }

    /// 更新分析的可变属性
    pub fn update_analysis(
        &self,
        analysis_id: RowId,
        analysis_name: Option<&str>,
        in_plateau: Option<bool>,
        data: Option<&serde_json::Value>,
    ) -> RepositoryResult<()> {
        let data = data.map(serde_json::to_string).transpose()?;
        self.conn.execute(
            "UPDATE analysis SET analysis_name = ?1, in_plateau = ?2, data = ?3 WHERE id = ?4",
            params![analysis_name, in_plateau, data, analysis_id],
        )?;
        Ok(())
    }

    pub fn analyses_for_session(&self, session_id: RowId) -> RepositoryResult<Vec<Analysis>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, session_id, analysis_type, session_index, analysis_name,
                   is_interpreted, is_computed, in_plateau, data
            FROM analysis WHERE session_id = ?1
            ORDER BY session_index IS NULL, session_index, id
            "#,
        )?;
        let rows = stmt
            .query_map(params![session_id], map_analysis)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().collect()
    }

    // ===== 数据值 =====

    /// 自然键 (analysis, parameter)；已存在则就地更新数值
    pub fn datum(&self, analysis_id: RowId, input: &DatumInput) -> RepositoryResult<Resolved<Datum>> {
        let parameter = self.parameter(&input.parameter, None)?.into_inner();
        let unit = self.unit(&input.unit)?.into_inner();
        let metric_id = match &input.error_metric {
            Some(metric) => Some(self.error_metric(metric, None)?.into_inner().id),
            None => None,
        };

        let existing: Option<RowId> = self
            .conn
            .query_row(
                "SELECT id FROM datum WHERE analysis_id = ?1 AND parameter_id = ?2",
                params![analysis_id, parameter.id],
                |row| row.get(0),
            )
            .optional()?;

        let datum = |id| Datum {
            id,
            analysis_id,
            parameter: input.parameter.clone(),
            value: input.value,
            error: input.error,
            error_metric: input.error_metric.clone(),
            unit: Some(input.unit.clone()),
            description: input.description.clone(),
        };

        match existing {
            Some(id) => {
                self.conn.execute(
                    r#"
                    UPDATE datum SET value = ?1, error = ?2, unit_id = ?3, error_metric_id = ?4,
                                     description = ?5
                    WHERE id = ?6
                    "#,
                    params![input.value, input.error, unit.id, metric_id, input.description, id],
                )?;
                Ok(Resolved::found(datum(id)))
            }
            None => {
                self.conn.execute(
                    r#"
                    INSERT INTO datum (analysis_id, parameter_id, unit_id, error_metric_id,
                                       value, error, description)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    "#,
                    params![
                        analysis_id,
                        parameter.id,
                        unit.id,
                        metric_id,
                        input.value,
                        input.error,
                        input.description
                    ],
                )?;
                Ok(Resolved::created(datum(self.conn.last_insert_rowid())))
            }
        }
    }

    pub fn data_for_analysis(&self, analysis_id: RowId) -> RepositoryResult<Vec<Datum>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT d.id, d.analysis_id, p.name, d.value, d.error, m.name, u.name, d.description
            FROM datum d
            JOIN parameter p ON p.id = d.parameter_id
            LEFT JOIN unit u ON u.id = d.unit_id
            LEFT JOIN error_metric m ON m.id = d.error_metric_id
            WHERE d.analysis_id = ?1
            ORDER BY d.id
            "#,
        )?;
        let rows = stmt
            .query_map(params![analysis_id], |row| {
                Ok(Datum {
                    id: row.get(0)?,
                    analysis_id: row.get(1)?,
                    parameter: row.get(2)?,
                    value: row.get(3)?,
                    error: row.get(4)?,
                    error_metric: row.get(5)?,
                    unit: row.get(6)?,
                    description: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ===== 常数 =====

    /// 自然键 (session, name)；已存在则就地更新
    pub fn constant(&self, session_id: RowId, input: &ConstantInput) -> RepositoryResult<Resolved<Constant>> {
        let unit_id = match &input.unit {
            Some(unit) => Some(self.unit(unit)?.into_inner().id),
            None => None,
        };
        let metric_id = match &input.error_metric {
            Some(metric) => Some(self.error_metric(metric, None)?.into_inner().id),
            None => None,
        };

        let existing: Option<RowId> = self
            .conn
            .query_row(
                "SELECT id FROM constant WHERE session_id = ?1 AND name = ?2",
                params![session_id, input.name],
                |row| row.get(0),
            )
            .optional()?;

        let constant = |id| Constant {
            id,
            session_id,
            name: input.name.clone(),
            label: input.label.clone(),
            value: input.value,
            error: input.error,
            unit: input.unit.clone(),
        };

        match existing {
            Some(id) => {
                self.conn.execute(
                    r#"
                    UPDATE constant SET label = ?1, value = ?2, error = ?3, unit_id = ?4,
                                        error_metric_id = ?5
                    WHERE id = ?6
                    "#,
                    params![input.label, input.value, input.error, unit_id, metric_id, id],
                )?;
                Ok(Resolved::found(constant(id)))
            }
            None => {
                self.conn.execute(
                    r#"
                    INSERT INTO constant (session_id, name, label, value, error, unit_id, error_metric_id)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    "#,
                    params![
                        session_id,
                        input.name,
                        input.label,
                        input.value,
                        input.error,
                        unit_id,
                        metric_id
                    ],
                )?;
                Ok(Resolved::created(constant(self.conn.last_insert_rowid())))
            }
        }
    }

    pub fn constants_for_session(&self, session_id: RowId) -> RepositoryResult<Vec<Constant>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT c.id, c.session_id, c.name, c.label, c.value, c.error, u.name
            FROM constant c LEFT JOIN unit u ON u.id = c.unit_id
            WHERE c.session_id = ?1 ORDER BY c.id
            "#,
        )?;
        let rows = stmt
            .query_map(params![session_id], |row| {
                Ok(Constant {
                    id: row.get(0)?,
                    session_id: row.get(1)?,
                    name: row.get(2)?,
                    label: row.get(3)?,
                    value: row.get(4)?,
                    error: row.get(5)?,
                    unit: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ===== 文献与项目 =====

    /// 自然键: DOI（若有），否则原始链接
    pub fn publication(
        &self,
        doi: Option<&str>,
        link: Option<&str>,
    ) -> RepositoryResult<Resolved<Publication>> {
        let existing = match (doi, link) {
            (Some(doi), _) => self
                .conn
                .query_row(
                    "SELECT id, doi, link, title, author, journal, year FROM publication WHERE doi = ?1",
                    params![doi],
                    map_publication,
                )
                .optional()?,
            (None, Some(link)) => self
                .conn
                .query_row(
                    r#"
                    SELECT id, doi, link, title, author, journal, year
                    FROM publication WHERE doi IS NULL AND link = ?1
                    "#,
                    params![link],
                    map_publication,
                )
                .optional()?,
            (None, None) => {
                return Err(RepositoryError::FieldValueError {
                    field: "doi".to_string(),
                    message: "文献缺少 DOI 与链接，无法确定自然键".to_string(),
                })
            }
        };

        if let Some(publication) = existing {
            return Ok(Resolved::found(publication));
        }

        self.conn.execute(
            "INSERT INTO publication (doi, link) VALUES (?1, ?2)",
            params![doi, link],
        )?;
        Ok(Resolved::created(Publication {
            id: self.conn.last_insert_rowid(),
            doi: doi.map(str::to_string),
            link: link.map(str::to_string),
            title: None,
            author: None,
            journal: None,
            year: None,
        }))
    }

    pub fn update_publication_details(
        &self,
        publication_id: RowId,
        title: Option<&str>,
        author: Option<&str>,
        journal: Option<&str>,
        year: Option<i32>,
    ) -> RepositoryResult<()> {
        self.conn.execute(
            r#"
            UPDATE publication
            SET title = COALESCE(?1, title),
                author = COALESCE(?2, author),
                journal = COALESCE(?3, journal),
                year = COALESCE(?4, year)
            WHERE id = ?5
            "#,
            params![title, author, journal, year, publication_id],
        )?;
        Ok(())
    }

    pub fn project(&self, name: &str, description: Option<&str>) -> RepositoryResult<Resolved<Project>> {
        let existing = self
            .conn
            .query_row(
                "SELECT id, name, description FROM project WHERE name = ?1",
                params![name],
                |row| {
                    Ok(Project {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                    })
                },
            )
            .optional()?;

        if let Some(project) = existing {
            return Ok(Resolved::found(project));
        }

        self.conn.execute(
            "INSERT INTO project (name, description) VALUES (?1, ?2)",
            params![name, description],
        )?;
        Ok(Resolved::created(Project {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
            description: description.map(str::to_string),
        }))
    }

    pub fn link_project_publication(&self, project_id: RowId, publication_id: RowId) -> RepositoryResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO project_publication (project_id, publication_id) VALUES (?1, ?2)",
            params![project_id, publication_id],
        )?;
        Ok(())
    }

    pub fn link_project_sample(&self, project_id: RowId, sample_id: RowId) -> RepositoryResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO project_sample (project_id, sample_id) VALUES (?1, ?2)",
            params![project_id, sample_id],
        )?;
        Ok(())
    }

    pub fn link_project_session(&self, project_id: RowId, session_id: RowId) -> RepositoryResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO project_session (project_id, session_id) VALUES (?1, ?2)",
            params![project_id, session_id],
        )?;
        Ok(())
    }
}

// ==========================================
// 行映射
// ==========================================

fn map_sample(row: &Row<'_>) -> rusqlite::Result<Sample> {
    Ok(Sample {
        id: row.get(0)?,
        name: row.get(1)?,
        material_id: row.get(2)?,
        longitude: row.get(3)?,
        latitude: row.get(4)?,
    })
}

fn map_session(row: &Row<'_>) -> rusqlite::Result<Session> {
    let raw_date: String = row.get(5)?;
    let date = NaiveDateTime::parse_from_str(&raw_date, SESSION_DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let raw_data: String = row.get(7)?;
    let data = serde_json::from_str(&raw_data).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Session {
        id: row.get(0)?,
        sample_id: row.get(1)?,
        instrument_id: row.get(2)?,
        method_id: row.get(3)?,
        target_id: row.get(4)?,
        date,
        date_precision: row.get(6)?,
        data,
    })
}

/// 分析类型未知时返回仓储错误（外层 rusqlite::Result 只承载 SQL 错误）
fn map_analysis(row: &Row<'_>) -> rusqlite::Result<RepositoryResult<Analysis>> {
    let raw_kind: String = row.get(2)?;
    let kind = match raw_kind.as_str() {
        "Heating step" => AnalysisKind::HeatingStep,
        "Age Plateau" => AnalysisKind::AgePlateau,
        "Total Fusion Age" => AnalysisKind::TotalFusionAge,
        other => {
            return Ok(Err(RepositoryError::FieldValueError {
                field: "analysis_type".to_string(),
                message: format!("未知分析类型: {}", other),
            }))
        }
    };
    let raw_data: Option<String> = row.get(8)?;
    let data = match raw_data {
        Some(raw) => match serde_json::from_str(&raw) {
            Ok(v) => Some(v),
            Err(e) => return Ok(Err(e.into())),
        },
        None => None,
    };

    Ok(Ok(Analysis {
        id: row.get(0)?,
        session_id: row.get(1)?,
        kind,
        session_index: row.get(3)?,
        analysis_name: row.get(4)?,
        is_interpreted: row.get(5)?,
        is_computed: row.get(6)?,
        in_plateau: row.get(7)?,
        data,
    }))
}

fn map_publication(row: &Row<'_>) -> rusqlite::Result<Publication> {
    Ok(Publication {
        id: row.get(0)?,
        doi: row.get(1)?,
        link: row.get(2)?,
        title: row.get(3)?,
        author: row.get(4)?,
        journal: row.get(5)?,
        year: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::LabDatabase;
    use chrono::NaiveDate;

    fn test_db() -> LabDatabase {
        let db = LabDatabase::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    fn session_key(repo: &EntityRepository<'_>) -> SessionKey {
        let sample = repo.sample("WA-01").unwrap().into_inner();
        let instrument = repo.instrument("MAP 215-50").unwrap().into_inner();
        let method = repo.method("Ar/Ar Incremental Heating").unwrap().into_inner();
        SessionKey {
            sample_id: sample.id,
            instrument_id: instrument.id,
            method_id: method.id,
            target_id: None,
            date: NaiveDate::from_ymd_opt(2020, 3, 14)
                .unwrap()
                .and_hms_opt(9, 26, 53)
                .unwrap(),
        }
    }

    #[test]
    fn test_sample_get_or_create() {
        let db = test_db();
        let repo = EntityRepository::new(db.connection());

        let first = repo.sample("WA-01").unwrap();
        let second = repo.sample("WA-01").unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.value.id, second.value.id);
    }

    #[test]
    fn test_session_natural_key() {
        let db = test_db();
        let repo = EntityRepository::new(db.connection());
        let key = session_key(&repo);

        let first = repo.session(&key).unwrap();
        let again = repo.session(&key).unwrap();
        assert!(first.created);
        assert!(!again.created);
        assert_eq!(again.value.date, key.date);

        let mut later = key.clone();
        later.date = later.date + chrono::Duration::seconds(1);
        assert!(repo.session(&later).unwrap().created);
    }

    #[test]
    fn test_analysis_key_distinguishes_interpreted_ages() {
        let db = test_db();
        let repo = EntityRepository::new(db.connection());
        let session = repo.session(&session_key(&repo)).unwrap().into_inner();

        let step0 = repo.analysis(session.id, AnalysisKind::HeatingStep, Some(0)).unwrap();
        let step0_again = repo.analysis(session.id, AnalysisKind::HeatingStep, Some(0)).unwrap();
        let fusion = repo.analysis(session.id, AnalysisKind::TotalFusionAge, None).unwrap();
        let fusion_again = repo.analysis(session.id, AnalysisKind::TotalFusionAge, None).unwrap();

        assert!(step0.created && !step0_again.created);
        assert!(fusion.created && !fusion_again.created);
        assert!(fusion.value.is_interpreted);
        assert_eq!(repo.analyses_for_session(session.id).unwrap().len(), 2);
    }

    #[test]
    fn test_datum_upsert_updates_value() {
        let db = test_db();
        let repo = EntityRepository::new(db.connection());
        let session = repo.session(&session_key(&repo)).unwrap().into_inner();
        let analysis = repo
            .analysis(session.id, AnalysisKind::HeatingStep, Some(0))
            .unwrap()
            .into_inner();

        let input = DatumInput::new("Age", 12.5, "Ma").with_error(Some(0.2), Some("2s".to_string()));
        assert!(repo.datum(analysis.id, &input).unwrap().created);

        let updated = DatumInput::new("Age", 12.7, "Ma");
        assert!(!repo.datum(analysis.id, &updated).unwrap().created);

        let data = repo.data_for_analysis(analysis.id).unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].value, 12.7);
        assert_eq!(data[0].error_metric, None);
    }

    #[test]
    fn test_publication_doi_and_link_keys() {
        let db = test_db();
        let repo = EntityRepository::new(db.connection());

        let by_doi = repo.publication(Some("10.1130/B35432.1"), None).unwrap();
        let by_doi_again = repo.publication(Some("10.1130/B35432.1"), None).unwrap();
        assert!(by_doi.created && !by_doi_again.created);

        let by_link = repo.publication(None, Some("https://example.org/paper")).unwrap();
        assert!(by_link.created);
        assert!(repo.publication(None, None).is_err());
    }
}
