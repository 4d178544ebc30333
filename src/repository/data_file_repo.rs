// ==========================================
// WiscAr 导入管道 - 数据文件簿记 Repository
// ==========================================
// 职责: 记录每个源文件的导入状态，供 redo/跳过判断
// ==========================================

use crate::domain::entities::{DataFileRecord, RowId};
use crate::domain::types::ImportStatus;
use crate::repository::error::RepositoryResult;
use rusqlite::{params, Connection, OptionalExtension};

pub struct DataFileRepository<'c> {
    conn: &'c Connection,
}

impl<'c> DataFileRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// 按文件路径查询
    pub fn find(&self, file_path: &str) -> RepositoryResult<Option<DataFileRecord>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT id, file_path, file_mtime, import_status, import_error, batch_id
                FROM data_file WHERE file_path = ?1
                "#,
                params![file_path],
                |row| {
                    let status: String = row.get(3)?;
                    Ok(DataFileRecord {
                        id: row.get(0)?,
                        file_path: row.get(1)?,
                        file_mtime: row.get(2)?,
                        import_status: ImportStatus::parse(&status),
                        import_error: row.get(4)?,
                        batch_id: row.get(5)?,
                    })
                },
            )
            .optional()?)
    }

    /// 写入/覆盖导入结果，返回 data_file.id
    pub fn record_result(
        &self,
        file_path: &str,
        file_mtime: &str,
        status: ImportStatus,
        import_error: Option<&str>,
        batch_id: &str,
    ) -> RepositoryResult<RowId> {
        self.conn.execute(
            r#"
            INSERT INTO data_file (file_path, file_mtime, import_status, import_error, batch_id)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(file_path) DO UPDATE SET
                file_mtime = excluded.file_mtime,
                import_status = excluded.import_status,
                import_error = excluded.import_error,
                batch_id = excluded.batch_id,
                imported_at = datetime('now')
            "#,
            params![file_path, file_mtime, status.as_str(), import_error, batch_id],
        )?;

        let id = self.conn.query_row(
            "SELECT id FROM data_file WHERE file_path = ?1",
            params![file_path],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// 关联该文件导入产生的顶层 session
    pub fn link_session(&self, data_file_id: RowId, session_id: RowId) -> RepositoryResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO data_file_link (data_file_id, session_id) VALUES (?1, ?2)",
            params![data_file_id, session_id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::LabDatabase;

    #[test]
    fn test_record_result_overwrites_status() {
        let db = LabDatabase::open_in_memory().unwrap();
        db.migrate().unwrap();
        let repo = DataFileRepository::new(db.connection());

        let id = repo
            .record_result("a.xls", "2020-01-01 00:00:00", ImportStatus::Failed, Some("boom"), "b1")
            .unwrap();
        let id2 = repo
            .record_result("a.xls", "2020-01-01 00:00:00", ImportStatus::Success, None, "b2")
            .unwrap();
        assert_eq!(id, id2);

        let record = repo.find("a.xls").unwrap().unwrap();
        assert_eq!(record.import_status, ImportStatus::Success);
        assert_eq!(record.import_error, None);
        assert_eq!(record.batch_id.as_deref(), Some("b2"));
        assert!(repo.find("missing.xls").unwrap().is_none());
    }
}
