// ==========================================
// WiscAr 导入管道 - SQLite 连接与工作单元
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 建库/词表种子为幂等步骤，只在迁移时执行一次
// - 每个源文件/分组一个事务（commit / rollback 为工作单元边界）
// ==========================================

use crate::repository::catalog_repo::seed_catalog;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{Connection, OptionalExtension, Transaction};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version（与 `sql/schema.sql` 对齐）
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 建库脚本
pub const SCHEMA_SQL: &str = include_str!("../sql/schema.sql");

/// 批次结束后的清理脚本
pub const CLEANUP_SQL: &str = include_str!("../sql/cleanup.sql");

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection<P: AsRef<Path>>(db_path: P) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

// ==========================================
// LabDatabase - 实验室数据库
// ==========================================
pub struct LabDatabase {
    conn: Connection,
}

impl LabDatabase {
    /// 打开数据库文件（不执行迁移）
    pub fn open<P: AsRef<Path>>(db_path: P) -> RepositoryResult<Self> {
        let path = db_path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    RepositoryError::DatabaseConnectionError(format!(
                        "无法创建数据库目录 {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let conn = open_sqlite_connection(path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        debug!(db_path = %path.display(), "数据库连接已打开");
        Ok(Self { conn })
    }

    /// 打开内存数据库（测试与演示用）
    pub fn open_in_memory() -> RepositoryResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        configure_sqlite_connection(&conn)?;
        Ok(Self { conn })
    }

    /// 打开并迁移（常用入口）
    pub fn open_and_migrate<P: AsRef<Path>>(db_path: P) -> RepositoryResult<Self> {
        let db = Self::open(db_path)?;
        db.migrate()?;
        Ok(db)
    }

    /// 建表 + 词表种子（幂等）
    pub fn migrate(&self) -> RepositoryResult<()> {
        match read_schema_version(&self.conn)? {
            Some(v) if v > CURRENT_SCHEMA_VERSION => {
                warn!(
                    db_version = v,
                    expected = CURRENT_SCHEMA_VERSION,
                    "数据库 schema 版本高于当前代码，可能存在不兼容"
                );
            }
            Some(v) if v == CURRENT_SCHEMA_VERSION => {
                debug!(version = v, "schema 已是最新版本");
            }
            _ => {}
        }

        self.conn.execute_batch(SCHEMA_SQL)?;
        self.conn.execute(
            "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
            [CURRENT_SCHEMA_VERSION],
        )?;

        let seeded = seed_catalog(&self.conn)?;
        if seeded > 0 {
            info!(created = seeded, "参数目录种子写入完成");
        }
        Ok(())
    }

    /// 只读访问底层连接
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// 在一个事务中执行工作单元
    ///
    /// - 闭包返回 Ok: 提交
    /// - 闭包返回 Err: 回滚并原样返回错误
    ///
    /// 事务内的写入对同一事务中的后续查询立即可见（相当于 flush）。
    pub fn unit_of_work<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
        E: From<rusqlite::Error>,
    {
        let tx = self.conn.transaction()?;
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(error = %rollback_err, "事务回滚失败");
                }
                Err(e)
            }
        }
    }

    /// 执行原始 SQL 脚本（清理/扩展脚本）
    pub fn exec_sql_script(&self, script_name: &str, sql: &str) -> RepositoryResult<()> {
        debug!(script = script_name, "执行 SQL 脚本");
        self.conn
            .execute_batch(sql)
            .map_err(|e| RepositoryError::ScriptError {
                script: script_name.to_string(),
                message: e.to_string(),
            })
    }

    /// 批次结束后的清理
    pub fn run_cleanup(&self) -> RepositoryResult<()> {
        self.exec_sql_script("cleanup.sql", CLEANUP_SQL)
    }
}
