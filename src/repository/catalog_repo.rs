// ==========================================
// WiscAr 导入管道 - 参数目录种子
// ==========================================
// 职责: 幂等写入固定词表（参数/单位/误差度量）
// 调用: LabDatabase::migrate（每个数据库一次，不随导入器构造重复执行）
// ==========================================

use crate::domain::catalog::{ERROR_METRICS, PARAMETER_CATALOG, UNITS};
use crate::repository::entity_repo::EntityRepository;
use crate::repository::error::RepositoryResult;
use rusqlite::Connection;

/// 写入参数目录，返回本次新建的条目数
pub fn seed_catalog(conn: &Connection) -> RepositoryResult<usize> {
    let repo = EntityRepository::new(conn);
    let mut created = 0;

    for unit in UNITS {
        if repo.unit(unit)?.created {
            created += 1;
        }
    }

    for (name, description) in ERROR_METRICS {
        if repo.error_metric(name, Some(description))?.created {
            created += 1;
        }
    }

    for def in PARAMETER_CATALOG.iter() {
        if repo.parameter(def.name, Some(def.description))?.created {
            created += 1;
        }
    }

    Ok(created)
}
