// ==========================================
// WiscAr 导入管道 - 数据仓储层
// ==========================================
// 职责: 实体 get-or-create、词表种子、导入簿记
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

pub mod catalog_repo;
pub mod data_file_repo;
pub mod entity_repo;
pub mod error;

pub use catalog_repo::seed_catalog;
pub use data_file_repo::DataFileRepository;
pub use entity_repo::{EntityRepository, Vocabulary, SESSION_DATE_FORMAT};
pub use error::{RepositoryError, RepositoryResult};
