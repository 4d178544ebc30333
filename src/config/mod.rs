// ==========================================
// WiscAr 导入管道 - 配置层
// ==========================================
// 职责: 环境变量配置（数据目录/数据库路径）与命令行导入选项
// ==========================================

pub mod import_config;

pub use import_config::{
    default_db_path, ImportConfig, ImportOptions, DATA_DIR_ENV, DB_PATH_ENV,
};
