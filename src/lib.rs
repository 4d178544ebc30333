// ==========================================
// WiscAr 导入管道 - 核心库
// ==========================================
// 职责: Ar/Ar 实验室数据文件 → SQLite 实验室数据库
// 技术栈: Rust + SQLite (rusqlite) + calamine
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 环境变量与导入选项
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/工作单元）
pub mod db;

// 日志系统
pub mod logging;

// 宿主插件（指标路由、schema 扩展）
pub mod plugins;

// ==========================================
// 重导出核心类型
// ==========================================

pub use db::LabDatabase;
pub use domain::types::{AnalysisKind, GeoUnitKind, HeatingVariable, ImportStatus};
pub use domain::{Analysis, Datum, Resolved, Sample, Session};
pub use importer::{ImportError, ImportLoop, ImportResult, MetadataImporter, SessionImporter};
pub use repository::{EntityRepository, RepositoryError};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "WiscAr 数据导入管道";
