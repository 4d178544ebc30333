// ==========================================
// WiscAr 导入管道 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、固定参数目录
// 红线: 不含数据访问逻辑,不含导入逻辑
// ==========================================

pub mod catalog;
pub mod entities;
pub mod types;

// 重导出核心类型
pub use catalog::{ParameterDef, INSTRUMENT_NAME, PARAMETER_CATALOG};
pub use entities::{
    Analysis, Constant, ConstantInput, DataFileRecord, Datum, DatumInput, GeoUnit, NamedEntity,
    Parameter, Project, Publication, Resolved, RowId, Sample, Session, SessionKey,
};
pub use types::{AnalysisKind, GeoUnitKind, HeatingVariable, ImportStatus};
