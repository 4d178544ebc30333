// ==========================================
// WiscAr 导入管道 - 导入层
// ==========================================
// 职责: 外部数据文件 → 实验室实体图
// 支持: ArArCalc 报表 (.xls/.xlsx), 样品元数据表 (.xlsx/.csv)
// ==========================================

// 模块声明
pub mod error;
pub mod file_parser;
pub mod import_loop;
pub mod metadata_importer;
pub mod session_importer;
pub mod table_extractor;
pub mod value_parser;

// 重导出核心类型
pub use error::{ImportError, ImportResult};
pub use file_parser::{CsvParser, ExcelParser, RecordParser, UniversalFileParser};
pub use import_loop::{scan_files, BatchSummary, FileImporter, FileOutcome, ImportLoop};
pub use metadata_importer::{MetadataImporter, MetadataRow, MetadataSummary};
pub use session_importer::{GeneralInfo, SessionImporter};
pub use table_extractor::{extract_data_tables, ExtractedTables};
