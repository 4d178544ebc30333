// ==========================================
// WiscAr 导入管道 - 批量导入循环
// ==========================================
// 职责: 扫描数据目录，逐文件调用导入器，记录 data_file 簿记
// 规则:
// - 每批次一个 batch_id (uuid v4)
// - 已成功导入且修改时间未变的文件跳过（--redo 强制重导）
// - 单文件失败记录后继续，--stop-on-error 时终止批次
// - 批次结束执行清理脚本
// ==========================================

use crate::config::ImportOptions;
use crate::db::LabDatabase;
use crate::domain::entities::RowId;
use crate::domain::types::ImportStatus;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::file_mtime;
use crate::importer::metadata_importer::MetadataImporter;
use crate::importer::session_importer::SessionImporter;
use crate::repository::{DataFileRepository, SESSION_DATE_FORMAT};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, instrument, warn, Span};
use uuid::Uuid;
use walkdir::WalkDir;

// ==========================================
// FileImporter - 单文件导入器接口
// ==========================================
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileOutcome {
    pub session_ids: Vec<RowId>, // 需关联到 data_file 的顶层 session
    pub failures: Vec<String>,   // 文件内部分失败（分组级）
}

pub trait FileImporter {
    fn name(&self) -> &'static str;

    /// 可处理的扩展名（小写，不含点）
    fn extensions(&self) -> &'static [&'static str];

    fn import_file(&self, db: &mut LabDatabase, path: &Path) -> ImportResult<FileOutcome>;
}

impl FileImporter for SessionImporter {
    fn name(&self) -> &'static str {
        "import-map"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["xls"]
    }

    fn import_file(&self, db: &mut LabDatabase, path: &Path) -> ImportResult<FileOutcome> {
        let session = SessionImporter::import_file(self, db, path)?;
        Ok(FileOutcome {
            session_ids: vec![session.id],
            failures: Vec::new(),
        })
    }
}

impl FileImporter for MetadataImporter {
    fn name(&self) -> &'static str {
        "import-metadata"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["xlsx", "csv"]
    }

    fn import_file(&self, db: &mut LabDatabase, path: &Path) -> ImportResult<FileOutcome> {
        let summary = MetadataImporter::import_file(self, db, path)?;
        Ok(FileOutcome {
            session_ids: Vec::new(),
            failures: summary
                .failures
                .iter()
                .map(|f| format!("{}: {}", f.group, f.error))
                .collect(),
        })
    }
}

// ==========================================
// 文件扫描
// ==========================================

/// 递归扫描目录，返回按路径排序的匹配文件（跳过 Office 锁文件 "~$*"）
pub fn scan_files(root: &Path, extensions: &[&str]) -> ImportResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|e| ImportError::FileReadError(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let is_lock_file = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("~$"))
            .unwrap_or(false);
        let matches_ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| extensions.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false);
        if matches_ext && !is_lock_file {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

// ==========================================
// ImportLoop
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub batch_id: String,
    pub imported: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct ImportLoop<'db> {
    db: &'db mut LabDatabase,
    options: ImportOptions,
}

impl<'db> ImportLoop<'db> {
    pub fn new(db: &'db mut LabDatabase, options: ImportOptions) -> Self {
        Self { db, options }
    }

    /// 扫描目录并导入
    pub fn run<I: FileImporter>(&mut self, importer: &I, root: &Path) -> ImportResult<BatchSummary> {
        let files = scan_files(root, importer.extensions())?;
        info!(importer = importer.name(), root = %root.display(), count = files.len(), "扫描到待导入文件");
        self.run_files(importer, &files)
    }

    /// 导入给定文件列表
    #[instrument(skip_all, fields(importer = importer.name(), batch_id))]
    pub fn run_files<I: FileImporter>(
        &mut self,
        importer: &I,
        files: &[PathBuf],
    ) -> ImportResult<BatchSummary> {
        let batch_id = Uuid::new_v4().to_string();
        Span::current().record("batch_id", batch_id.as_str());

        let mut summary = BatchSummary {
            batch_id: batch_id.clone(),
            ..Default::default()
        };

        for path in files {
            let path_str = path.display().to_string();
            let mtime = match file_mtime(path) {
                Ok(t) => t.format(SESSION_DATE_FORMAT).to_string(),
                Err(e) => {
                    error!(file = %path_str, error = %e, "无法读取文件修改时间");
                    summary.failed += 1;
                    if self.options.stop_on_error {
                        return Err(e);
                    }
                    continue;
                }
            };

            if !self.options.redo && self.already_imported(&path_str, &mtime)? {
                debug!(file = %path_str, "已导入且未修改，跳过");
                summary.skipped += 1;
                continue;
            }

            info!(file = %path_str, "开始导入文件");
            match importer.import_file(self.db, path) {
                Ok(outcome) if outcome.failures.is_empty() => {
                    self.record(&path_str, &mtime, ImportStatus::Success, None, &batch_id, &outcome.session_ids)?;
                    summary.imported += 1;
                }
                Ok(outcome) => {
                    let message = outcome.failures.join("; ");
                    warn!(file = %path_str, failures = outcome.failures.len(), "文件部分导入失败");
                    self.record(
                        &path_str,
                        &mtime,
                        ImportStatus::Failed,
                        Some(&message),
                        &batch_id,
                        &outcome.session_ids,
                    )?;
                    summary.failed += 1;
                }
                Err(e) => {
                    error!(file = %path_str, error = %e, "文件导入失败，已回滚");
                    self.record(&path_str, &mtime, ImportStatus::Failed, Some(&e.to_string()), &batch_id, &[])?;
                    summary.failed += 1;
                    if self.options.stop_on_error {
                        return Err(e);
                    }
                }
            }
        }

        self.db.run_cleanup()?;

        info!(
            imported = summary.imported,
            skipped = summary.skipped,
            failed = summary.failed,
            "批量导入完成"
        );
        Ok(summary)
    }

    fn already_imported(&self, path: &str, mtime: &str) -> ImportResult<bool> {
        let existing = DataFileRepository::new(self.db.connection()).find(path)?;
        Ok(existing
            .map(|r| r.import_status == ImportStatus::Success && r.file_mtime == mtime)
            .unwrap_or(false))
    }

    fn record(
        &mut self,
        path: &str,
        mtime: &str,
        status: ImportStatus,
        import_error: Option<&str>,
        batch_id: &str,
        session_ids: &[RowId],
    ) -> ImportResult<()> {
        self.db.unit_of_work(|tx| {
            let repo = DataFileRepository::new(tx);
            let data_file_id = repo.record_result(path, mtime, status, import_error, batch_id)?;
            for session_id in session_ids {
                repo.link_session(data_file_id, *session_id)?;
            }
            Ok::<_, ImportError>(())
        })
    }
}
