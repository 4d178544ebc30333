// ==========================================
// WiscAr 导入管道 - 导入配置
// ==========================================
// 来源: 环境变量
//   SPARROW_DATA_DIR - 数据文件根目录（必填，且须为目录）
//   LAB_DB_PATH      - SQLite 数据库路径（可选）
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use std::path::{Path, PathBuf};

/// 数据目录环境变量
pub const DATA_DIR_ENV: &str = "SPARROW_DATA_DIR";

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "LAB_DB_PATH";

/// 默认数据库路径: <data_dir>/wiscar-import/lab.db
pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wiscar-import")
        .join("lab.db")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportConfig {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
}

impl ImportConfig {
    /// 从进程环境读取
    pub fn from_env() -> ImportResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源读取（测试注入）
    pub fn from_lookup<F>(lookup: F) -> ImportResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_dir = lookup(DATA_DIR_ENV)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                ImportError::ConfigError(format!("环境变量 {} 未设置", DATA_DIR_ENV))
            })?;
        let data_dir = PathBuf::from(raw_dir.trim());
        if !data_dir.is_dir() {
            return Err(ImportError::ConfigError(format!(
                "{} 不是目录: {}",
                DATA_DIR_ENV,
                data_dir.display()
            )));
        }

        let db_path = lookup(DB_PATH_ENV)
            .filter(|v| !v.trim().is_empty())
            .map(|v| PathBuf::from(v.trim()))
            .unwrap_or_else(default_db_path);

        Ok(Self { data_dir, db_path })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

/// 命令行导入选项
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    pub redo: bool,          // 忽略已成功导入记录，强制重导
    pub stop_on_error: bool, // 首个失败即终止批次
    pub verbose: bool,
    pub show_data: bool,     // 打印切分出的三张表
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: HashMap<&'static str, String>) -> impl Fn(&str) -> Option<String> {
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_missing_data_dir_is_config_error() {
        let err = ImportConfig::from_lookup(lookup(HashMap::new())).unwrap_err();
        assert!(matches!(err, ImportError::ConfigError(_)));
    }

    #[test]
    fn test_data_dir_must_be_directory() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let vars = HashMap::from([(DATA_DIR_ENV, file.path().display().to_string())]);
        assert!(ImportConfig::from_lookup(lookup(vars)).is_err());
    }

    #[test]
    fn test_db_path_override_and_default() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().display().to_string();

        let config =
            ImportConfig::from_lookup(lookup(HashMap::from([(DATA_DIR_ENV, data_dir.clone())])))
                .unwrap();
        assert_eq!(config.db_path, default_db_path());
        assert_eq!(config.data_dir(), dir.path());

        let vars = HashMap::from([
            (DATA_DIR_ENV, data_dir),
            (DB_PATH_ENV, "/tmp/custom/lab.db".to_string()),
        ]);
        let config = ImportConfig::from_lookup(lookup(vars)).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/custom/lab.db"));
    }
}
