// ==========================================
// WiscAr 导入管道 - 插件层错误类型
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PluginError {
    #[error("路由已注册: {method} {path}")]
    RouteConflict { method: String, path: String },

    #[error("路由不存在: {method} {path}")]
    RouteNotFound { method: String, path: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<rusqlite::Error> for PluginError {
    fn from(err: rusqlite::Error) -> Self {
        PluginError::Repository(err.into())
    }
}

pub type PluginResult<T> = Result<T, PluginError>;
