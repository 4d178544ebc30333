// ==========================================
// WiscAr 导入管道 - Schema 扩展插件
// ==========================================

use crate::plugins::{LabPlugin, PluginResult};
use crate::repository::error::RepositoryError;
use rusqlite::Connection;
use tracing::info;

pub const FAVORITE_ROCK_SQL: &str = include_str!("../../sql/favorite_rock.sql");

pub struct SchemaExtensionPlugin;

impl LabPlugin for SchemaExtensionPlugin {
    fn name(&self) -> &'static str {
        "schema-extension"
    }

    fn on_database_ready(&self, conn: &Connection) -> PluginResult<()> {
        conn.execute_batch(FAVORITE_ROCK_SQL)
            .map_err(|e| RepositoryError::ScriptError {
                script: "favorite_rock.sql".to_string(),
                message: e.to_string(),
            })?;
        info!("favorite_rock 扩展表已就绪");
        Ok(())
    }
}
