// ==========================================
// WiscAr 导入管道 - 宿主插件层
// ==========================================
// 职责: 向宿主应用暴露两个扩展点
//   1. on_api_initialized: 注册只读路由
//   2. on_database_ready:  执行 schema 扩展脚本
// ==========================================

pub mod error;
pub mod metrics;
pub mod schema_extension;

pub use error::{PluginError, PluginResult};
pub use metrics::MetricsPlugin;
pub use schema_extension::SchemaExtensionPlugin;

use rusqlite::Connection;
use serde_json::Value;
use std::fmt;
use tracing::{debug, info};

/// 插件路由的文档分组
pub const PLUGIN_TAG: &str = "Lab Plugins";

// ==========================================
// 路由注册表
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
        }
    }
}

pub type RouteHandler = Box<dyn Fn(&Connection) -> PluginResult<Value> + Send + Sync>;

pub struct Route {
    pub method: HttpMethod,
    pub path: String,
    pub tag: String,
    pub description: String,
    handler: RouteHandler,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("tag", &self.tag)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct ApiRegistry {
    routes: Vec<Route>,
}

impl ApiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_route(
        &mut self,
        method: HttpMethod,
        path: &str,
        tag: &str,
        description: &str,
        handler: RouteHandler,
    ) -> PluginResult<()> {
        if self.route(method, path).is_some() {
            return Err(PluginError::RouteConflict {
                method: method.to_string(),
                path: path.to_string(),
            });
        }
        debug!(%method, path, tag, "注册插件路由");
        self.routes.push(Route {
            method,
            path: path.to_string(),
            tag: tag.to_string(),
            description: description.to_string(),
            handler,
        });
        Ok(())
    }

    pub fn route(&self, method: HttpMethod, path: &str) -> Option<&Route> {
        self.routes
            .iter()
            .find(|r| r.method == method && r.path == path)
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// 调用已注册路由
    pub fn dispatch(&self, method: HttpMethod, path: &str, conn: &Connection) -> PluginResult<Value> {
        let route = self.route(method, path).ok_or_else(|| PluginError::RouteNotFound {
            method: method.to_string(),
            path: path.to_string(),
        })?;
        (route.handler)(conn)
    }
}

// ==========================================
// LabPlugin
// ==========================================
pub trait LabPlugin {
    fn name(&self) -> &'static str;

    fn on_api_initialized(&self, _api: &mut ApiRegistry) -> PluginResult<()> {
        Ok(())
    }

    fn on_database_ready(&self, _conn: &Connection) -> PluginResult<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct PluginManager {
    plugins: Vec<Box<dyn LabPlugin>>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 实验室默认插件集
    pub fn with_lab_plugins() -> Self {
        let mut manager = Self::new();
        manager.register(Box::new(MetricsPlugin));
        manager.register(Box::new(SchemaExtensionPlugin));
        manager
    }

    pub fn register(&mut self, plugin: Box<dyn LabPlugin>) {
        info!(plugin = plugin.name(), "插件已注册");
        self.plugins.push(plugin);
    }

    pub fn initialize_api(&self, api: &mut ApiRegistry) -> PluginResult<()> {
        for plugin in &self.plugins {
            plugin.on_api_initialized(api)?;
        }
        Ok(())
    }

    pub fn database_ready(&self, conn: &Connection) -> PluginResult<()> {
        for plugin in &self.plugins {
            plugin.on_database_ready(conn)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_route_is_rejected() {
        let mut api = ApiRegistry::new();
        let handler = || -> RouteHandler { Box::new(|_conn: &Connection| Ok(Value::Null)) };

        api.add_route(HttpMethod::Get, "/ping", PLUGIN_TAG, "ping", handler())
            .unwrap();
        let err = api
            .add_route(HttpMethod::Get, "/ping", PLUGIN_TAG, "ping", handler())
            .unwrap_err();
        assert!(matches!(err, PluginError::RouteConflict { .. }));
    }

    #[test]
    fn test_dispatch_unknown_route() {
        let api = ApiRegistry::new();
        let conn = Connection::open_in_memory().unwrap();
        assert!(matches!(
            api.dispatch(HttpMethod::Get, "/missing", &conn),
            Err(PluginError::RouteNotFound { .. })
        ));
    }
}
