// ==========================================
// WiscAr 导入管道 - 实验室指标插件
// ==========================================
// 路由: GET /metrics（只读，固定 SQL）
// ==========================================

use crate::plugins::{ApiRegistry, HttpMethod, LabPlugin, PluginResult, PLUGIN_TAG};
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::{Map, Value};

/// 指标查询
pub const METRICS_SQL: &str = include_str!("../../sql/metrics.sql");

pub const METRICS_PATH: &str = "/metrics";

pub struct MetricsPlugin;

impl LabPlugin for MetricsPlugin {
    fn name(&self) -> &'static str {
        "metrics"
    }

    fn on_api_initialized(&self, api: &mut ApiRegistry) -> PluginResult<()> {
        api.add_route(
            HttpMethod::Get,
            METRICS_PATH,
            PLUGIN_TAG,
            "实验室数据汇总指标",
            Box::new(query_metrics),
        )
    }
}

/// 执行指标查询，结果行以 JSON 数组返回
pub fn query_metrics(conn: &Connection) -> PluginResult<Value> {
    let mut stmt = conn.prepare(METRICS_SQL)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

    let rows = stmt
        .query_map([], |row| {
            let mut object = Map::new();
            for (idx, name) in columns.iter().enumerate() {
                object.insert(name.clone(), json_value(row.get_ref(idx)?));
            }
            Ok(Value::Object(object))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Value::Array(rows))
}

fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(format!("<{} bytes>", b.len())),
    }
}
