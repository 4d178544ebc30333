// ==========================================
// WiscAr 导入管道 - 标量解析器
// ==========================================
// 职责: "值 ± 误差 单位" 字符串、作者列表、DOI/链接、数值或缺失单元格、
//       加热列（温度/激光功率）整列判定
// ==========================================

use crate::domain::types::HeatingVariable;
use crate::importer::error::{ImportError, ImportResult};
use calamine::Data;
use std::fmt;

/// 激光功率判定阈值（整列全部 ≤ 此值）
pub const LASER_POWER_MAX: f64 = 100.0;

/// 项目标题摘要的最大词数
pub const TITLE_SUMMARY_WORDS: usize = 8;

/// 可剥离的尾部单位
const TRAILING_UNITS: [&str; 4] = ["Ma", "ka", "Ga", "%"];

// ==========================================
// Cell - 与版式无关的单元格值
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// 去空白后的文本（空单元格返回 None）
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            Cell::Number(n) => Some(format_number(*n)),
            Cell::Bool(b) => Some(b.to_string()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => write!(f, "-"),
            other => write!(f, "{}", other.as_text().unwrap_or_default()),
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Cell::Empty,
            Data::Float(f) => Cell::Number(*f),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Bool(b) => Cell::Bool(*b),
            Data::String(s) => Cell::Text(s.clone()),
            other => Cell::Text(other.to_string()),
        }
    }
}

impl From<&str> for Cell {
    fn from(raw: &str) -> Self {
        if raw.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(raw.to_string())
        }
    }
}

/// 整数值去掉小数点，其余保持默认格式
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

// ==========================================
// 值 ± 误差
// ==========================================

/// 解析 "12.34 ± 0.05 Ma" 为 (值, 误差)
pub fn split_error(text: &str) -> ImportResult<(f64, f64)> {
    let mut trimmed = text.trim();
    for unit in TRAILING_UNITS {
        if let Some(stripped) = trimmed.strip_suffix(unit) {
            trimmed = stripped.trim_end();
            break;
        }
    }

    let (value, error) = trimmed
        .split_once('±')
        .ok_or_else(|| ImportError::parse(text, "缺少 ± 分隔符"))?;

    let value = parse_f64_text(value, text)?;
    let error = parse_f64_text(error, text)?;
    Ok((value, error))
}

fn parse_f64_text(part: &str, original: &str) -> ImportResult<f64> {
    let part = part.trim();
    part.parse::<f64>()
        .map_err(|_| ImportError::parse(original, format!("无法解析为浮点数: '{}'", part)))
}

/// 由相邻误差列表头得到误差度量标签（"± 2s" → "2s"）
pub fn error_metric_label(adjacent_header: &str) -> String {
    let header = adjacent_header.trim();
    header
        .strip_prefix("± ")
        .or_else(|| header.strip_prefix('±'))
        .unwrap_or(header)
        .trim()
        .to_string()
}

/// 融合表头中的误差度量（"Age ± 2s (Ma)" → "2s"）
pub fn fused_error_metric(header: &str) -> Option<String> {
    let (_, rest) = header.split_once('±')?;
    rest.split_whitespace().next().map(str::to_string)
}

// ==========================================
// 数值或缺失
// ==========================================

/// 数值单元格；空白、"-"、"n/a"、"NaN" 视为缺失
pub fn parse_numeric(cell: &Cell, field: &str) -> ImportResult<Option<f64>> {
    match cell {
        Cell::Empty => Ok(None),
        Cell::Number(n) if n.is_nan() => Ok(None),
        Cell::Number(n) => Ok(Some(*n)),
        Cell::Bool(_) => Err(ImportError::parse(field, "期望数值，实际为布尔值")),
        Cell::Text(s) => {
            let trimmed = s.trim();
            if is_missing_marker(trimmed) {
                return Ok(None);
            }
            trimmed
                .parse::<f64>()
                .map(Some)
                .map_err(|_| ImportError::parse(field, format!("无法解析为数值: '{}'", trimmed)))
        }
    }
}

fn is_missing_marker(s: &str) -> bool {
    s.is_empty()
        || s == "-"
        || s == "—"
        || s.eq_ignore_ascii_case("n/a")
        || s.eq_ignore_ascii_case("nan")
}

// ==========================================
// 加热列判定
// ==========================================

/// 整列判定：所有值 ≤ 100 为激光功率，否则为温度
pub fn classify_heating_variable(values: &[f64]) -> HeatingVariable {
    if values.iter().all(|v| *v <= LASER_POWER_MAX) {
        HeatingVariable::LaserPower
    } else {
        HeatingVariable::Temperature
    }
}

// ==========================================
// 文献字段
// ==========================================

/// 作者列表格式化：1 人原样；2 人 "A, B"；多于 2 人 "A et al."
pub fn format_author_list(raw: &str) -> String {
    let authors: Vec<&str> = raw
        .split(|c: char| c == ';' || c == ',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .collect();

    match authors.as_slice() {
        [] => raw.trim().to_string(),
        [single] => single.to_string(),
        [first, second] => format!("{}, {}", first, second),
        [first, ..] => {
            if first.contains("et al.") {
                first.to_string()
            } else {
                format!("{} et al.", first)
            }
        }
    }
}

/// DOI 链接解析，返回 (doi, link)：二者恰有一个为 Some
pub fn parse_doi(link: &str) -> (Option<String>, Option<String>) {
    let original = link.trim();
    let after_host = match original.split_once("doi.org/") {
        Some((_, rest)) => rest,
        None => original,
    };
    let candidate = after_host
        .trim()
        .strip_prefix("doi:")
        .or_else(|| after_host.trim().strip_prefix("DOI:"))
        .unwrap_or(after_host)
        .trim();

    if candidate.starts_with("10") {
        (Some(candidate.to_string()), None)
    } else {
        (None, Some(original.to_string()))
    }
}

/// 标题首句；句点仅在其后为空白或结尾时断句（保留 "2.1 Ma" 之类的小数）
fn first_clause(title: &str) -> &str {
    let mut chars = title.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        let ends = match c {
            ':' | ';' | '?' => true,
            '.' => chars.peek().map_or(true, |(_, next)| next.is_whitespace()),
            _ => false,
        };
        if ends {
            return title[..idx].trim();
        }
    }
    title.trim()
}

/// 项目标题摘要："作者: 标题首句前 8 个词"
pub fn title_summary(authors: Option<&str>, title: &str) -> String {
    let clause = first_clause(title);
    let words: Vec<&str> = clause.split_whitespace().collect();
    let mut summary = words
        .iter()
        .take(TITLE_SUMMARY_WORDS)
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    if words.len() > TITLE_SUMMARY_WORDS {
        summary.push_str("...");
    }

    match authors.map(format_author_list) {
        Some(a) if !a.is_empty() => format!("{}: {}", a, summary),
        _ => summary,
    }
}

/// 标准样年龄标签校正：(28,29) → FC，(1.1,1.2) → AC，否则沿用源标签
pub fn standard_label(value: f64, source_label: &str) -> String {
    if value > 28.0 && value < 29.0 {
        "FC".to_string()
    } else if value > 1.1 && value < 1.2 {
        "AC".to_string()
    } else {
        source_label.to_string()
    }
}

/// 标记单元格真值（布尔、非零数值或常见勾选符号）
pub fn is_truthy_marker(cell: &Cell) -> bool {
    match cell {
        Cell::Empty => false,
        Cell::Bool(b) => *b,
        Cell::Number(n) => *n != 0.0,
        Cell::Text(s) => {
            let s = s.trim();
            matches!(s, "x" | "X" | "✓" | "*")
                || s.eq_ignore_ascii_case("yes")
                || s.eq_ignore_ascii_case("true")
        }
    }
}
