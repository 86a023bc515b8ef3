//! `--param TAG:VALUE` parsing

use chrono::{DateTime, NaiveDate};
use sqlpool_core::{Param, SqlType, Value};

/// Parse one command-line parameter.
///
/// `TAG` is a type name (`int`, `long`, `string`, `timestamp`, ...) and
/// `VALUE` its text form. `null:TAG` binds a typed NULL. Binary values are
/// hex encoded; dates accept `YYYY-MM-DD`; timestamps accept RFC 3339.
pub fn parse_param(arg: &str) -> Result<Param, String> {
    let (tag, raw) = arg
        .split_once(':')
        .ok_or_else(|| format!("expected TAG:VALUE, got '{}'", arg))?;

    if tag.eq_ignore_ascii_case("null") {
        return parse_tag(raw).map(Param::null);
    }

    let sql_type = parse_tag(tag)?;
    let value = match &sql_type {
        SqlType::String | SqlType::Text => Value::String(raw.to_string()),
        SqlType::Int => raw
            .parse::<i32>()
            .map(Value::Int)
            .map_err(|e| format!("invalid int '{}': {}", raw, e))?,
        SqlType::Long => raw
            .parse::<i64>()
            .map(Value::Long)
            .map_err(|e| format!("invalid long '{}': {}", raw, e))?,
        SqlType::Double => raw
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|e| format!("invalid double '{}': {}", raw, e))?,
        SqlType::Bool => raw
            .parse::<bool>()
            .map(Value::Bool)
            .map_err(|e| format!("invalid bool '{}': {}", raw, e))?,
        SqlType::Timestamp => DateTime::parse_from_rfc3339(raw)
            .map(Value::Timestamp)
            .map_err(|e| format!("invalid timestamp '{}': {}", raw, e))?,
        SqlType::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| Value::Timestamp(naive.and_utc().fixed_offset()))
            .ok_or_else(|| format!("invalid date '{}'", raw))?,
        SqlType::Binary => hex::decode(raw)
            .map(Value::Binary)
            .map_err(|e| format!("invalid hex '{}': {}", raw, e))?,
        SqlType::Other(name) => return Err(format!("unsupported parameter type '{}'", name)),
    };

    Ok(Param::new(sql_type, value))
}

fn parse_tag(tag: &str) -> Result<SqlType, String> {
    let sql_type = match tag.to_ascii_lowercase().as_str() {
        "string" | "varchar" => SqlType::String,
        "text" => SqlType::Text,
        "int" | "integer" => SqlType::Int,
        "long" | "bigint" => SqlType::Long,
        "double" | "float" => SqlType::Double,
        "bool" | "boolean" => SqlType::Bool,
        "timestamp" => SqlType::Timestamp,
        "date" => SqlType::Date,
        "binary" | "blob" => SqlType::Binary,
        other => return Err(format!("unknown parameter type '{}'", other)),
    };
    Ok(sql_type)
}

/// Whether a statement produces a result set and should be run as a query
pub fn returns_rows(sql: &str) -> bool {
    let keyword = sql
        .trim_start()
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    matches!(
        keyword.as_str(),
        "SELECT" | "WITH" | "VALUES" | "PRAGMA" | "EXPLAIN" | "SHOW"
    )
}
