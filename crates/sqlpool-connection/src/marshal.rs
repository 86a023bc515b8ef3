//! Type-directed conversion between caller values and driver cells
//!
//! Every [`SqlType`] tag carries both halves of a rule: how a [`Param`] is
//! encoded into a [`BindValue`] before binding, and how a driver [`Cell`] in a
//! column of that type is decoded back into a [`Value`].

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};
use sqlpool_core::{
    BindValue, Cell, Param, RawRows, Result, SqlPoolError, SqlType, Table, Value,
    timestamp_from_millis,
};


/// Encode a typed parameter for binding
pub(crate) fn encode(param: &Param) -> Result<BindValue> {
    let sql_type = param.sql_type();
    let value = param.value();

    if value.is_null() {
        return Ok(BindValue::Null(sql_type.clone()));
    }

    let encoded = match (sql_type, value) {
        (t, Value::String(s)) if t.is_textual() => BindValue::Text(s.clone()),
        (SqlType::Int, Value::Int(i)) => BindValue::Int(*i),
        (SqlType::Long, Value::Long(i)) => BindValue::Long(*i),
        (SqlType::Long, Value::Int(i)) => BindValue::Long(i64::from(*i)),
        (SqlType::Double, Value::Double(f)) => BindValue::Double(*f),
        (SqlType::Bool, Value::Bool(b)) => BindValue::Bool(*b),
        (t, Value::Timestamp(dt)) if t.is_temporal() => BindValue::Timestamp {
            millis: dt.timestamp_millis(),
            offset_seconds: dt.offset().local_minus_utc(),
        },
        (SqlType::Binary, Value::Binary(bytes)) => BindValue::Bytes(bytes.clone()),
        (SqlType::Other(name), _) => {
            return Err(SqlPoolError::Statement(format!(
                "Cannot bind a parameter declared as {}",
                name
            )));
        }
        (sql_type, value) => {
            return Err(SqlPoolError::Statement(format!(
                "Cannot bind a {} value as {}",
                value.kind(),
                sql_type
            )));
        }
    };

    Ok(encoded)
}

/// Decode one driver cell using the column's declared type
pub(crate) fn decode(cell: Cell, sql_type: &SqlType) -> Result<Value> {
    if cell == Cell::Null {
        return Ok(Value::Null);
    }

    match sql_type {
        SqlType::Int => {
            let wide = decode_integer(&cell, sql_type)?;
            i32::try_from(wide).map(Value::Int).map_err(|_| {
                SqlPoolError::Statement(format!("Value {} does not fit in INTEGER", wide))
            })
        }
        SqlType::Long => decode_integer(&cell, sql_type).map(Value::Long),
        SqlType::Double => match cell {
            Cell::Real(f) => Ok(Value::Double(f)),
            Cell::Integer(i) => Ok(Value::Double(i as f64)),
            Cell::Text(ref s) => s
                .trim()
                .parse::<f64>()
                .map(Value::Double)
                .map_err(|_| mismatch(&cell, sql_type)),
            _ => Err(mismatch(&cell, sql_type)),
        },
        SqlType::Bool => match cell {
            Cell::Bool(b) => Ok(Value::Bool(b)),
            Cell::Integer(i) => Ok(Value::Bool(i != 0)),
            Cell::Text(ref s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Ok(Value::Bool(true)),
                "false" | "f" | "0" => Ok(Value::Bool(false)),
                _ => Err(mismatch(&cell, sql_type)),
            },
            _ => Err(mismatch(&cell, sql_type)),
        },
        t if t.is_temporal() => match cell {
            Cell::Timestamp(millis) | Cell::Integer(millis) => timestamp_from_millis(millis)
                .map(Value::Timestamp)
                .ok_or_else(|| {
                    SqlPoolError::Statement(format!("Timestamp {} is out of range", millis))
                }),
            Cell::Text(ref s) => parse_timestamp(s)
                .map(Value::Timestamp)
                .ok_or_else(|| mismatch(&cell, sql_type)),
            _ => Err(mismatch(&cell, sql_type)),
        },
        SqlType::Binary => match cell {
            Cell::Blob(bytes) => Ok(Value::Binary(bytes)),
            Cell::Text(s) => Ok(Value::Binary(s.into_bytes())),
            _ => Err(mismatch(&cell, sql_type)),
        },
        // Text columns and unrecognized types: best-effort string.
        _ => Ok(cell
            .to_display_string()
            .map(Value::String)
            .unwrap_or(Value::Null)),
    }
}

/// Decode a full driver result set into a [`Table`]
pub(crate) fn decode_rows(raw: RawRows) -> Result<Table> {
    let RawRows { columns, rows } = raw;
    let names = columns.iter().map(|c| c.name.clone()).collect();
    let mut table = Table::with_capacity(names, rows.len());

    for cells in rows {
        if cells.len() != columns.len() {
            return Err(SqlPoolError::Statement(format!(
                "Driver returned {} cells for {} columns",
                cells.len(),
                columns.len()
            )));
        }
        let row = cells
            .into_iter()
            .zip(&columns)
            .map(|(cell, column)| decode(cell, &column.sql_type))
            .collect::<Result<Vec<_>>>()?;
        table.push(row);
    }

    Ok(table)
}

fn decode_integer(cell: &Cell, sql_type: &SqlType) -> Result<i64> {
    match cell {
        Cell::Integer(i) => Ok(*i),
        Cell::Bool(b) => Ok(i64::from(*b)),
        Cell::Text(s) => s.trim().parse::<i64>().map_err(|_| mismatch(cell, sql_type)),
        _ => Err(mismatch(cell, sql_type)),
    }
}

/// Text timestamps are accepted as RFC 3339, or as naive date-times taken to be UTC
fn parse_timestamp(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt);
    }
    let utc = Utc.fix();
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc().with_timezone(&utc));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().with_timezone(&utc))
}

fn mismatch(cell: &Cell, sql_type: &SqlType) -> SqlPoolError {
    SqlPoolError::Statement(format!("Cannot read {:?} as {}", cell, sql_type))
}
