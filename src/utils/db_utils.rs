use actix_web::error::ErrorBadRequest;
use chrono::NaiveDate;
use serde_json::Value;
use sqlx::{Executor, MySql};

/// ===============================
/// Column types accepted in a partial update
/// ===============================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Date,
    NullableDate,
}

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    U64(u64),
    Date(NaiveDate),
    Null,
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// ===============================
/// Build dynamic UPDATE SQL
/// ===============================
///
/// Only keys listed in `columns` may appear in the payload; anything else is a
/// 400, so column names never come from the caller.
pub fn build_update_sql(
    table: &str,
    columns: &[(&str, ColumnKind)],
    payload: &Value,
    id_column: &str,
    id_value: u64,
) -> Result<SqlUpdate, actix_web::Error> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ErrorBadRequest("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(ErrorBadRequest("No fields provided for update"));
    }

    let mut assignments = Vec::with_capacity(obj.len());
    let mut values = Vec::with_capacity(obj.len() + 1);

    for (key, value) in obj {
        let Some((column, kind)) = columns.iter().find(|(name, _)| *name == key.as_str()) else {
            return Err(ErrorBadRequest(format!("Field `{key}` cannot be updated")));
        };

        let bound = match (kind, value) {
            (ColumnKind::Text, Value::String(s)) if !s.trim().is_empty() => {
                SqlValue::String(s.trim().to_string())
            }
            (ColumnKind::Date | ColumnKind::NullableDate, Value::String(s)) => {
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map(SqlValue::Date)
                    .map_err(|_| ErrorBadRequest(format!("Field `{key}` must be a YYYY-MM-DD date")))?
            }
            (ColumnKind::NullableDate, Value::Null) => SqlValue::Null,
            _ => return Err(ErrorBadRequest(format!("Unsupported value for `{key}`"))),
        };

        assignments.push(format!("{column} = ?"));
        values.push(bound);
    }

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        table,
        assignments.join(", "),
        id_column
    );

    // WHERE id = ?
    values.push(SqlValue::U64(id_value));

    Ok(SqlUpdate { sql, values })
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update<'e, E>(executor: E, update: SqlUpdate) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<NaiveDate>),
        };
    }

    let result = query.execute(executor).await?;
    Ok(result.rows_affected())
}
