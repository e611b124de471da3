use chrono::NaiveDate;
use serde_json::Value;
use sqlx::MySqlPool;
use tracing::debug;

use crate::model::employee::Employee;
use crate::utils::db_utils::{ColumnKind, build_update_sql, execute_update};

/// Columns a partial update may touch.
const UPDATABLE_COLUMNS: &[(&str, ColumnKind)] = &[
    ("name", ColumnKind::Text),
    ("hired_at", ColumnKind::Date),
    ("birth_date", ColumnKind::NullableDate),
];

#[derive(Debug, Default)]
pub struct EmployeeFilter {
    pub search: Option<String>,
    pub hired_from: Option<NaiveDate>,
    pub hired_to: Option<NaiveDate>,
}

pub async fn create_employee(
    pool: &MySqlPool,
    name: &str,
    hired_at: NaiveDate,
    birth_date: Option<NaiveDate>,
) -> Result<Employee, sqlx::Error> {
    let result = sqlx::query("INSERT INTO employees (name, hired_at, birth_date) VALUES (?, ?, ?)")
        .bind(name)
        .bind(hired_at)
        .bind(birth_date)
        .execute(pool)
        .await?;

    Ok(Employee {
        id: result.last_insert_id(),
        name: name.to_string(),
        hired_at,
        birth_date,
    })
}

pub async fn get_employee(pool: &MySqlPool, employee_id: u64) -> Result<Option<Employee>, sqlx::Error> {
    sqlx::query_as::<_, Employee>("SELECT id, name, hired_at, birth_date FROM employees WHERE id = ?")
        .bind(employee_id)
        .fetch_optional(pool)
        .await
}

/// One page of employees plus the total matching the filter.
pub async fn list_employees(
    pool: &MySqlPool,
    filter: &EmployeeFilter,
    page: u32,
    per_page: u32,
) -> Result<(Vec<Employee>, i64), sqlx::Error> {
    let offset = (page.max(1) - 1) * per_page;

    // ---------- build WHERE clause dynamically ----------
    let mut conditions = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        conditions.push("name LIKE ?");
        bindings.push(format!("%{}%", search.trim()));
    }

    if let Some(from) = filter.hired_from {
        conditions.push("hired_at >= ?");
        bindings.push(from.to_string());
    }

    if let Some(to) = filter.hired_to {
        conditions.push("hired_at <= ?");
        bindings.push(to.to_string());
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM employees {where_clause}");
    debug!(sql = %count_sql, bindings = ?bindings, "Counting employees");

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &bindings {
        count_query = count_query.bind(b.as_str());
    }
    let total = count_query.fetch_one(pool).await?;

    let data_sql = format!(
        "SELECT id, name, hired_at, birth_date FROM employees {where_clause} ORDER BY id DESC LIMIT ? OFFSET ?"
    );
    debug!(sql = %data_sql, page, per_page, offset, "Fetching employees");

    let mut data_query = sqlx::query_as::<_, Employee>(&data_sql);
    for b in &bindings {
        data_query = data_query.bind(b.as_str());
    }
    let employees = data_query
        .bind(i64::from(per_page))
        .bind(i64::from(offset))
        .fetch_all(pool)
        .await?;

    Ok((employees, total))
}

/// Applies a partial JSON update. `Ok(None)` when the employee does not exist.
pub async fn update_employee(
    pool: &MySqlPool,
    employee_id: u64,
    payload: &Value,
) -> Result<Option<Employee>, actix_web::Error> {
    let update = build_update_sql("employees", UPDATABLE_COLUMNS, payload, "id", employee_id)?;

    let db_error = |e: sqlx::Error| {
        tracing::error!(error = %e, employee_id, "Failed to update employee");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    };

    // MySQL reports 0 affected rows when values are unchanged, so existence
    // is decided by re-reading the row.
    execute_update(pool, update).await.map_err(db_error)?;
    get_employee(pool, employee_id).await.map_err(db_error)
}

/// Leave rows go with the employee (ON DELETE CASCADE).
pub async fn delete_employee(pool: &MySqlPool, employee_id: u64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM employees WHERE id = ?")
        .bind(employee_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
