use chrono::{Duration, NaiveDate};
use sqlx::{Executor, MySql, MySqlConnection, MySqlPool};

use crate::leave::dates::{self, DateRange};
use crate::model::employee::Employee;
use crate::model::leave::Leave;

/// Oldest start date, relative to a calendar window, of a leave that can
/// still reach into the window.
const CALENDAR_LOOKBACK_DAYS: i64 = 366;

pub async fn list_all_leaves<'e, E>(executor: E, employee_id: u64) -> Result<Vec<Leave>, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    sqlx::query_as::<_, Leave>(
        r#"
        SELECT id, employee_id, start_date, days, note, created_at
        FROM leaves
        WHERE employee_id = ?
        ORDER BY start_date
        "#,
    )
    .bind(employee_id)
    .fetch_all(executor)
    .await
}

/// Leave whose start date falls in the policy year.
pub async fn list_leaves(pool: &MySqlPool, employee_id: u64, year: i32) -> Result<Vec<Leave>, sqlx::Error> {
    let Some(range) = dates::policy_year(year) else {
        return Ok(Vec::new());
    };
    sqlx::query_as::<_, Leave>(
        r#"
        SELECT id, employee_id, start_date, days, note, created_at
        FROM leaves
        WHERE employee_id = ? AND start_date BETWEEN ? AND ?
        ORDER BY start_date
        "#,
    )
    .bind(employee_id)
    .bind(range.start)
    .bind(range.end)
    .fetch_all(pool)
    .await
}

/// Candidates for the calendar window; callers still clip by segment.
pub async fn list_leaves_between(
    pool: &MySqlPool,
    window: &DateRange,
    employee_id: Option<u64>,
) -> Result<Vec<Leave>, sqlx::Error> {
    let earliest = window.start - Duration::days(CALENDAR_LOOKBACK_DAYS);
    sqlx::query_as::<_, Leave>(
        r#"
        SELECT id, employee_id, start_date, days, note, created_at
        FROM leaves
        WHERE start_date BETWEEN ? AND ?
          AND (? IS NULL OR employee_id = ?)
        ORDER BY start_date, employee_id
        "#,
    )
    .bind(earliest)
    .bind(window.end)
    .bind(employee_id)
    .bind(employee_id)
    .fetch_all(pool)
    .await
}

// Helper enum for typed SQLx binding
enum FilterValue {
    U64(u64),
    Date(NaiveDate),
}

#[derive(Debug, Default)]
pub struct LeaveFilter {
    pub employee_id: Option<u64>,
    pub year: Option<i32>,
}

/// One page of leave, newest start first, plus the total matching the filter.
pub async fn list_leaves_page(
    pool: &MySqlPool,
    filter: &LeaveFilter,
    page: u32,
    per_page: u32,
) -> Result<(Vec<Leave>, i64), sqlx::Error> {
    let offset = (page.max(1) - 1) * per_page;

    let mut where_sql = String::from(" WHERE 1=1");
    let mut args: Vec<FilterValue> = Vec::new();

    if let Some(employee_id) = filter.employee_id {
        where_sql.push_str(" AND employee_id = ?");
        args.push(FilterValue::U64(employee_id));
    }

    if let Some(year) = filter.year {
        // A year chrono cannot represent holds no leave
        let Some(range) = dates::policy_year(year) else {
            return Ok((Vec::new(), 0));
        };
        where_sql.push_str(" AND start_date BETWEEN ? AND ?");
        args.push(FilterValue::Date(range.start));
        args.push(FilterValue::Date(range.end));
    }

    let count_sql = format!("SELECT COUNT(*) FROM leaves{where_sql}");
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = match arg {
            FilterValue::U64(v) => count_q.bind(*v),
            FilterValue::Date(d) => count_q.bind(*d),
        };
    }
    let total = count_q.fetch_one(pool).await?;

    let data_sql = format!(
        r#"
        SELECT id, employee_id, start_date, days, note, created_at
        FROM leaves
        {where_sql}
        ORDER BY start_date DESC, id DESC
        LIMIT ? OFFSET ?
        "#
    );
    let mut data_q = sqlx::query_as::<_, Leave>(&data_sql);
    for arg in args {
        data_q = match arg {
            FilterValue::U64(v) => data_q.bind(v),
            FilterValue::Date(d) => data_q.bind(d),
        };
    }
    let leaves = data_q
        .bind(i64::from(per_page))
        .bind(i64::from(offset))
        .fetch_all(pool)
        .await?;

    Ok((leaves, total))
}

pub async fn get_leave(pool: &MySqlPool, leave_id: u64) -> Result<Option<Leave>, sqlx::Error> {
    sqlx::query_as::<_, Leave>(
        r#"
        SELECT id, employee_id, start_date, days, note, created_at
        FROM leaves
        WHERE id = ?
        "#,
    )
    .bind(leave_id)
    .fetch_optional(pool)
    .await
}

/// Locks the employee row for the rest of the transaction. Every leave write
/// for that employee goes through here first, which serializes them.
pub async fn lock_employee(conn: &mut MySqlConnection, employee_id: u64) -> Result<Option<Employee>, sqlx::Error> {
    sqlx::query_as::<_, Employee>(
        "SELECT id, name, hired_at, birth_date FROM employees WHERE id = ? FOR UPDATE",
    )
    .bind(employee_id)
    .fetch_optional(conn)
    .await
}

pub async fn insert_leave(
    conn: &mut MySqlConnection,
    employee_id: u64,
    start_date: NaiveDate,
    days: u32,
    note: Option<&str>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO leaves (employee_id, start_date, days, note)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(start_date)
    .bind(days)
    .bind(note)
    .execute(conn)
    .await?;

    Ok(result.last_insert_id())
}

pub async fn update_leave(
    conn: &mut MySqlConnection,
    leave_id: u64,
    start_date: NaiveDate,
    days: u32,
    note: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE leaves SET start_date = ?, days = ?, note = ? WHERE id = ?")
        .bind(start_date)
        .bind(days)
        .bind(note)
        .bind(leave_id)
        .execute(conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete_leave(pool: &MySqlPool, leave_id: u64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM leaves WHERE id = ?")
        .bind(leave_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
