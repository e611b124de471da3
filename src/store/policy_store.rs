use chrono::NaiveDate;
use sqlx::MySqlPool;

use crate::error::LeaveError;
use crate::model::leave_policy::{
    BlackoutPeriod, CompanyShutdown, LeavePolicy, LeavePolicyRow, PolicyBundle,
};

const POLICY_COLUMNS: &str = r#"
    id, is_company_default, base_annual_days, seniority_step_years, bonus_per_step,
    accrual_method, rounding_method, allow_carryover, max_carryover_days,
    carryover_expiry_month, carryover_expiry_day, max_negative_balance,
    max_consecutive_days, min_notice_days, active
"#;

/// Active company default policy with its children.
pub async fn load_company_policy(pool: &MySqlPool) -> Result<PolicyBundle, LeaveError> {
    let sql = format!(
        "SELECT {POLICY_COLUMNS} FROM leave_policies WHERE is_company_default = TRUE AND active = TRUE LIMIT 1"
    );
    let row = sqlx::query_as::<_, LeavePolicyRow>(&sql)
        .fetch_optional(pool)
        .await?
        .ok_or(LeaveError::PolicyNotConfigured)?;

    let policy = LeavePolicy::try_from(row)?;

    let blackouts = sqlx::query_as::<_, BlackoutPeriod>(
        r#"
        SELECT id, policy_id, start_date, end_date, reason, allow_exceptions
        FROM blackout_periods
        WHERE policy_id = ?
        ORDER BY start_date
        "#,
    )
    .bind(policy.id)
    .fetch_all(pool)
    .await?;

    let shutdowns = sqlx::query_as::<_, CompanyShutdown>(
        r#"
        SELECT id, policy_id, start_date, end_date, days, reason, deduct_from_allowance
        FROM company_shutdowns
        WHERE policy_id = ?
        ORDER BY start_date
        "#,
    )
    .bind(policy.id)
    .fetch_all(pool)
    .await?;

    Ok(PolicyBundle {
        policy,
        blackouts,
        shutdowns,
    })
}

/// Replaces the company default policy, creating it on first save. The row
/// saved here is the only one left flagged as default.
pub async fn save_company_policy(pool: &MySqlPool, policy: &LeavePolicy) -> Result<LeavePolicy, LeaveError> {
    policy.validate()?;

    let mut tx = pool.begin().await?;

    let existing = sqlx::query_scalar::<_, u64>(
        "SELECT id FROM leave_policies WHERE is_company_default = TRUE ORDER BY id LIMIT 1 FOR UPDATE",
    )
    .fetch_optional(&mut *tx)
    .await?;

    let id = match existing {
        Some(id) => {
            sqlx::query(
                r#"
                UPDATE leave_policies SET
                    base_annual_days = ?, seniority_step_years = ?, bonus_per_step = ?,
                    accrual_method = ?, rounding_method = ?, allow_carryover = ?,
                    max_carryover_days = ?, carryover_expiry_month = ?, carryover_expiry_day = ?,
                    max_negative_balance = ?, max_consecutive_days = ?, min_notice_days = ?,
                    active = ?
                WHERE id = ?
                "#,
            )
            .bind(policy.base_annual_days)
            .bind(policy.seniority_step_years)
            .bind(policy.bonus_per_step)
            .bind(policy.accrual_method.as_ref())
            .bind(policy.rounding_method.as_ref())
            .bind(policy.allow_carryover)
            .bind(policy.max_carryover_days)
            .bind(policy.carryover_expiry_month)
            .bind(policy.carryover_expiry_day)
            .bind(policy.max_negative_balance)
            .bind(policy.max_consecutive_days)
            .bind(policy.min_notice_days)
            .bind(policy.active)
            .bind(id)
            .execute(&mut *tx)
            .await?;
            id
        }
        None => sqlx::query(
            r#"
            INSERT INTO leave_policies
                (is_company_default, base_annual_days, seniority_step_years, bonus_per_step,
                 accrual_method, rounding_method, allow_carryover, max_carryover_days,
                 carryover_expiry_month, carryover_expiry_day, max_negative_balance,
                 max_consecutive_days, min_notice_days, active)
            VALUES (TRUE, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(policy.base_annual_days)
        .bind(policy.seniority_step_years)
        .bind(policy.bonus_per_step)
        .bind(policy.accrual_method.as_ref())
        .bind(policy.rounding_method.as_ref())
        .bind(policy.allow_carryover)
        .bind(policy.max_carryover_days)
        .bind(policy.carryover_expiry_month)
        .bind(policy.carryover_expiry_day)
        .bind(policy.max_negative_balance)
        .bind(policy.max_consecutive_days)
        .bind(policy.min_notice_days)
        .bind(policy.active)
        .execute(&mut *tx)
        .await?
        .last_insert_id(),
    };

    sqlx::query("UPDATE leave_policies SET is_company_default = FALSE WHERE id <> ? AND is_company_default = TRUE")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(LeavePolicy {
        id,
        is_company_default: true,
        ..policy.clone()
    })
}

pub async fn add_blackout(
    pool: &MySqlPool,
    policy_id: u64,
    start_date: NaiveDate,
    end_date: NaiveDate,
    reason: &str,
    allow_exceptions: bool,
) -> Result<BlackoutPeriod, LeaveError> {
    let result = sqlx::query(
        r#"
        INSERT INTO blackout_periods (policy_id, start_date, end_date, reason, allow_exceptions)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(policy_id)
    .bind(start_date)
    .bind(end_date)
    .bind(reason)
    .bind(allow_exceptions)
    .execute(pool)
    .await?;

    Ok(BlackoutPeriod {
        id: result.last_insert_id(),
        policy_id,
        start_date,
        end_date,
        reason: reason.to_string(),
        allow_exceptions,
    })
}

pub async fn delete_blackout(pool: &MySqlPool, id: u64) -> Result<bool, LeaveError> {
    let result = sqlx::query("DELETE FROM blackout_periods WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn add_shutdown(pool: &MySqlPool, shutdown: &CompanyShutdown) -> Result<CompanyShutdown, LeaveError> {
    let result = sqlx::query(
        r#"
        INSERT INTO company_shutdowns
            (policy_id, start_date, end_date, days, reason, deduct_from_allowance)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(shutdown.policy_id)
    .bind(shutdown.start_date)
    .bind(shutdown.end_date)
    .bind(shutdown.days)
    .bind(&shutdown.reason)
    .bind(shutdown.deduct_from_allowance)
    .execute(pool)
    .await?;

    Ok(CompanyShutdown {
        id: result.last_insert_id(),
        ..shutdown.clone()
    })
}

pub async fn delete_shutdown(pool: &MySqlPool, id: u64) -> Result<bool, LeaveError> {
    let result = sqlx::query("DELETE FROM company_shutdowns WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
