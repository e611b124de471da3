use crate::{
    api::today,
    auth::auth::AuthUser,
    error::{LeaveError, ValidationError},
    api::leave::LeaveResponse,
    leave::balance::{self, LeaveBalance},
    model::employee::Employee,
    store::{employee_store, leave_store},
    utils::policy_cache::PolicyCache,
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct CreateEmployee {
    #[schema(example = "Marko Petrović")]
    pub name: String,
    #[schema(example = "2019-03-15", format = "date", value_type = String)]
    pub hired_at: NaiveDate,
    #[schema(example = "1988-11-02", format = "date", value_type = Option<String>)]
    pub birth_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct EmployeeQuery {
    /// Pagination page number (start with 1)
    pub page: Option<u32>,
    /// Items per page
    pub per_page: Option<u32>,
    /// Search by name
    pub search: Option<String>,
    /// Hired on or after
    #[param(value_type = Option<String>, format = "date")]
    pub hired_from: Option<NaiveDate>,
    /// Hired on or before
    #[param(value_type = Option<String>, format = "date")]
    pub hired_to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct BalanceQuery {
    /// Policy year between the hire year and next year, defaults to the current one
    pub year: Option<i32>,
}

/// Employee plus the values derived from today's date.
#[derive(Serialize, ToSchema)]
pub struct EmployeeResponse {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "Marko Petrović")]
    pub name: String,
    #[schema(example = "2019-03-15", format = "date", value_type = String)]
    pub hired_at: NaiveDate,
    #[schema(example = "1988-11-02", format = "date", value_type = Option<String>)]
    pub birth_date: Option<NaiveDate>,
    #[schema(example = 37)]
    pub age: Option<u32>,
    #[schema(example = 7)]
    pub seniority_years: u32,
}

impl EmployeeResponse {
    pub fn new(employee: Employee, today: NaiveDate) -> Self {
        Self {
            age: employee.age(today),
            seniority_years: employee.seniority_years(today),
            id: employee.id,
            name: employee.name,
            hired_at: employee.hired_at,
            birth_date: employee.birth_date,
        }
    }
}

/// A year's balance with the leave booked in that year.
#[derive(Serialize, ToSchema)]
pub struct BalanceResponse {
    #[serde(flatten)]
    pub balance: LeaveBalance,
    pub leaves: Vec<LeaveResponse>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<EmployeeResponse>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 42)]
    pub total: i64,
}

fn db_error(e: sqlx::Error, context: &'static str) -> actix_web::Error {
    error!(error = %e, "{context}");
    actix_web::error::ErrorInternalServerError("Internal Server Error")
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/employee",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created", body = EmployeeResponse),
        (status = 400, description = "Bad request"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateEmployee>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(LeaveError::from(ValidationError::EmptyField { field: "name" }).into());
    }

    let employee = employee_store::create_employee(pool.get_ref(), name, payload.hired_at, payload.birth_date)
        .await
        .map_err(|e| db_error(e, "Failed to create employee"))?;

    info!(employee_id = employee.id, created_by = auth.user_id, "Employee created");

    Ok(HttpResponse::Created().json(EmployeeResponse::new(employee, today())))
}

#[utoipa::path(
    get,
    path = "/api/employee",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeeListResponse),
        (status = 403, description = "Forbidden")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let query = query.into_inner();
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let filter = employee_store::EmployeeFilter {
        search: query.search,
        hired_from: query.hired_from,
        hired_to: query.hired_to,
    };

    let (employees, total) = employee_store::list_employees(pool.get_ref(), &filter, page, per_page)
        .await
        .map_err(|e| db_error(e, "Failed to list employees"))?;

    let today = today();
    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        data: employees
            .into_iter()
            .map(|e| EmployeeResponse::new(e, today))
            .collect(),
        page,
        per_page,
        total,
    }))
}

/// Get Employee by ID
#[utoipa::path(
    get,
    path = "/api/employee/{employee_id}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Employee found", body = EmployeeResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "employee not found"
        }))
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    auth.require_self_or_hr(employee_id)?;

    let employee = employee_store::get_employee(pool.get_ref(), employee_id)
        .await
        .map_err(|e| db_error(e, "Failed to fetch employee"))?
        .ok_or(LeaveError::NotFound("employee"))?;

    Ok(HttpResponse::Ok().json(EmployeeResponse::new(employee, today())))
}

/// Update Employee
///
/// Accepts any subset of `name`, `hired_at` and `birth_date`.
#[utoipa::path(
    put,
    path = "/api/employee/{employee_id}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID")
    ),
    request_body(content = Object, example = json!({"hired_at": "2019-04-01"})),
    responses(
        (status = 200, description = "Employee updated", body = EmployeeResponse),
        (status = 400, description = "Unknown field or bad value"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let employee_id = path.into_inner();

    let employee = employee_store::update_employee(pool.get_ref(), employee_id, &body)
        .await?
        .ok_or(LeaveError::NotFound("employee"))?;

    info!(employee_id, updated_by = auth.user_id, "Employee updated");

    Ok(HttpResponse::Ok().json(EmployeeResponse::new(employee, today())))
}

/// Delete Employee together with their leave
#[utoipa::path(
    delete,
    path = "/api/employee/{employee_id}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let employee_id = path.into_inner();

    let deleted = employee_store::delete_employee(pool.get_ref(), employee_id)
        .await
        .map_err(|e| db_error(e, "Failed to delete employee"))?;

    if !deleted {
        return Err(LeaveError::NotFound("employee").into());
    }

    info!(employee_id, deleted_by = auth.user_id, "Employee deleted");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Successfully deleted"
    })))
}

/// Leave balance for one policy year
#[utoipa::path(
    get,
    path = "/api/employee/{employee_id}/balance",
    params(
        ("employee_id" = u64, Path, description = "Employee ID"),
        BalanceQuery
    ),
    responses(
        (status = 200, description = "Balance for the year", body = BalanceResponse),
        (status = 400, description = "Year before the hire year or after next year"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_balance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<PolicyCache>,
    path: web::Path<u64>,
    query: web::Query<BalanceQuery>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    auth.require_self_or_hr(employee_id)?;

    let employee = employee_store::get_employee(pool.get_ref(), employee_id)
        .await
        .map_err(LeaveError::from)?
        .ok_or(LeaveError::NotFound("employee"))?;

    let today = today();
    let year = query.year.unwrap_or_else(|| today.year());
    let reference = balance::checked_reference_date(year, employee.hired_at, today)
        .map_err(LeaveError::from)?;

    let bundle = cache.get_policy_for_org(pool.get_ref()).await?;
    let leaves = leave_store::list_all_leaves(pool.get_ref(), employee_id)
        .await
        .map_err(LeaveError::from)?;
    let balance = balance::balance_for_year(
        employee.hired_at,
        &bundle.policy,
        &leaves,
        &bundle.shutdowns,
        reference,
    );
    let booked = leave_store::list_leaves(pool.get_ref(), employee_id, year)
        .await
        .map_err(LeaveError::from)?;

    Ok(HttpResponse::Ok().json(BalanceResponse {
        balance,
        leaves: booked.into_iter().map(LeaveResponse::from).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_carries_derived_fields() {
        let employee = Employee {
            id: 4,
            name: "Ana".to_string(),
            hired_at: NaiveDate::from_ymd_opt(2016, 10, 18).unwrap(),
            birth_date: NaiveDate::from_ymd_opt(1990, 10, 17),
        };
        let today = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();

        let body = serde_json::to_value(EmployeeResponse::new(employee, today)).unwrap();
        assert_eq!(body["age"], 36);
        // one day short of the tenth anniversary
        assert_eq!(body["seniority_years"], 9);
        assert_eq!(body["hired_at"], "2016-10-18");
    }
}
