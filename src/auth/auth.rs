use crate::model::role::Role;
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, error::ErrorUnauthorized};
use futures::future::{Ready, ready};

/// Caller identity, placed in request extensions by `auth_middleware`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        match req.extensions().get::<AuthUser>() {
            Some(user) => ready(Ok(user.clone())),
            None => ready(Err(ErrorUnauthorized("Missing token"))),
        }
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> actix_web::Result<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(actix_web::error::ErrorForbidden("Admin only"))
        }
    }

    pub fn require_hr_or_admin(&self) -> actix_web::Result<()> {
        if self.is_hr_or_admin() {
            Ok(())
        } else {
            Err(actix_web::error::ErrorForbidden("HR/Admin only"))
        }
    }

    pub fn is_hr_or_admin(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Hr)
    }

    /// Employees may only read or book their own leave; HR and admins may act
    /// for anyone.
    pub fn require_self_or_hr(&self, employee_id: u64) -> actix_web::Result<()> {
        if self.is_hr_or_admin() || self.employee_id == Some(employee_id) {
            Ok(())
        } else {
            Err(actix_web::error::ErrorForbidden("Not your employee record"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role, employee_id: Option<u64>) -> AuthUser {
        AuthUser {
            user_id: 1,
            username: "user".to_string(),
            role,
            employee_id,
        }
    }

    #[test]
    fn employees_only_act_for_themselves() {
        let employee = user(Role::Employee, Some(5));
        assert!(employee.require_self_or_hr(5).is_ok());
        assert!(employee.require_self_or_hr(6).is_err());
        assert!(employee.require_hr_or_admin().is_err());
    }

    #[test]
    fn hr_acts_for_anyone_but_is_not_admin() {
        let hr = user(Role::Hr, None);
        assert!(hr.require_self_or_hr(6).is_ok());
        assert!(hr.require_admin().is_err());
        assert!(user(Role::Admin, None).require_admin().is_ok());
    }
}
