use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::model::role::Role;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use serde_json::json;

fn unauthorized(req: ServiceRequest, body: serde_json::Value) -> ServiceResponse<BoxBody> {
    let resp = HttpResponse::Unauthorized().json(body);
    req.into_response(resp.map_into_boxed_body())
}

pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let secret = req
        .app_data::<Data<Config>>()
        .map(|config| config.jwt_secret.clone())
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?;

    let header_value = match req.headers().get("Authorization") {
        Some(h) => match h.to_str() {
            Ok(v) => v.to_owned(),
            Err(_) => {
                return Ok(unauthorized(
                    req,
                    json!({"message": "Invalid Authorization header encoding"}),
                ));
            }
        },
        None => {
            return Ok(unauthorized(
                req,
                json!({"message": "Missing Authorization header"}),
            ));
        }
    };

    let token = match header_value.strip_prefix("Bearer ") {
        Some(t) => t,
        None => {
            return Ok(unauthorized(
                req,
                json!({"message": "Authorization header must start with Bearer"}),
            ));
        }
    };

    let claims = match verify_token(token, &secret) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(error = %e, path = %req.path(), "Rejected bearer token");
            return Ok(unauthorized(
                req,
                json!({"message": "Invalid or expired token", "details": e}),
            ));
        }
    };

    let Some(role) = Role::from_id(claims.role) else {
        return Ok(unauthorized(req, json!({"message": "Invalid role"})));
    };

    let auth_user = AuthUser {
        user_id: claims.user_id,
        username: claims.sub,
        role,
        employee_id: claims.employee_id,
    };

    req.extensions_mut().insert(auth_user);

    next.call(req).await
}
