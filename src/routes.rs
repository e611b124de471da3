use crate::{
    api::{employee, leave, policy},
    auth::middleware::auth_middleware,
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};

pub type LimiterConfig = GovernorConfig<PeerIpKeyExtractor, NoOpMiddleware>;

/// Per-IP limiter allowing `requests_per_min` requests with an equal burst.
/// `None` when the quota is zero.
pub fn build_limiter(requests_per_min: u32) -> Option<LimiterConfig> {
    if requests_per_min == 0 {
        return None;
    }
    let per_ms = (60_000 / u64::from(requests_per_min)).max(1);
    GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiter: &LimiterConfig) {
    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            // authentication
            .wrap(Governor::new(limiter)) // rate limiting
            .service(
                web::scope("/employee")
                    // /employee
                    .service(
                        web::resource("")
                            .route(web::post().to(employee::create_employee))
                            .route(web::get().to(employee::list_employees)),
                    )
                    // /employee/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(employee::update_employee))
                            .route(web::get().to(employee::get_employee))
                            .route(web::delete().to(employee::delete_employee)),
                    )
                    // /employee/{id}/balance
                    .service(web::resource("/{id}/balance").route(web::get().to(employee::get_balance))),
            )
            .service(
                web::scope("/leave")
                    // /leave
                    .service(
                        web::resource("")
                            .route(web::get().to(leave::leave_list))
                            .route(web::post().to(leave::create_leave)),
                    )
                    // static segments before /{id}
                    .service(web::resource("/validate").route(web::post().to(leave::validate_leave)))
                    .service(web::resource("/calendar").route(web::get().to(leave::leave_calendar)))
                    // /leave/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(leave::get_leave))
                            .route(web::put().to(leave::update_leave))
                            .route(web::delete().to(leave::delete_leave)),
                    ),
            )
            .service(
                web::scope("/policy")
                    // /policy
                    .service(
                        web::resource("")
                            .route(web::get().to(policy::get_policy))
                            .route(web::put().to(policy::put_policy)),
                    )
                    .service(web::resource("/blackouts").route(web::post().to(policy::add_blackout)))
                    .service(
                        web::resource("/blackouts/{id}").route(web::delete().to(policy::delete_blackout)),
                    )
                    .service(web::resource("/shutdowns").route(web::post().to(policy::add_shutdown)))
                    .service(
                        web::resource("/shutdowns/{id}").route(web::delete().to(policy::delete_shutdown)),
                    ),
            ),
    );
}
