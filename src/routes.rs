use crate::{
    api::{activity, approval, attendance, employee, file, notice, report, task},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;
use tracing::warn;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let burst = requests_per_min.max(1);
        let per_ms = 60_000 / burst as u64;
        let cfg: GovernorConfig<PeerIpKeyExtractor, NoOpMiddleware> = GovernorConfigBuilder::default()
            .per_millisecond(per_ms.max(1))
            .burst_size(burst)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap_or_else(|| {
                warn!(requests_per_min, "Invalid rate limit, falling back to defaults");
                GovernorConfig::default()
            });
        Governor::new(&cfg)
    }

    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter)
            .service(
                web::scope("/employees")
                    .service(
                        web::resource("")
                            .route(web::post().to(employee::create_employee))
                            .route(web::get().to(employee::list_employees)),
                    )
                    // before /{id} so it is not read as an id
                    .service(web::resource("/approvers").route(web::get().to(employee::list_approvers)))
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(employee::update_employee))
                            .route(web::get().to(employee::get_employee))
                            .route(web::delete().to(employee::delete_employee)),
                    ),
            )
            .service(
                web::resource("/profile")
                    .route(web::get().to(employee::get_profile))
                    .route(web::put().to(employee::update_profile)),
            )
            .service(
                web::scope("/attendance")
                    .service(web::resource("").route(web::get().to(attendance::attendance_log)))
                    .service(web::resource("/check-in").route(web::post().to(attendance::check_in)))
                    .service(web::resource("/check-out").route(web::post().to(attendance::check_out)))
                    .service(web::resource("/today").route(web::get().to(attendance::today)))
                    .service(web::resource("/me").route(web::get().to(attendance::my_attendance)))
                    .service(web::resource("/audit").route(web::get().to(attendance::audit))),
            )
            .service(
                web::scope("/approvals")
                    .service(
                        web::resource("")
                            .route(web::post().to(approval::submit))
                            .route(web::get().to(approval::assigned_to_me)),
                    )
                    .service(web::resource("/action").route(web::post().to(approval::act)))
                    .service(web::resource("/mine").route(web::get().to(approval::mine)))
                    .service(web::resource("/leave-calendar").route(web::get().to(approval::leave_calendar)))
                    .service(
                        web::resource("/{id}/override").route(web::post().to(approval::override_approval)),
                    ),
            )
            .service(
                web::scope("/tasks")
                    .service(
                        web::resource("")
                            .route(web::post().to(task::create_task))
                            .route(web::get().to(task::list_tasks)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(task::get_task))
                            .route(web::put().to(task::update_task))
                            .route(web::delete().to(task::delete_task)),
                    ),
            )
            .service(
                web::scope("/reports")
                    .service(web::resource("/dashboard").route(web::get().to(report::dashboard)))
                    .service(
                        web::resource("/top-performers").route(web::get().to(report::top_performers_report)),
                    ),
            )
            .service(
                web::scope("/files")
                    .service(
                        web::resource("")
                            .route(web::get().to(file::list_files))
                            .route(web::post().to(file::share_file)),
                    )
                    .service(web::resource("/{id}").route(web::delete().to(file::delete_file)))
                    .service(web::resource("/{id}/download").route(web::put().to(file::mark_downloaded))),
            )
            .service(
                web::scope("/activity")
                    .service(
                        web::resource("")
                            .route(web::get().to(activity::activity_feed))
                            .route(web::delete().to(activity::clear_activity)),
                    )
                    .service(web::resource("/recent").route(web::get().to(activity::recent_activity))),
            )
            .service(
                web::scope("/announcements")
                    .service(
                        web::resource("")
                            .route(web::get().to(notice::list_announcements))
                            .route(web::post().to(notice::create_announcement)),
                    )
                    .service(web::resource("/{id}").route(web::delete().to(notice::delete_announcement))),
            )
            .service(
                web::scope("/newsletters")
                    .service(
                        web::resource("")
                            .route(web::get().to(notice::list_newsletters))
                            .route(web::post().to(notice::create_newsletter)),
                    )
                    .service(web::resource("/{id}").route(web::delete().to(notice::delete_newsletter))),
            )
            .service(
                web::scope("/suggestions")
                    .service(
                        web::resource("")
                            .route(web::get().to(notice::list_suggestions))
                            .route(web::post().to(notice::create_suggestion)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(notice::update_suggestion))
                            .route(web::delete().to(notice::delete_suggestion)),
                    ),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days, single use)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with Authorization: Bearer refresh_token
//       └─ revokes it and returns a new pair
