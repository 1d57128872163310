pub mod auth;
pub mod health;
pub mod posts;
pub mod users;

pub use auth::AuthUser;
pub use health::HealthState;
pub use posts::{create_post, delete_post, get_post, list_posts, update_post};
pub use users::{create_user, delete_user, login, update_password, update_user};

use actix_web::web;

/// Register every route. Expects `PostService`, `UserService`, `JwtKeys` and
/// `HealthState` in app data.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/v1/health", web::get().to(health::health_summary))
        .route("/api/v1/health/ready", web::get().to(health::readiness_summary))
        .route("/api/v1/health/live", web::get().to(health::liveness_check))
        .service(
            web::scope("/api/v1")
                .service(
                    web::scope("/posts")
                        .service(
                            web::resource("")
                                .route(web::post().to(create_post))
                                .route(web::get().to(list_posts)),
                        )
                        .service(
                            web::resource("/{post_id}")
                                .route(web::get().to(get_post))
                                .route(web::put().to(update_post))
                                .route(web::delete().to(delete_post)),
                        ),
                )
                .service(
                    web::scope("/users")
                        .service(
                            web::resource("")
                                .route(web::post().to(create_user))
                                .route(web::put().to(update_user))
                                .route(web::delete().to(delete_user)),
                        )
                        .service(web::resource("/login").route(web::post().to(login)))
                        .service(
                            web::resource("/password").route(web::put().to(update_password)),
                        ),
                ),
        );
}
