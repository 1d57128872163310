use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use blog_cache::{CacheStore, RedisCache};
use blog_service::db::{create_pool, migrate, PgPostStore, PgUserStore, PostStore, UserStore};
use blog_service::handlers::{self, HealthState};
use blog_service::search::{ElasticsearchIndex, SearchIndex};
use blog_service::security::JwtKeys;
use blog_service::services::{PostService, UserService};
use blog_service::Config;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,actix_web=info,sqlx=warn".into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Blog Service
///
/// REST API for posts and user accounts. PostgreSQL holds the records,
/// Elasticsearch serves full-text search and Redis caches reads.
///
/// # Routes
///
/// - `/api/v1/posts/*` - Create, read, search, update, delete posts
/// - `/api/v1/users/*` - Registration, profile, password, login
/// - `/api/v1/health/*` - Liveness and readiness
#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(config.app.json_logs);

    tracing::info!("Starting blog-service v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.app.env);

    let db_cfg = config.db_config();
    db_cfg.log_config();
    let db_pool = create_pool(&db_cfg)
        .await
        .context("Failed to create database pool")?;

    if config.database.run_migrations {
        migrate(&db_pool)
            .await
            .context("Failed to run database migrations")?;
    }

    let cache: Arc<dyn CacheStore> = Arc::new(
        RedisCache::connect(&config.cache.url)
            .await
            .context("Failed to initialize Redis connection")?,
    );
    tracing::info!("Connected to Redis");

    let search: Arc<dyn SearchIndex> = Arc::new(
        ElasticsearchIndex::connect(&config.elasticsearch_config())
            .await
            .context("Failed to initialize Elasticsearch index")?,
    );
    tracing::info!(
        index = %config.search.post_index,
        alias = %config.search.post_alias,
        "Connected to Elasticsearch"
    );

    let post_store: Arc<dyn PostStore> = Arc::new(PgPostStore::new(db_pool.clone()));
    let user_store: Arc<dyn UserStore> = Arc::new(PgUserStore::new(db_pool.clone()));

    let jwt_keys = Arc::new(JwtKeys::from_secret(
        config.auth.jwt_secret.as_bytes(),
        config.auth.token_ttl_secs,
    ));

    let post_service = web::Data::new(PostService::new(
        post_store.clone(),
        cache.clone(),
        search.clone(),
        config.post_service_config(),
    ));
    let user_service = web::Data::new(UserService::new(user_store, jwt_keys.clone()));
    let jwt_data = web::Data::from(jwt_keys);
    let health_state = web::Data::new(HealthState::new(post_store, cache, search));

    let http_bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!("Starting HTTP server at {}", http_bind_address);

    let allowed_origins = config.cors.allowed_origins.clone();
    let server = HttpServer::new(move || {
        let mut cors = Cors::default();
        for origin in allowed_origins.split(',') {
            let origin = origin.trim();
            if origin == "*" {
                cors = cors.allow_any_origin();
            } else if !origin.is_empty() {
                cors = cors.allowed_origin(origin);
            }
        }
        cors = cors.allow_any_method().allow_any_header().max_age(3600);

        App::new()
            .app_data(post_service.clone())
            .app_data(user_service.clone())
            .app_data(jwt_data.clone())
            .app_data(health_state.clone())
            .wrap(cors)
            .wrap(tracing_actix_web::TracingLogger::default())
            .configure(handlers::configure)
    })
    .bind(&http_bind_address)
    .with_context(|| format!("Failed to bind {}", http_bind_address))?
    .shutdown_timeout(30)
    .run();

    let server_handle = server.handle();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, draining connections");
        server_handle.stop(true).await;
    });

    server.await.context("HTTP server error")?;

    db_pool.close().await;
    tracing::info!("blog-service stopped");
    Ok(())
}
