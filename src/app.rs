/*
 * Responsibility
 * - tracing 初期化 → Config 読み込み → 依存生成 → Router 組み立て
 * - Middleware の適用 (認証 / HTTP / CORS / security headers)
 * - axum::serve() で起動 (SIGTERM / Ctrl-C で graceful shutdown)
 */
use std::sync::Arc;
use std::{panic, process, time::Duration};

use anyhow::{Context, Result};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::repos::{
    document_repo::{Collection, DocumentStore, PgDocumentStore},
    memory::{MemoryDocumentStore, MemoryUserDirectory},
    user_repo::{ADMIN_ROLE, PgUserDirectory, UserDirectory},
};
use crate::services::{access_gate::AccessGate, identity::build_identity_verifier};
use crate::state::AppState;
use crate::{api, middleware};


fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,car_shop_server=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // Always surface panics via tracing so they don't get "lost".
        tracing::error!(?info, "panic");

        // Development: crash the whole process so we notice immediately.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;
    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting car shop server in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = build_state(&config).await?;
    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("bind {}", config.addr))?;
    tracing::info!("Car Selling is running on the port : {}", config.addr.port());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        tracing::info!("received ctrl-c, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                tracing::info!("received SIGTERM, shutting down");
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

struct Stores {
    users: Arc<dyn UserDirectory>,
    cars: Arc<dyn DocumentStore>,
    reviews: Arc<dyn DocumentStore>,
    orders: Arc<dyn DocumentStore>,
}

async fn build_stores(config: &Config) -> Result<Stores> {
    let Some(database_url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL is not set; using in-memory stores (data is lost on restart)");
        return Ok(Stores {
            users: Arc::new(MemoryUserDirectory::new()),
            cars: Arc::new(MemoryDocumentStore::new(Collection::Cars)),
            reviews: Arc::new(MemoryDocumentStore::new(Collection::Reviews)),
            orders: Arc::new(MemoryDocumentStore::new(Collection::Orders)),
        });
    };

    let db = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
        .context("connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .context("run database migrations")?;
    tracing::info!("database ready");

    Ok(Stores {
        users: Arc::new(PgUserDirectory::new(db.clone())),
        cars: Arc::new(PgDocumentStore::new(db.clone(), Collection::Cars)),
        reviews: Arc::new(PgDocumentStore::new(db.clone(), Collection::Reviews)),
        orders: Arc::new(PgDocumentStore::new(db, Collection::Orders)),
    })
}

async fn build_state(config: &Config) -> Result<AppState> {
    // Build process-level services here and inject them into the shared application state.
    let stores = build_stores(config).await?;

    if let Some(email) = config.bootstrap_admin_email.as_deref() {
        stores
            .users
            .set_role(email, ADMIN_ROLE, true)
            .await
            .context("bootstrap admin")?;
        tracing::info!(%email, "bootstrap admin ensured");
    }

    let verifier = build_identity_verifier(&config.identity)?;
    let gate = Arc::new(AccessGate::new(
        verifier,
        stores.users.clone(),
        config.identity.verify_timeout,
        config.promotion_mode,
    ));

    Ok(AppState::new(
        gate,
        stores.users,
        stores.cars,
        stores.reviews,
        stores.orders,
    ))
}

fn build_router(state: AppState, config: &Config) -> Router {
    let router = middleware::auth::access::apply(api::routes(), state.clone()).with_state(state);

    let router = middleware::http::apply(router, config);
    let router = middleware::cors::apply(router, config);
    middleware::security_headers::apply(router)
}
