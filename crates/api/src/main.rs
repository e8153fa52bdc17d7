use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use contacts_api::avatar::{AvatarStore, CloudinaryStore};
use contacts_api::config::ServerConfig;
use contacts_api::mail::{LogMailer, Mailer, SmtpMailer};
use contacts_api::rate_limit::ClientRateLimiter;
use contacts_api::router::build_app_router;
use contacts_api::state::AppState;
use contacts_core::database;

/// Delay between initial database connection attempts.
const DB_RETRY_DELAY: Duration = Duration::from_secs(2);

/// How often idle rate-limiter buckets are pruned.
const LIMITER_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    init_tracing();

    // --- Configuration ---
    let config = ServerConfig::from_env().context("Invalid server configuration")?;
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database = database::resolve(|key| std::env::var(key).ok(), "localhost")
        .context("Invalid database configuration")?;
    tracing::info!(
        source = ?database.source,
        host = %database.settings.host,
        port = database.settings.port,
        name = %database.settings.name,
        "Resolved database URL"
    );

    let pool = contacts_db::connect_with_retry(
        &database.url,
        config.db_connect_retries,
        DB_RETRY_DELAY,
    )
    .await
    .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    contacts_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    tracing::info!("Database health check passed");

    contacts_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    // --- Outbound services ---
    let mailer: Arc<dyn Mailer> = match &config.mail {
        Some(mail) => {
            tracing::info!(server = %mail.server, port = mail.port, "SMTP mailer configured");
            Arc::new(
                SmtpMailer::new(mail, &config.public_base_url)
                    .context("Failed to configure SMTP transport")?,
            )
        }
        None => {
            tracing::warn!("MAIL_SERVER not set; verification emails will only be logged");
            Arc::new(LogMailer::new(&config.public_base_url))
        }
    };

    let avatars: Option<Arc<dyn AvatarStore>> = match &config.cloudinary {
        Some(cloudinary) => {
            tracing::info!(cloud = %cloudinary.cloud_name, "Avatar storage configured");
            Some(Arc::new(CloudinaryStore::new(cloudinary.clone())))
        }
        None => {
            tracing::warn!("Cloudinary credentials not set; avatar upload disabled");
            None
        }
    };

    // --- Rate limiting ---
    let contact_limiter = Arc::new(ClientRateLimiter::per_minute(
        config.contact_create_per_minute,
    ));
    let cleanup_limiter = Arc::clone(&contact_limiter);
    let cleanup_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(LIMITER_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            cleanup_limiter.retain_recent();
        }
    });

    // --- App state ---
    let state = AppState {
        pool: pool.clone(),
        config: Arc::new(config.clone()),
        mailer,
        avatars,
        contact_limiter,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let host = config
        .host
        .parse()
        .with_context(|| format!("Invalid HOST address '{}'", config.host))?;
    let addr = SocketAddr::new(host, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    cleanup_handle.abort();
    pool.close().await;
    tracing::info!("Graceful shutdown complete");

    Ok(())
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default filter; `LOG_FORMAT=json` switches to
/// structured JSON lines.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "contacts_api=debug,contacts_db=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

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

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by Docker.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
