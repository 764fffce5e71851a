use crate::api::handlers::{
    admin,
    auth::{self, AuthConfig, AuthState, PgStore, RoleChange, UserStore, UserType},
    health, pages,
};
use anyhow::{Context, Result};
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::{get, post},
};
use sqlx::postgres::PgPoolOptions;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, services::ServeDir, set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, debug, error, info, info_span, warn};
use ulid::Ulid;

pub mod handlers;
pub(crate) mod reaper;
pub mod views;

const BOOTSTRAP_ACTOR: &str = "bootstrap";

/// Server settings that are not part of auth.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    max_connections: u32,
    session_purge_seconds: u64,
    assets_dir: Option<PathBuf>,
    bootstrap_admin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_connections: 5,
            session_purge_seconds: 300,
            assets_dir: None,
            bootstrap_admin: None,
        }
    }

    #[must_use]
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    #[must_use]
    pub fn with_session_purge_seconds(mut self, seconds: u64) -> Self {
        self.session_purge_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_assets_dir(mut self, dir: PathBuf) -> Self {
        self.assets_dir = Some(dir);
        self
    }

    #[must_use]
    pub fn with_bootstrap_admin(mut self, username: String) -> Self {
        self.bootstrap_admin = Some(username);
        self
    }
}

/// Build the application router around an already wired [`AuthState`].
///
/// Every page, the 404 fallback included, runs inside the session middleware.
/// `/health` is mounted outside it and never touches the session store.
#[must_use]
pub fn router(auth_state: Arc<AuthState>) -> Router {
    let health_routes =
        Router::new().route("/health", get(health::health).options(health::health));

    Router::new()
        .route("/", get(pages::root))
        .route("/signup", get(auth::signup_form).post(auth::signup))
        .route("/login", get(auth::login_form).post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/members", get(pages::members))
        .route("/admin", get(admin::admin))
        .route("/promote/{username}", post(admin::promote))
        .route("/demote/{username}", post(admin::demote))
        .fallback(pages::not_found)
        .layer(middleware::from_fn_with_state(
            auth_state.clone(),
            auth::session::manage,
        ))
        .merge(health_routes)
        .layer(Extension(auth_state))
}

/// Start the server
/// # Errors
/// Return error if the database is unreachable, the schema cannot be applied, or the listener fails
pub async fn new(
    port: u16,
    dsn: String,
    auth_config: AuthConfig,
    server_config: ServerConfig,
) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(server_config.max_connections)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let store = Arc::new(PgStore::new(pool));
    store
        .apply_schema()
        .await
        .context("Failed to apply database schema")?;

    if let Some(username) = server_config.bootstrap_admin.as_deref() {
        bootstrap_admin(&*store, username).await?;
    }

    let auth_state = Arc::new(AuthState::new(auth_config, store.clone(), store.clone()));

    reaper::spawn_session_reaper(store, server_config.session_purge_seconds);

    let mut app = router(auth_state);
    if let Some(dir) = &server_config.assets_dir {
        debug!("Serving /images from {}", dir.display());
        app = app.nest_service("/images", ServeDir::new(dir));
    }

    let app = app.layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span)),
    );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Promote `username` to admin before serving; a missing user is only logged.
async fn bootstrap_admin(users: &dyn UserStore, username: &str) -> Result<()> {
    match users
        .set_role(username, UserType::Admin, BOOTSTRAP_ACTOR)
        .await
        .context("Failed to bootstrap admin")?
    {
        RoleChange::Changed { previous } => {
            info!(username, %previous, "Bootstrap admin promoted");
        }
        RoleChange::Unchanged => debug!(username, "Bootstrap admin already an admin"),
        RoleChange::NotFound => warn!(username, "Bootstrap admin does not exist yet"),
    }
    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C signal"),
        () = terminate => info!("Received terminate signal"),
    }

    info!("Gracefully shutdown");
}
