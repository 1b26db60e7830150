use axum::{extract::State, http::StatusCode, routing::get, Router};
use axum_admin_table::config::DEFAULT_CONNECTION;
use axum_admin_table::database::Driver;
use axum_admin_table::{AdminConfig, AdminContext, AdminLayer, DatabaseConfig, Services};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod database;
mod tables;

/// Used when `DATABASE_URL` is not set
const DEFAULT_DATABASE_URL: &str = "sqlite:./data/example.db?mode=rwc";

#[derive(Clone)]
struct ApplicationState {
    context: AdminContext,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,axum_admin_table=debug")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Configuration errors abort startup
    let mut config = AdminConfig::from_env()?;
    if config.databases.is_empty() {
        std::fs::create_dir_all("./data")?;
        config.databases.insert(
            DEFAULT_CONNECTION.to_string(),
            DatabaseConfig {
                driver: Driver::Sqlite,
                url: DEFAULT_DATABASE_URL.to_string(),
            },
        );
    }

    let services = Services::connect(&config).await?;

    // Run database setup and seed sample data
    database::setup(services.connection(DEFAULT_CONNECTION)?.as_ref()).await?;

    let context = AdminContext::new();
    context.init(services)?;

    let admin = AdminLayer::new(config.prefix.clone(), context.clone(), tables::generators());

    let app = Router::new()
        .route("/", get(root_handler))
        .route("/api/health", get(health_handler))
        .with_state(ApplicationState { context })
        .merge(admin.into_router());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
    info!("Server running at http://127.0.0.1:3000");
    info!("Admin tables available at http://127.0.0.1:3000{}/info/users", config.prefix);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn root_handler() -> &'static str {
    "Welcome to axum-admin-table example server"
}

async fn health_handler(State(state): State<ApplicationState>) -> Result<(StatusCode, &'static str), StatusCode> {
    let connection = state
        .context
        .services()
        .and_then(|services| services.connection(DEFAULT_CONNECTION))
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    // Try to verify database connectivity
    connection
        .query("SELECT 1", &[])
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    Ok((StatusCode::OK, "Server is healthy"))
}
