//! UserDB Backend
//!
//! SQLite user directory with a filter expression language, a query
//! benchmark and a paginated REST API.

mod api;
mod app;
mod cache;
mod config;
mod db;
mod errors;
mod filters;
mod fixtures;
mod logging;
mod models;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use axum::{
    routing::{get, put},
    Router,
};
use clap::{Parser, Subcommand};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use app::App;
use config::{LoggerConfig, Settings, DEFAULT_CONFIG_FILE};
use db::Repository;
use errors::AppError;

#[derive(Parser)]
#[command(name = "userdb")]
#[command(version)]
#[command(about = "SQLite user directory: populate, benchmark and serve")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "BE_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database, populate users, run the query benchmark and clean up
    Run {
        /// Number of users to generate
        #[arg(long)]
        count: Option<usize>,

        /// Users per insert transaction
        #[arg(long)]
        batch_size: Option<usize>,

        /// Benchmark iterations
        #[arg(long)]
        executions: Option<usize>,

        /// Keep the database file after the run
        #[arg(long)]
        keep_db: bool,
    },

    /// Serve the REST API
    Serve {
        /// Listen address, overrides server.bind_addr
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },

    /// Apply database migrations and exit
    Migrate,
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = match Settings::load(&cli.config) {
        Ok(settings) => settings,
        Err(e) => {
            let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            if let Err(log_err) = logging::init(&LoggerConfig::bootstrap(&base_dir), false) {
                eprintln!("{}", log_err);
            }
            tracing::error!("Failed to load configuration from {:?}: {}", cli.config, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(&settings.logger, settings.db.log_sql) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    let result = match cli.command {
        Commands::Run {
            count,
            batch_size,
            executions,
            keep_db,
        } => {
            let count = count.unwrap_or(settings.populate.count);
            let batch_size = batch_size.unwrap_or(settings.populate.batch_size);
            let executions = executions.unwrap_or(settings.benchmark.execution_count);
            run(&settings, count, batch_size, executions, keep_db).await
        }
        Commands::Serve { bind } => serve(settings, bind).await,
        Commands::Migrate => migrate(&settings).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Populate and benchmark, then tear down regardless of the outcome.
async fn run(
    settings: &Settings,
    count: usize,
    batch_size: usize,
    executions: usize,
    keep_db: bool,
) -> Result<(), AppError> {
    let mut app = App::new();

    let result = async {
        app.setup(settings).await?;
        app.populate_users(count, batch_size).await?;
        let report = app.get_users(executions).await?;
        tracing::info!(
            "Found {} active, {} admin and {} inactive users",
            report.active_users.len(),
            report.admin_users.len(),
            report.inactive_users.len()
        );
        Ok::<(), AppError>(())
    }
    .await;

    if keep_db {
        tracing::info!(
            "Keeping database at {}",
            settings.db.absolute_db_path.display()
        );
    } else {
        app.teardown().await;
    }
    result
}

async fn serve(settings: Settings, bind: Option<SocketAddr>) -> Result<(), AppError> {
    let mut app = App::new();
    app.setup(&settings).await?;
    if settings.server.seed_users > 0 {
        app.populate_users(settings.server.seed_users, settings.populate.batch_size)
            .await?;
    }

    let bind_addr = bind.unwrap_or(settings.server.bind_addr);
    let state = AppState {
        repo: Arc::new(app.repo()?.clone()),
    };
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn migrate(settings: &Settings) -> Result<(), AppError> {
    let mut app = App::new();
    app.setup(settings).await?;
    app.repo()?.pool().close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Users
        .route("/active-users", get(api::active_users))
        .route("/users", get(api::list_users))
        .route("/users/{id}", get(api::get_user))
        .route("/users/{id}/resources", get(api::list_user_resources))
        .route(
            "/users/{id}/resources/{resource_id}",
            put(api::assign_resource).delete(api::unassign_resource),
        )
        // Resources
        .route(
            "/resources",
            get(api::list_resources).post(api::create_resource),
        )
        .route(
            "/resources/{id}",
            get(api::get_resource).delete(api::delete_resource),
        );

    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .merge(api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
