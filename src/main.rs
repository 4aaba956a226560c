use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use casetrack::config::Config;
use casetrack::db::{create_pool, init_db, queries, AppState};
use casetrack::handlers;
use casetrack::models::{
    CreateModule, CreateOrganization, CreateProject, CreateTestCase, CreateTestStep, CreateUser,
    Role,
};

const SEED_SESSION_TTL: i64 = 30 * 86400;

#[derive(Parser, Debug)]
#[command(name = "casetrack")]
#[command(about = "Multi-tenant test case management and execution tracking")]
struct Cli {
    /// Seed the database with dev data (org, users per role, project tree)
    #[arg(long)]
    seed: bool,
}

/// Seeds a demo org with one user per role, a small hierarchy, and prints
/// their session tokens. Only runs in dev mode on an empty database.
fn seed_dev_data(state: &AppState) {
    let mut conn = state.db.get().expect("Failed to get db connection for seeding");

    let already: i64 = conn
        .query_row("SELECT COUNT(*) FROM organizations", [], |row| row.get(0))
        .expect("Failed to count organizations");
    if already > 0 {
        tracing::info!("Database already has data, skipping seed");
        return;
    }

    let org = queries::create_organization(
        &conn,
        &CreateOrganization {
            name: "Demo Org".to_string(),
        },
    )
    .expect("Failed to create demo org");

    tracing::info!("============================================");
    tracing::info!("SEEDING DEV DATA (org {})", org.id);

    for (email, roles) in [
        ("admin@demo.local", vec![Role::Admin]),
        ("qa@demo.local", vec![Role::Qa]),
        ("ba@demo.local", vec![Role::Ba]),
        ("tester@demo.local", vec![Role::Tester]),
    ] {
        let user = queries::create_user(
            &conn,
            &org.id,
            &CreateUser {
                email: email.to_string(),
                name: email.split('@').next().unwrap_or(email).to_string(),
                roles,
            },
        )
        .expect("Failed to create demo user");
        let token = queries::create_session(&conn, &user.id, SEED_SESSION_TTL)
            .expect("Failed to create demo session");
        tracing::info!("{} -> token {}", email, token);
    }

    let project = queries::create_project(
        &conn,
        &org.id,
        &CreateProject {
            name: "Checkout".to_string(),
            description: Some("Demo project".to_string()),
        },
    )
    .expect("Failed to create demo project");
    let module = queries::create_module(
        &conn,
        &project.id,
        &CreateModule {
            name: "Payments".to_string(),
        },
    )
    .expect("Failed to create demo module");
    let submodule = queries::create_submodule(
        &conn,
        &module.id,
        &CreateModule {
            name: "Card payments".to_string(),
        },
    )
    .expect("Failed to create demo submodule");
    queries::create_test_case(
        &mut conn,
        &submodule.id,
        &CreateTestCase {
            name: "TC-1 Pay with valid card".to_string(),
            description: None,
            steps: vec![
                CreateTestStep {
                    step_number: 1,
                    action: "Enter card details".to_string(),
                    expected_result: "Form accepts the card".to_string(),
                },
                CreateTestStep {
                    step_number: 2,
                    action: "Submit payment".to_string(),
                    expected_result: "Payment confirmed".to_string(),
                },
            ],
        },
    )
    .expect("Failed to create demo test case");

    tracing::info!("Seeded project {} / module {}", project.id, module.id);
    tracing::info!("============================================");
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "casetrack=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let state = AppState { db: db_pool };

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set CASETRACK_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    let app: Router = Router::new()
        .merge(handlers::router(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Casetrack server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
