use std::sync::Arc;

use clinic_server::booking::BookingService;
use clinic_server::chat::{ChatEngine, MemorySessionStore};
use clinic_server::config::Config;
use clinic_server::db;
use clinic_server::mailer::HttpMailer;
use clinic_server::models::AppState;
use clinic_server::routes;
use clinic_server::store::postgres::{PgAppointmentStore, PgDoctorStore, PgReviewStore};

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use axum::http::header;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    let pool = db::connect_pg(&cfg.database_url).await?;
    sqlx::migrate!().run(&pool).await?;

    let doctors: Arc<dyn clinic_server::store::DoctorStore> =
        Arc::new(PgDoctorStore::new(pool.clone()));
    let appointments: Arc<dyn clinic_server::store::AppointmentStore> =
        Arc::new(PgAppointmentStore::new(pool.clone()));
    let reviews: Arc<dyn clinic_server::store::ReviewStore> =
        Arc::new(PgReviewStore::new(pool));
    let mailer = HttpMailer::from_config(&cfg);
    let sessions = Arc::new(MemorySessionStore::new());

    let booking = Arc::new(BookingService::new(
        doctors.clone(),
        appointments.clone(),
        mailer,
        cfg.clinic_offset,
    ));
    let chat = Arc::new(ChatEngine::new(
        doctors.clone(),
        appointments.clone(),
        sessions,
        cfg.clinic_offset,
    ));

    let state = AppState {
        doctors,
        appointments,
        reviews,
        booking,
        chat,
        clinic_offset: cfg.clinic_offset,
    };

    // DEV ONLY: allow browser clients to call the API from another origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    let app = routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
