use actix_web::{web, App, HttpServer};
use std::error::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use attendance_dashboard::data::load_roster_file;
use attendance_dashboard::model::{seed_attendance, seed_students};
use attendance_dashboard::{api, Config, InsightService, InsightTracker, RecordStore, SharedStore};

fn build_store(config: &Config) -> Result<RecordStore, Box<dyn Error>> {
    match &config.roster_csv {
        Some(path) => {
            let mut store = RecordStore::new();
            load_roster_file(path, &mut store)?;
            Ok(store)
        }
        None => {
            info!("no roster configured, loading demo data");
            Ok(RecordStore::with_data(seed_students(), seed_attendance())?)
        }
    }
}

#[actix_web::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;
    let store = web::Data::new(SharedStore::new(build_store(&config)?));
    let insights = web::Data::new(InsightService::from_config(&config));
    let tracker = web::Data::new(InsightTracker::new());

    {
        let snapshot = store.read();
        info!(
            students = snapshot.list_students().len(),
            records = snapshot.list_attendance().len(),
            insights_configured = insights.is_configured(),
            "record store ready"
        );
    }

    let (host, port) = config.bind_addr();
    info!(%host, port, "starting attendance dashboard API");

    HttpServer::new(move || {
        App::new()
            .app_data(store.clone())
            .app_data(insights.clone())
            .app_data(tracker.clone())
            .configure(api::configure)
    })
    .bind((host.as_str(), port))?
    .run()
    .await?;

    Ok(())
}
