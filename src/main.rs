use std::sync::Arc;

use log::{error, info, warn};

use truck_planner::api::{self, ApiState};
use truck_planner::config::AppConfig;
use truck_planner::store::{FileStore, LayoutStore, MemoryStore};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    if let Err(err) = dotenvy::dotenv() {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            warn!("Could not load .env: {}", err);
        }
    }

    let app_config = AppConfig::from_env();
    let layout_config = app_config.planner.layout_config();

    let store: Arc<dyn LayoutStore> = match app_config.store.data_dir() {
        Some(dir) => match FileStore::open(dir) {
            Ok(store) => Arc::new(store),
            Err(err) => {
                error!("Could not open store in {}: {}", dir.display(), err);
                std::process::exit(1);
            }
        },
        None => {
            info!("No data directory configured, keeping trucks and tours in memory");
            Arc::new(MemoryStore::new())
        }
    };

    info!("Truck planner starting...");
    let state = ApiState::new(store, layout_config);
    if let Err(err) = api::start_api_server(app_config.api, state).await {
        error!("API server terminated with an error: {}", err);
        std::process::exit(1);
    }
}
