use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use wrap_it_now::api;
use wrap_it_now::catalog::Catalogs;
use wrap_it_now::config::AppConfig;
use wrap_it_now::design::DesignEngine;

#[tokio::main]
async fn main() {
    let dotenv_result = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = dotenv_result {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            warn!(%err, "could not load .env");
        }
    }

    let app_config = AppConfig::from_env();

    let catalogs = match Catalogs::load(&app_config.catalog) {
        Ok(catalogs) => catalogs,
        Err(err) => {
            error!(%err, "could not load catalogs");
            std::process::exit(1);
        }
    };
    let engine = DesignEngine::new(catalogs, app_config.optimizer.engine_config().clone());

    info!("design service starting");
    if let Err(err) = api::start_api_server(app_config.api, engine).await {
        error!(%err, "API server terminated with an error");
        std::process::exit(1);
    }
}
