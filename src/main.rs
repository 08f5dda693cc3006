use std::net::SocketAddr;
use std::sync::Arc;

use mongodb::Client;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use portfolio_sentinel::{
    config::{self, LogFormat, StorageBackend},
    repositories::Repositories,
    routes,
    services::{
        db_init, drift_monitor, settings_service,
        stooq::StooqClient,
        symbol_directory::{NasdaqSymbolSource, SymbolAllowList, SymbolCache},
    },
    AppState,
};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false))
            .init(),
        LogFormat::Text => registry.with(fmt::layer().with_target(true)).init(),
    }
}

async fn open_repositories(settings: &config::Settings) -> Result<Repositories, Box<dyn std::error::Error>> {
    match settings.storage_backend {
        StorageBackend::Memory => {
            tracing::warn!("using in-memory storage; data is lost on exit");
            Ok(Repositories::memory())
        }
        StorageBackend::Mongo => {
            let client = Client::with_uri_str(&settings.mongodb_uri).await?;
            let db = client.database(&settings.mongodb_db);
            db_init::ensure_indexes(&db).await?;

            tracing::info!(db = %settings.mongodb_db, "connected to mongodb");
            Ok(Repositories::mongo(db))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = config::load();
    init_tracing(settings.log_format);

    let repos = open_repositories(&settings).await?;
    settings_service::seed_defaults(repos.settings.as_ref()).await?;

    let price_feed = Arc::new(StooqClient::new(&settings.stooq_base_url, settings.price_fetch_timeout)?);

    let allow_list = if settings.symbol_allowlist_enabled {
        let source = Arc::new(NasdaqSymbolSource::new(settings.symbol_list_timeout)?);
        SymbolAllowList::new(Arc::new(SymbolCache::new(source, settings.symbol_list_ttl)))
    } else {
        tracing::warn!("symbol allow-list disabled");
        SymbolAllowList::disabled()
    };

    let state = AppState::new(settings.clone(), repos, price_feed, Arc::new(allow_list))?;

    drift_monitor::spawn_drift_monitor(state.clone());

    let app = routes::app(state);

    let ip: std::net::IpAddr = settings.host.parse()?;
    let addr = SocketAddr::from((ip, settings.port));
    tracing::info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
