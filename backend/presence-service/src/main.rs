use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use presence_service::collaborators::{
    InMemoryPropertyReadModel, InMemoryUserDirectory, PgPropertyReadModel, PgUserDirectory,
    PropertyReadModel, UserDirectory,
};
use presence_service::config::StoreBackend;
use presence_service::services::spawn_retention_sweeper;
use presence_service::store::{InMemoryNotificationStore, NotificationStore, PgNotificationStore};
use presence_service::{configure, db, logging, metrics, AppState, Config};
use std::sync::Arc;

type Backends = (
    Arc<dyn NotificationStore>,
    Arc<dyn UserDirectory>,
    Arc<dyn PropertyReadModel>,
);

async fn init_backends(config: &Config) -> anyhow::Result<Backends> {
    match config.store.backend {
        StoreBackend::Postgres => {
            let pool = db::init_pool(&config.store).await?;
            db::run_migrations(&pool).await?;
            let store: Arc<dyn NotificationStore> = Arc::new(PgNotificationStore::new(pool.clone()));
            let directory: Arc<dyn UserDirectory> = Arc::new(PgUserDirectory::new(pool.clone()));
            let properties: Arc<dyn PropertyReadModel> = Arc::new(PgPropertyReadModel::new(pool));
            Ok((store, directory, properties))
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory notification store; data is lost on restart");
            let store: Arc<dyn NotificationStore> = Arc::new(InMemoryNotificationStore::new());
            let directory: Arc<dyn UserDirectory> = Arc::new(InMemoryUserDirectory::new());
            let properties: Arc<dyn PropertyReadModel> = Arc::new(InMemoryPropertyReadModel::new());
            Ok((store, directory, properties))
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;
    logging::init_tracing(config.app.json_logs);

    tracing::info!(env = %config.app.env, store = ?config.store.backend, "starting presence-service");

    let (store, directory, properties) = init_backends(&config).await?;
    let bind_addr = format!("{}:{}", config.app.host, config.app.port);
    let retention = config.retention.clone();

    let state = AppState::new(config, store, directory, properties);
    let sweeper = spawn_retention_sweeper(state.dispatcher.clone(), retention);
    tokio::spawn(async move {
        if let Err(e) = sweeper.await {
            tracing::error!(error = %e, "retention sweeper stopped");
        }
    });

    tracing::info!("Starting HTTP server on {}", bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(middleware::Logger::default())
            .wrap(metrics::MetricsMiddleware)
            .configure(configure)
    })
    .bind(&bind_addr)
    .with_context(|| format!("failed to bind {bind_addr}"))?
    .run()
    .await
    .context("HTTP server terminated with error")?;

    Ok(())
}
