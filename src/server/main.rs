use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use tokio::sync::watch;

mod cache;
mod config;
mod error;
mod pcs_client;
mod repository;
mod rest_api;
mod scheduler;
mod selector;
mod single_flight;
mod tcb_info;
mod tcb_status;
#[cfg(test)]
mod test_util;
mod validation;

use cache::LazyCache;
use config::Configuration;
use pcs_client::{PcsClient, ProvisioningClient};
use repository::{OrmDatabase, ScsDatabase};
use rest_api::{AppState, HeaderRoleAuthorizer};
use scheduler::RefreshScheduler;

const DB_CONNECT_ATTEMPTS: u32 = 4;
const DB_CONNECT_RETRY: Duration = Duration::from_secs(5);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Configuration::from_env()?;
    tracing::info!(model = ?config.caching_model, "caching model selected");

    let conn = connect_with_retry(&config.database_url).await?;
    Migrator::up(&conn, None).await?;

    let db: Arc<dyn ScsDatabase> = Arc::new(OrmDatabase::new(conn));
    let pcs: Arc<dyn ProvisioningClient> = Arc::new(PcsClient::new(&config)?);
    let cache = Arc::new(LazyCache::new(db, pcs));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let refresh_tasks = RefreshScheduler::new(cache.clone(), &config).spawn(shutdown_rx);

    let state = AppState {
        cache,
        authorizer: Arc::new(HeaderRoleAuthorizer),
    };
    let app = rest_api::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "sgx caching service listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    // Stop the refresh tasks and wait out in-flight upstream calls.
    let _ = shutdown_tx.send(true);
    for task in refresh_tasks {
        if tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err() {
            tracing::warn!("refresh task did not stop within the grace period");
        }
    }

    Ok(())
}

async fn connect_with_retry(database_url: &str) -> anyhow::Result<DatabaseConnection> {
    let mut attempt = 1u32;
    loop {
        match Database::connect(database_url).await {
            Ok(conn) => return Ok(conn),
            Err(err) if attempt < DB_CONNECT_ATTEMPTS => {
                tracing::warn!(
                    attempt,
                    error = %err,
                    "database connection failed, retrying"
                );
                attempt += 1;
                tokio::time::sleep(DB_CONNECT_RETRY).await;
            }
            Err(err) => return Err(err.into()),
        }
    }
}
