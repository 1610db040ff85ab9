//! Prepares a database for the ride engine: migrations plus the sentinel
//! account that erased users' rides and reservations are handed to.

use std::sync::Arc;

use anyhow::Context;
use dotenvy::dotenv;
use migration::MigratorTrait;
use service::erasure::ErasureService;
use service::notify::TracingNotifier;
use service::session::LoggingRevoker;
use service::store::SeaOrmStore;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Config from file, or defaults plus `DATABASE_URL` together with the
/// reason the file was not used.
fn load_config() -> anyhow::Result<(configs::AppConfig, Option<anyhow::Error>)> {
    match configs::AppConfig::load_and_validate() {
        Ok(cfg) => Ok((cfg, None)),
        Err(e) => {
            let mut cfg = configs::AppConfig::default();
            cfg.normalize_and_validate()?;
            Ok((cfg, Some(e)))
        }
    }
}

async fn run(cfg: configs::AppConfig) -> anyhow::Result<()> {
    let db = models::db::connect_with_config(&cfg.database).await.context("connect database")?;
    migration::Migrator::up(&db, None).await.context("run migrations")?;
    info!(service = "bootstrap", event = "migrated", "schema up to date");

    let store = Arc::new(SeaOrmStore::new(db));
    let erasure = ErasureService::new(store, cfg.erasure.clone(), Arc::new(LoggingRevoker), Arc::new(TracingNotifier));
    let sentinel = erasure.ensure_sentinel().await.context("ensure sentinel account")?;
    info!(service = "bootstrap", event = "sentinel_ready", sentinel_id = sentinel.id, email = %sentinel.email, "sentinel account ready");
    Ok(())
}

fn main() -> std::process::ExitCode {
    dotenv().ok();
    let (cfg, fallback) = match load_config() {
        Ok(loaded) => loaded,
        Err(e) => {
            common::utils::logging::init_logging_default();
            error!(service = "bootstrap", event = "config_invalid", error = %e, "invalid configuration");
            return std::process::ExitCode::FAILURE;
        }
    };
    common::utils::logging::init_logging(cfg.logging.json, cfg.logging.filter.as_deref());
    if let Some(e) = fallback {
        warn!(service = "bootstrap", event = "config_fallback", error = %e, "using default configuration");
    }

    let service_id = Uuid::new_v4();
    let pid = std::process::id();
    let version = env!("CARGO_PKG_VERSION");

    std::panic::set_hook(Box::new(move |info| {
        error!(service = "bootstrap", event = "panic", %service_id, pid, message = %info, "unhandled panic occurred");
    }));

    let worker_threads = std::env::var("TOKIO_WORKER_THREADS").ok().and_then(|v| v.parse::<usize>().ok());
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(w) = worker_threads {
        builder.worker_threads(w);
    }
    let rt = match builder.build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(service = "bootstrap", event = "runtime_build_failed", error = %e, "failed to build tokio runtime");
            return std::process::ExitCode::FAILURE;
        }
    };

    info!(service = "bootstrap", event = "start", %service_id, pid, version, "bootstrap starting");
    match rt.block_on(run(cfg)) {
        Ok(()) => {
            info!(service = "bootstrap", event = "done", %service_id, "bootstrap finished");
            std::process::ExitCode::SUCCESS
        }
        Err(e) => {
            error!(service = "bootstrap", event = "failed", %service_id, error = format!("{e:#}"), "bootstrap failed");
            std::process::ExitCode::FAILURE
        }
    }
}
