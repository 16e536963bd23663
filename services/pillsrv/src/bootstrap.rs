//! Service Bootstrap and Initialization

use std::net::SocketAddr;

use common::service_bootstrap::{self, ServiceInfo};
use common::SqliteClient;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::PillsrvConfig;
use crate::error::{PillError, Result};
use crate::storage::EntityStore;

pub fn create_service_info(config: &PillsrvConfig) -> ServiceInfo {
    ServiceInfo::new(
        config.service.name.clone(),
        env!("CARGO_PKG_VERSION"),
        "Pill Reminder - Slot & Alarm Coordination",
        config.service.port,
    )
}

/// Initialize logging and print the banner
pub fn init_environment(service_info: &ServiceInfo, config: &PillsrvConfig) -> Result<()> {
    service_bootstrap::init_logging(service_info, Some(&config.logging))
        .map_err(|e| PillError::config(format!("Failed to initialize logging: {}", e)))?;

    service_bootstrap::print_startup_banner(service_info);
    info!("PillSrv starting");
    Ok(())
}

/// Open the database file and make sure the schema exists
pub async fn open_store(config: &PillsrvConfig) -> Result<EntityStore> {
    info!("Opening database: {}", config.database.path);
    let client = SqliteClient::new(&config.database.path).await?;
    client.ping().await?;

    let store = EntityStore::new(client.pool().clone());
    store.init_schema().await?;
    Ok(store)
}

/// Resolve the listen address and bind it
///
/// Port priority: `PILLSRV_PORT` env > `service.port`.
pub async fn bind_listener(
    service_info: &ServiceInfo,
    config: &PillsrvConfig,
) -> Result<(SocketAddr, TcpListener)> {
    let port = service_bootstrap::get_service_port(service_info, Some(config.service.port));
    let addr: SocketAddr = format!("{}:{}", config.service.host, port)
        .parse()
        .map_err(|e| {
            PillError::config(format!(
                "Invalid listen address {}:{}: {}",
                config.service.host, port, e
            ))
        })?;

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        PillError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to bind {}: {}", addr, e),
        ))
    })?;
    Ok((addr, listener))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_listener_rejects_bad_host() {
        let mut config = PillsrvConfig::default();
        config.service.host = "not a host".to_string();
        let info = create_service_info(&config);

        let err = bind_listener(&info, &config).await.unwrap_err();
        assert!(matches!(err, PillError::Config(_)));
    }

    #[tokio::test]
    async fn test_bind_listener_fails_on_taken_port() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut config = PillsrvConfig::default();
        config.service.host = "127.0.0.1".to_string();
        config.service.port = taken.local_addr().unwrap().port();
        let info = create_service_info(&config);

        let err = bind_listener(&info, &config).await.unwrap_err();
        assert!(matches!(err, PillError::Io(_)));
    }
}
