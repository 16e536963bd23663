//! Unified service bootstrap utilities
//!
//! Startup banner, logging initialisation and port resolution shared by the
//! pillbox services.

use crate::error::Result;
use crate::logging::{self, LogConfig, LoggingConfig};
use tracing::{info, Level};

/// Service metadata for startup
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    /// Service name (e.g., "pillsrv")
    pub name: String,
    /// Service version from Cargo.toml
    pub version: String,
    /// Service description
    pub description: String,
    /// Default port
    pub default_port: u16,
}

impl ServiceInfo {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
        default_port: u16,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: description.into(),
            default_port,
        }
    }
}

/// Print startup banner for a service
pub fn print_startup_banner(service: &ServiceInfo) {
    let banner = r#"
 ██████╗ ██╗██╗     ██╗     ██████╗  ██████╗ ██╗  ██╗
 ██╔══██╗██║██║     ██║     ██╔══██╗██╔═══██╗╚██╗██╔╝
 ██████╔╝██║██║     ██║     ██████╔╝██║   ██║ ╚███╔╝
 ██╔═══╝ ██║██║     ██║     ██╔══██╗██║   ██║ ██╔██╗
 ██║     ██║███████╗███████╗██████╔╝╚██████╔╝██╔╝ ██╗
 ╚═╝     ╚═╝╚══════╝╚══════╝╚═════╝  ╚═════╝ ╚═╝  ╚═╝
    "#;

    info!("{}", banner);
    info!(" {} v{}", service.name.to_uppercase(), service.version);
    info!(" {}", service.description);
    info!(" Default Port: {}", service.default_port);
}

/// Initialize logging for a service
///
/// Log directory priority:
/// 1. `<SERVICE>_LOG_DIR` environment variable
/// 2. `logging_config.dir`
/// 3. Default "logs"
///
/// Files land in `<root>/<service>/<service>.log.<date>`.
pub fn init_logging(service: &ServiceInfo, logging_config: Option<&LoggingConfig>) -> Result<()> {
    let config_dir = logging_config.map(|c| c.dir.as_str());
    let log_dir = logging::resolve_log_root(&service.name, config_dir).join(&service.name);

    let console_level = logging_config
        .and_then(|c| c.level.parse::<Level>().ok())
        .unwrap_or(Level::INFO);

    logging::init_with_config(LogConfig {
        service_name: service.name.clone(),
        log_dir,
        console_level,
        enable_file: true,
    })
}

/// Resolve the listen port
///
/// Priority: `<SERVICE>_PORT` env > configured port > service default
pub fn get_service_port(service: &ServiceInfo, configured: Option<u16>) -> u16 {
    let env_var = format!("{}_PORT", service.name.to_uppercase());
    std::env::var(&env_var)
        .ok()
        .and_then(|v| v.parse().ok())
        .or(configured)
        .unwrap_or(service.default_port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_port_falls_back_to_config_then_default() {
        let service = ServiceInfo::new("porttestsrv", "0.1.0", "test", 5000);
        assert_eq!(get_service_port(&service, Some(8080)), 8080);
        assert_eq!(get_service_port(&service, None), 5000);
    }
}
