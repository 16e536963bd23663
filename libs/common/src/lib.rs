//! Pillbox basic library
//!
//! Provides the plumbing shared by the pillbox services:
//! - logging initialisation (console + daily file)
//! - graceful shutdown signal handling
//! - SQLite connection pool setup
//! - service bootstrap helpers

pub mod error;
pub mod logging;
pub mod service_bootstrap;
pub mod shutdown;
pub mod sqlite;

pub use error::{Error, Result};
pub use logging::{LogConfig, LoggingConfig};
pub use service_bootstrap::ServiceInfo;
pub use shutdown::ShutdownHandle;
pub use sqlite::{SqliteClient, SqlitePool};

// Re-export common dependencies
pub use tokio;
pub use tokio_util::sync::CancellationToken;
