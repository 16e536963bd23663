//! Background loops

pub mod monitor;
pub mod scanner;

pub use monitor::HardwareMonitor;
pub use scanner::{ScanReport, ScheduleScanner};
