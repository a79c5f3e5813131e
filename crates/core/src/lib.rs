pub mod alert;
pub mod config;
pub mod maintenance;
pub mod stats;

pub use alert::{evaluate, listing_priority, scan_priority, MaintenanceAlert, Priority};
pub use config::Config;
pub use maintenance::{InMemoryMaintenanceStore, MaintenanceRecord, MaintenanceStore};
pub use stats::ScanStats;
