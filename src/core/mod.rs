// src/core/mod.rs
//! Shared services: configuration, job store and file system helpers

pub mod config_manager;
pub mod database;
pub mod fs_ops;

pub use config_manager::{AppConfig, ConfigManager};
pub use database::{AutomationLogEntry, Database, JobRepository, JobStatistics};
pub use fs_ops::FsOps;
