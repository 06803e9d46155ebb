//! # Crewplan Infra
//!
//! SQLite adapters for the allocation engine.
//!
//! This crate contains:
//! - The pooled database manager and embedded schema
//! - One repository per core port
//! - Error conversions from store errors into domain errors
//! - The configuration loader
//!
//! ## Architecture Principles
//! - Implements the ports defined in `crewplan-core`
//! - All multi-row writes go through one rusqlite transaction
//! - Blocking SQLite work runs on `tokio::task::spawn_blocking`

pub mod config;
pub mod database;
pub mod errors;

pub use config::{DatabaseConfig, EngineConfig};
pub use database::allocation_repository::SqliteAllocationRepository;
pub use database::employee_repository::SqliteEmployeeDirectory;
pub use database::manager::DbManager;
pub use database::project_repository::SqliteProjectDirectory;
pub use database::task_repository::SqliteTaskStore;
