//! Common utilities, types, and configuration shared across Mosaiq crates.
//!
//! This crate contains the base building blocks for the Mosaiq engine:
//! - **Configuration**: Strongly typed engine configuration (`config`).
//! - **Models**: Shared data contracts such as rows and query results (`models`).
//! - **Resilience**: Retry with exponential backoff for adapters (`retry`).
//! - **Telemetry**: Tracing subscriber setup (`telemetry`).
//! - **Logging**: Task-local warning collection (`warnings`).
pub mod config;
pub mod models;
pub mod retry;
pub mod telemetry;
pub mod warnings;
