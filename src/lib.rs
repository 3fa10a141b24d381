//! driplnk - storage layer for a link-in-bio service
//!
//! User profiles, ordered link collections and an append-only analytics
//! event log behind one set of repository ports, served either by a
//! relational database (SQLite, PostgreSQL, MySQL/MariaDB) or by an embedded
//! sled store with snapshot backup to object storage.
//!
//! # Architecture
//! - `domain`: value types shared by every backend
//! - `repository`: the `UserRepository` / `LinkRepository` / `AnalyticsRepository` ports
//! - `storage`: backend selection, the sled adapter (`storage::kv`) and the SeaORM adapter (`storage::backend`)
//! - `snapshot`: zip archive of the KV directory, uploaded to S3 or a local directory
//! - `analytics`: fire-and-forget event recording
//! - `config`: configuration management
//! - `runtime`: startup / shutdown sequencing and execution modes
//! - `system`: logging

pub mod analytics;
pub mod cli;
pub mod config;
pub mod domain;
pub mod errors;
pub mod repository;
pub mod runtime;
pub mod snapshot;
pub mod storage;
pub mod system;
