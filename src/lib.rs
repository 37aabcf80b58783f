//! Drop Server Library
//!
//! Exposes the modules integration tests exercise. The server binary is in
//! main.rs.
//!
//! # Modules
//!
//! - `backup`: export/restore of the metadata store and blob tree
//! - `db`: SQLite file catalog, traffic and login logs
//! - `routes`: HTTP surface

pub mod auth;
pub mod backup;
pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod state;
