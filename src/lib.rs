//! # AI Access Library
//!
//! Decides whether and how an admin operator may use a configured AI
//! provider, keeps exactly one active model per (provider, capability), and
//! routes generated content to registered destinations.

pub mod access;
pub mod activation;
pub mod cache;
pub mod config;
pub mod crypto;
pub mod db;
pub mod destinations;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod seeds;
pub mod server;
pub mod service;
pub mod store;
pub mod sync;
pub mod telemetry;
pub use migration;
