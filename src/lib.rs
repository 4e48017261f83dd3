//! Patrol compliance and geofence monitoring for security guard operations.
//!
//! Guards scan checkpoint tags and stream position fixes; the engine keeps
//! per-shift compliance, counts down checkpoint due times, detects geofence
//! crossings and carries panic alerts to supervisors.

pub mod api;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod messaging;
pub mod notification;
pub mod security;
pub mod services;

pub use error::Error;
