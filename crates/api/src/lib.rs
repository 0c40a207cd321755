//! HTTP triggers for the reminder pipeline.
//!
//! Endpoints:
//! - GET  /health: liveness
//! - POST /api/reminders/run: scan for inactive users and remind them
//! - POST /api/notifications/send: push a notice to a single user

pub mod middleware;
pub mod routes;
pub mod state;
