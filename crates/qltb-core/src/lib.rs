//! Core QLTB client library (config, API client, session, dashboard sync).

pub mod api;
pub mod auth;
pub mod config;
pub mod dashboard;
pub mod logging;
