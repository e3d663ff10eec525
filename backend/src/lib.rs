//! Account credential and session backend.
//!
//! Opaque bearer tokens for signed-in sessions and single-use password reset
//! links, the services that issue and redeem them, and the request gate
//! (session resolution plus CSRF protection) in front of the HTTP handlers.

pub mod app;
pub mod config;
pub mod db;
pub mod docs;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod services;
pub mod state;
pub mod types;
pub mod utils;
