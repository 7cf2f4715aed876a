//! Fusion credential server library.
//!
//! Core functionality for the credential lifecycle service: API key, webhook,
//! and admin authentication operations, storage, and the HTTP API.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod middleware;
pub mod migration;
pub mod models;
pub mod services;
