//! # A³E API Server Library
//!
//! HTTP surface of the MapMyStandards accreditation platform: accounts and
//! sessions, evidence documents, standards mapping, compliance reports,
//! billing and usage.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration from the environment
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Rate limiting and security headers
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
