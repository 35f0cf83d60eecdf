//! # A³E Worker Library
//!
//! Background job execution for the A³E API.
//!
//! ## Modules
//!
//! - `config`: Worker settings from the environment
//! - `queue`: Claiming jobs and recording their outcome
//! - `handlers`: One handler per job kind (`analyze_document`, `send_email`)
//! - `nurture`: Trial email scheduler
//! - `orchestrator`: Poll loop with bounded concurrency and graceful shutdown
//!
//! ## Example
//!
//! ```no_run
//! use a3e_worker::queue::backoff;
//!
//! assert_eq!(backoff(1).as_secs(), 60);
//! ```

pub mod config;
pub mod handlers;
pub mod nurture;
pub mod orchestrator;
pub mod queue;
