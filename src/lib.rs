// ABOUTME: Library root for switchyard - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod alarms;
pub mod config;
pub mod deploy;
pub mod diagnostics;
pub mod elb;
pub mod error;
pub mod hooks;
pub mod output;
pub mod registrar;
pub mod retry;
pub mod rules;
pub mod store;
pub mod types;
