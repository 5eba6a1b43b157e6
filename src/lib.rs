//! hunit - declarative HTTP contract testing and mock serving
//!
//! Test suites are YAML documents describing request/expected-response
//! cases. The same engine can serve YAML-declared mock endpoints, so a suite
//! can carry its own fake backend.

pub mod cli;
pub mod commands;
pub mod common;
pub mod compare;
pub mod expr;
pub mod http;
pub mod mock;
pub mod net;
pub mod runner;
pub mod suite;

// Re-export commonly used types for tests
pub use common::{Error, Result};
