//! Test suite model and loading
//!
//! Reads YAML suite documents into the in-memory model consumed by the runner
//! and the mock router.

mod bindings;
pub mod duration;
mod loader;
mod model;

pub use bindings::Bindings;
pub use loader::{load_endpoints, load_endpoints_file, load_suite, load_suite_file};
pub use model::*;
