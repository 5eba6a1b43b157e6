//! Mock service
//!
//! A declarative HTTP server: endpoints are matched in declaration order and
//! answered from templated responses.

mod router;
mod server;

pub use router::{MockRequest, MockResponse, MockRouter, SERVER_HEADER, STATUS_METHOD, STATUS_PATH};
pub use server::MockService;
