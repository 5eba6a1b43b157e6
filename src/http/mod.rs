//! HTTP client collaborator and exchange types

mod client;
mod message;

pub use client::{HttpClient, ReqwestClient};
pub use message::{HttpRequest, HttpResponse};
