//! Network readiness helpers

mod readiness;

pub use readiness::{await_ready, await_ready_until};

/// Turn a dependency resource into a probe URL
///
/// Resources with a scheme are used as-is; a bare `host:port` is probed over
/// plain HTTP at its root.
pub fn probe_url(resource: &str) -> String {
    let resource = resource.trim();
    if resource.contains("://") {
        resource.to_string()
    } else {
        format!("http://{}/", resource.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_url() {
        assert_eq!(probe_url("localhost:5432"), "http://localhost:5432/");
        assert_eq!(probe_url("https://api.test/health"), "https://api.test/health");
        assert_eq!(probe_url(" db:80/ "), "http://db:80/");
    }
}
