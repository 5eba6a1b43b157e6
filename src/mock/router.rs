//! Mock routing table and response rendering
//!
//! The table is built once from endpoint declarations and never mutated
//! afterwards, so concurrent requests share it without locking. Routing is
//! transport-neutral: the server adapts HTTP requests to [`MockRequest`].

use std::collections::BTreeMap;

use crate::common::{Error, Result};
use crate::expr::{interpolate, RequestScope, Scope};
use crate::suite::{Bindings, Endpoint, EndpointResponse};

/// Method of the reserved liveness endpoint
pub const STATUS_METHOD: &str = "GET";
/// Path of the reserved liveness endpoint; never shadowed by declared endpoints
pub const STATUS_PATH: &str = "/_hunit/status";
/// Identifying header sent by the liveness endpoint
pub const SERVER_HEADER: (&str, &str) = ("Server", "HUnit/1");

/// An inbound request, as seen by the router
#[derive(Debug, Clone, Default)]
pub struct MockRequest {
    pub method: String,
    pub path: String,
    /// Raw query string, without the leading `?`
    pub query: String,
    pub content_type: Option<String>,
    pub body: String,
}

/// The response to send back
#[derive(Debug, Clone, PartialEq)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl MockResponse {
    fn empty(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    fn liveness() -> Self {
        Self {
            status: 200,
            headers: vec![
                (SERVER_HEADER.0.to_string(), SERVER_HEADER.1.to_string()),
                (
                    "Content-Type".to_string(),
                    "text/plain; charset=utf-8".to_string(),
                ),
            ],
            body: String::new(),
        }
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Set a header, replacing any existing header with the same name
    fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
    }
}

#[derive(Debug, Clone, PartialEq)]
enum PathSegment {
    Literal(String),
    Capture(String),
}

#[derive(Debug, Clone)]
struct PathPattern {
    segments: Vec<PathSegment>,
}

impl PathPattern {
    fn parse(path: &str) -> Result<Self> {
        let segments = split_path(path)
            .map(|segment| match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some("") => Err(Error::MalformedSuite(format!(
                    "empty capture in endpoint path '{}'",
                    path
                ))),
                Some(name) => Ok(PathSegment::Capture(name.to_string())),
                None => Ok(PathSegment::Literal(segment.to_string())),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { segments })
    }

    /// Match decoded path segments, returning the captured ones
    fn matches(&self, parts: &[String]) -> Option<Vec<(String, String)>> {
        if parts.len() != self.segments.len() {
            return None;
        }
        let mut captures = Vec::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                PathSegment::Literal(literal) if literal == part => {}
                PathSegment::Literal(_) => return None,
                PathSegment::Capture(name) => captures.push((name.clone(), part.clone())),
            }
        }
        Some(captures)
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Split a raw request path and percent-decode each segment
///
/// Decoding happens after splitting so an encoded `/` stays inside its
/// segment. Returns `None` when a segment does not decode to UTF-8.
fn decode_path(path: &str) -> Option<Vec<String>> {
    split_path(path)
        .map(|segment| urlencoding::decode(segment).ok().map(|s| s.into_owned()))
        .collect()
}

#[derive(Debug, Clone)]
struct Route {
    path: String,
    /// Upper-cased; empty allows any method
    methods: Vec<String>,
    pattern: PathPattern,
    params: Bindings,
    response: Option<EndpointResponse>,
}

impl Route {
    fn allows(&self, method: &str) -> bool {
        self.methods.is_empty() || self.methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    }

    fn accepts_params(&self, query: &BTreeMap<String, String>) -> bool {
        self.params
            .iter()
            .all(|(k, v)| query.get(k).is_some_and(|found| found == v))
    }

    fn same_key(&self, other: &Route) -> bool {
        self.pattern.segments == other.pattern.segments
            && self.methods == other.methods
            && self.params == other.params
    }
}

/// Frozen routing table for the mock service
#[derive(Debug, Clone, Default)]
pub struct MockRouter {
    routes: Vec<Route>,
}

impl MockRouter {
    /// Build the table from endpoint declarations
    ///
    /// Routes are tried in declaration order and the first match wins, so a
    /// later endpoint with the same path, methods and params is unreachable.
    pub fn new(endpoints: &[Endpoint]) -> Result<Self> {
        let mut routes: Vec<Route> = Vec::new();
        for endpoint in endpoints {
            let Some(request) = &endpoint.request else {
                tracing::debug!("Skipping endpoint without a request matcher");
                continue;
            };
            let route = Route {
                path: request.path.clone(),
                methods: request.methods.iter().map(|m| m.to_ascii_uppercase()).collect(),
                pattern: PathPattern::parse(&request.path)?,
                params: request.params.clone(),
                response: endpoint.response.clone(),
            };
            if routes.iter().any(|r| r.same_key(&route)) {
                tracing::warn!(
                    path = %route.path,
                    "Duplicate endpoint declaration; the first one declared is used"
                );
            }
            routes.push(route);
        }
        Ok(Self { routes })
    }

    /// Number of routable endpoints
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Produce the response for a request
    pub fn respond(&self, request: &MockRequest) -> MockResponse {
        if request.method == STATUS_METHOD && request.path == STATUS_PATH {
            return MockResponse::liveness();
        }

        let Some(parts) = decode_path(&request.path) else {
            tracing::debug!(path = %request.path, "Request path is not valid UTF-8 once decoded");
            return MockResponse::empty(404);
        };

        let scope = RequestScope::new().with_query(&request.query);
        let matched = self.routes.iter().find_map(|route| {
            if !route.allows(&request.method) || !route.accepts_params(&scope.params) {
                return None;
            }
            route.pattern.matches(&parts).map(|captures| (route, captures))
        });

        match matched {
            Some((route, captures)) => render(route, scope.with_vars(captures), request),
            None => MockResponse::empty(404),
        }
    }
}

fn is_form(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| {
        ct.split(';')
            .next()
            .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/x-www-form-urlencoded"))
    })
}

fn render(route: &Route, mut request_scope: RequestScope, request: &MockRequest) -> MockResponse {
    let Some(template) = &route.response else {
        return MockResponse::empty(200);
    };

    if is_form(request.content_type.as_deref()) {
        request_scope = request_scope.with_form(&request.body);
    }
    let scope = Scope::new().with_request(request_scope);

    let entity = match interpolate(&template.entity, &scope) {
        Ok(entity) => entity,
        Err(e) => {
            tracing::error!(
                method = %request.method,
                path = %request.path,
                error = %e,
                "Could not render response for {}",
                route.path
            );
            return MockResponse::empty(500);
        }
    };

    let status = if template.status == 0 { 200 } else { template.status };
    let mut response = MockResponse::empty(status);
    if !entity.is_empty() {
        response.set_header("Content-Type", "binary/octet-stream");
        response.set_header("Content-Length", &entity.len().to_string());
    }
    for (name, value) in template.headers.iter() {
        response.set_header(name, value);
    }
    response.body = entity;
    response
}
