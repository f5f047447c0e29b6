use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::api::handlers::AppState;
use crate::metrics::registry::DISALLOWED_HOSTS_TOTAL;

/// Host header validation against the configured patterns
#[derive(Debug, Clone, Default)]
pub struct AllowedHosts {
    patterns: Vec<String>,
}

impl AllowedHosts {
    pub fn new(patterns: Vec<String>) -> Self {
        Self {
            patterns: patterns
                .into_iter()
                .map(|pattern| pattern.to_ascii_lowercase())
                .collect(),
        }
    }

    /// `host` may carry a port, which is ignored.
    pub fn is_allowed(&self, host: &str) -> bool {
        let domain = strip_port(host).to_ascii_lowercase();
        let domain = domain.trim_end_matches('.');
        if domain.is_empty() {
            return false;
        }

        self.patterns.iter().any(|pattern| {
            if pattern == "*" {
                return true;
            }
            match pattern.strip_prefix('.') {
                Some(parent) => domain == parent || domain.ends_with(pattern.as_str()),
                None => domain == pattern,
            }
        })
    }
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        // IPv6 literal, keep the brackets
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

/// Reject requests whose Host header is not allowed
pub async fn validate_host(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|a| a.to_string()))
        .unwrap_or_default();

    if state.allowed_hosts.is_allowed(&host) {
        return next.run(request).await;
    }

    warn!(host = %host, path = %request.uri().path(), "Invalid HTTP_HOST header");
    DISALLOWED_HOSTS_TOTAL.inc();
    (StatusCode::BAD_REQUEST, "Bad Request (400)").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts(patterns: &[&str]) -> AllowedHosts {
        AllowedHosts::new(patterns.iter().map(|p| p.to_string()).collect())
    }

    #[test]
    fn test_exact_match_ignores_port_and_case() {
        let allowed = hosts(&["localhost", "127.0.0.1"]);
        assert!(allowed.is_allowed("localhost"));
        assert!(allowed.is_allowed("LocalHost:8000"));
        assert!(allowed.is_allowed("127.0.0.1:5173"));
        assert!(!allowed.is_allowed("example.com"));
    }

    #[test]
    fn test_subdomain_pattern() {
        let allowed = hosts(&[".example.com"]);
        assert!(allowed.is_allowed("example.com"));
        assert!(allowed.is_allowed("api.example.com"));
        assert!(allowed.is_allowed("api.example.com."));
        assert!(!allowed.is_allowed("badexample.com"));
    }

    #[test]
    fn test_wildcard_and_empty() {
        assert!(hosts(&["*"]).is_allowed("anything.test"));
        assert!(!hosts(&[]).is_allowed("localhost"));
        assert!(!hosts(&["*"]).is_allowed(""));
    }

    #[test]
    fn test_ipv6_literal() {
        let allowed = hosts(&["[::1]"]);
        assert!(allowed.is_allowed("[::1]:8000"));
        assert!(allowed.is_allowed("[::1]"));
    }
}
