use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::metrics::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};

/// Records request count and latency for every response.
pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[&method, &path])
        .observe(duration);

    response
}

/// Collapses attempt/question ids into `{id}` so metric label
/// cardinality stays bounded.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if is_dynamic_segment(segment) {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn is_dynamic_segment(segment: &str) -> bool {
    // UUIDs (36 chars with dashes) or plain numeric ids
    let uuid_like =
        segment.len() == 36 && segment.chars().all(|c| c.is_ascii_hexdigit() || c == '-');
    let numeric = !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit());
    uuid_like || numeric
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_attempt_ids() {
        assert_eq!(
            normalize_path("/api/v1/attempts/550e8400-e29b-41d4-a716-446655440000"),
            "/api/v1/attempts/{id}"
        );
        assert_eq!(normalize_path("/api/v1/attempts/123"), "/api/v1/attempts/{id}");
        assert_eq!(normalize_path("/api/v1/pool"), "/api/v1/pool");
        assert_eq!(normalize_path("/health"), "/health");
    }

    #[test]
    fn detects_dynamic_segments() {
        assert!(is_dynamic_segment("550e8400-e29b-41d4-a716-446655440000"));
        assert!(is_dynamic_segment("42"));
        assert!(!is_dynamic_segment("pool"));
        assert!(!is_dynamic_segment(""));
    }
}
