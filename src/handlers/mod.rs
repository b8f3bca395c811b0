pub mod bin_handlers;
pub mod document_handlers;
pub mod health_handlers;

use crate::outcome::DependencyWarning;
use axum::http::{HeaderMap, HeaderValue, header};

/// One `Warning: 199` header per tolerated dependency failure.
pub(crate) fn warning_headers(warnings: &[DependencyWarning]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for warning in warnings {
        let text = format!("199 docbin \"{}\"", warning.to_string().replace('"', "'"));
        if let Ok(value) = HeaderValue::from_str(&text) {
            headers.append(header::WARNING, value);
        }
    }
    headers
}
