use axum::http::StatusCode;
use once_cell::sync::Lazy;
use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};

use crate::errors::StoreError;

// Prometheus metrics (default registry)
pub static STORE_OPERATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "tfstate_store_operations_total",
        "State store operations by operation and outcome",
        &["operation", "outcome"]
    )
    .expect("register store_operations_total")
});

/// Count one store call under `operation`, labelled `ok` or with the error label.
pub fn observe<T>(operation: &str, result: &Result<T, StoreError>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) => e.label(),
    };
    STORE_OPERATIONS_TOTAL.with_label_values(&[operation, outcome]).inc();
}

pub fn encode_metrics() -> (StatusCode, String) {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("metrics encode error: {e}"),
        );
    }
    (StatusCode::OK, String::from_utf8(buffer).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observed_operations_show_up_in_encoded_output() {
        observe::<()>("purge", &Ok(()));
        observe::<()>("get", &Err(StoreError::NotFound("x".into())));
        let (status, body) = encode_metrics();
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("tfstate_store_operations_total"));
        assert!(body.contains(r#"outcome="not_found""#));
        assert!(STORE_OPERATIONS_TOTAL.with_label_values(&["purge", "ok"]).get() >= 1);
    }
}
