use axum::{extract::State, http::HeaderMap, response::IntoResponse, routing::post, Router};
use bytes::Bytes;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{info, warn};

use crate::errors::ServiceError;
use crate::handlers::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Provider notification payload: the resource to re-query and its topic.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct PaymentNotification {
    pub resource: String,
    pub topic: String,
}

/// Provider payment notification intake
///
/// Verifies the HMAC signature when a webhook secret is configured, dedupes
/// replayed events best-effort through Redis, then runs the webhook workflow.
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    request_body = PaymentNotification,
    responses(
        (status = 200, description = "Notification applied"),
        (status = 401, description = "Invalid signature", body = crate::errors::ErrorResponse),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 404, description = "No payment for notification", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    // Verify signature if configured
    if let Some(secret) = state.config.payment_webhook_secret.clone() {
        let tolerance = state.config.payment_webhook_tolerance_secs.unwrap_or(300);
        if !verify_signature(&headers, &body, &secret, tolerance) {
            warn!("Payment webhook signature verification failed");
            return Err(ServiceError::Unauthorized(
                "invalid webhook signature".to_string(),
            ));
        }
    }

    let notification: PaymentNotification = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::BadRequest(format!("invalid json: {}", e)))?;

    // Idempotency for webhooks using the resource id (best effort)
    let key = format!("wh:{}", notification.resource);
    if let Ok(mut conn) = state.redis.get_async_connection().await {
        let fresh: Result<bool, _> = redis::cmd("SET")
            .arg(&key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(24 * 3600)
            .query_async(&mut conn)
            .await;
        if let Ok(false) = fresh {
            info!(resource = %notification.resource, "Webhook event already processed");
            return Ok((axum::http::StatusCode::OK, "ok"));
        }
    }

    state
        .services
        .payments
        .process_notification(&notification.resource, &notification.topic)
        .await?;

    Ok((axum::http::StatusCode::OK, "ok"))
}

fn verify_signature(headers: &HeaderMap, payload: &Bytes, secret: &str, tolerance_secs: u64) -> bool {
    // Generic HMAC over "{timestamp}.{body}" with x-timestamp and x-signature headers
    if let (Some(ts), Some(sig)) = (headers.get("x-timestamp"), headers.get("x-signature")) {
        if let (Ok(ts), Ok(sig)) = (ts.to_str(), sig.to_str()) {
            if let Ok(ts_i) = ts.parse::<i64>() {
                let now = chrono::Utc::now().timestamp();
                if (now - ts_i).unsigned_abs() > tolerance_secs {
                    return false;
                }
            }
            let signed = format!("{}.{}", ts, std::str::from_utf8(payload).unwrap_or(""));
            let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
                Ok(mac) => mac,
                Err(_) => return false,
            };
            mac.update(signed.as_bytes());
            let expected = hex::encode(mac.finalize().into_bytes());
            return constant_time_eq(&expected, sig);
        }
    }
    false
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

/// Webhook routes (no auth; signature-verified)
pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/webhook", post(payment_webhook))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn signed_headers(secret: &str, body: &str) -> HeaderMap {
        let ts = chrono::Utc::now().timestamp().to_string();
        let signed = format!("{}.{}", ts, body);
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(signed.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        let mut headers = HeaderMap::new();
        headers.insert("x-timestamp", HeaderValue::from_str(&ts).unwrap());
        headers.insert("x-signature", HeaderValue::from_str(&signature).unwrap());
        headers
    }

    #[test]
    fn valid_signature_is_accepted() {
        let body = r#"{"resource":"res-1","topic":"merchant_order"}"#;
        let headers = signed_headers("s3cret", body);
        assert!(verify_signature(
            &headers,
            &Bytes::from(body),
            "s3cret",
            300
        ));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let body = r#"{"resource":"res-1","topic":"merchant_order"}"#;
        let headers = signed_headers("other", body);
        assert!(!verify_signature(
            &headers,
            &Bytes::from(body),
            "s3cret",
            300
        ));
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let body = r#"{"resource":"res-1","topic":"merchant_order"}"#;
        let ts = (chrono::Utc::now().timestamp() - 3600).to_string();
        let signed = format!("{}.{}", ts, body);
        let mut mac = HmacSha256::new_from_slice(b"s3cret").unwrap();
        mac.update(signed.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        let mut headers = HeaderMap::new();
        headers.insert("x-timestamp", HeaderValue::from_str(&ts).unwrap());
        headers.insert("x-signature", HeaderValue::from_str(&signature).unwrap());

        assert!(!verify_signature(
            &headers,
            &Bytes::from(body),
            "s3cret",
            300
        ));
    }

    #[test]
    fn missing_headers_are_rejected() {
        let headers = HeaderMap::new();
        assert!(!verify_signature(
            &headers,
            &Bytes::from_static(b"{}"),
            "s3cret",
            300
        ));
    }
}
