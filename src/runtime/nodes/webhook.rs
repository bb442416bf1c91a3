/// Webhook node: signed outbound delivery
///
/// The JSON payload (config `payload`, or the node input) is signed with
/// HMAC-SHA256 over `"<timestamp>.<body>"` so receivers can verify origin
/// and reject replays.

use super::{field, str_field, NodeOutcome};
use crate::runtime::error::NodeError;
use crate::runtime::http;
use crate::runtime::services::EngineServices;
use hmac::{Hmac, Mac};
use reqwest::Method;
use serde_json::{json, Map, Value};
use sha2::Sha256;

pub const TIMESTAMP_HEADER: &str = "X-Nodeflow-Timestamp";
pub const SIGNATURE_HEADER: &str = "X-Nodeflow-Signature";

type HmacSha256 = Hmac<Sha256>;

pub async fn execute(
    services: &EngineServices,
    config: &Map<String, Value>,
    input: Value,
) -> Result<NodeOutcome, NodeError> {
    let url = str_field(config, "url")
        .ok_or_else(|| NodeError::Validation("webhook node needs a 'url'".to_string()))?;
    let method = http::parse_method(config.get("method").and_then(Value::as_str), Method::POST)?;
    let secret = str_field(config, "secret")
        .or(services.webhook_secret.as_deref())
        .ok_or_else(|| NodeError::Validation("webhook node needs a 'secret' and no default is configured".to_string()))?;

    let payload = field(config, "payload").cloned().unwrap_or(input);
    let body = serde_json::to_string(&payload).map_err(|err| NodeError::Validation(err.to_string()))?;
    let timestamp = chrono::Utc::now().timestamp().to_string();
    let signature = sign(secret, &timestamp, &body)?;

    tracing::debug!("🪝 Webhook dispatch: {} {}", method, url);

    let mut builder = services
        .http
        .request(method, url)
        .header("Content-Type", "application/json")
        .header(TIMESTAMP_HEADER, timestamp.as_str())
        .header(SIGNATURE_HEADER, signature.as_str());
    builder = http::apply_headers(builder, config.get("headers").and_then(Value::as_object));
    builder = http::apply_timeout(builder, config);

    let reply = http::send(builder.body(body)).await?;
    tracing::info!("✅ Webhook delivered to {} (status: {})", url, reply.status);

    Ok(NodeOutcome::value(json!({ "status": reply.status, "body": reply.body })))
}

/// Signature header value: `sha256=<hex hmac of "<timestamp>.<body>">`
pub fn sign(secret: &str, timestamp: &str, body: &str) -> Result<String, NodeError> {
    let digest = hmac_hex(secret.as_bytes(), format!("{}.{}", timestamp, body).as_bytes())?;
    Ok(format!("sha256={}", digest))
}

pub fn hmac_hex(key: &[u8], message: &[u8]) -> Result<String, NodeError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|err| NodeError::Validation(format!("invalid webhook secret: {}", err)))?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hmac_known_vector() {
        assert_eq!(
            hmac_hex(b"key", b"The quick brown fox jumps over the lazy dog").unwrap(),
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn test_sign_covers_timestamp_and_body() {
        let a = sign("s", "1700000000", r#"{"a":1}"#).unwrap();
        let b = sign("s", "1700000001", r#"{"a":1}"#).unwrap();
        assert!(a.starts_with("sha256="));
        assert_eq!(a.len(), "sha256=".len() + 64);
        assert_ne!(a, b);
        assert_eq!(a, format!("sha256={}", hmac_hex(b"s", br#"1700000000.{"a":1}"#).unwrap()));
    }

    #[tokio::test]
    async fn test_missing_secret_is_validation_error() {
        let services = EngineServices::default();
        let config = json!({ "url": "http://127.0.0.1:9/hook" }).as_object().cloned().unwrap();
        let err = execute(&services, &config, json!({})).await.unwrap_err();
        assert!(matches!(err, NodeError::Validation(_)));
    }
}
