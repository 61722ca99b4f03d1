use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

use crate::signature::sign_request;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub zoom_api_base_url: String,
    pub zoom_webhook_secret: String,
    pub ledger_base_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            zoom_api_base_url: "http://localhost:9901/v2".to_string(),
            zoom_webhook_secret: "test-webhook-secret-token".to_string(),
            ledger_base_url: "http://localhost:9902".to_string(),
        }
    }
}

impl TestConfig {
    /// Points every outbound integration at one mock server.
    pub fn with_mock_server(uri: &str) -> Self {
        Self {
            supabase_url: uri.to_string(),
            zoom_api_base_url: format!("{}/v2", uri),
            ledger_base_url: uri.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            storage_backend: "memory".to_string(),
            zoom_account_id: "test-account".to_string(),
            zoom_client_id: "test-client".to_string(),
            zoom_client_secret: "test-client-secret".to_string(),
            zoom_api_base_url: self.zoom_api_base_url.clone(),
            zoom_oauth_url: format!("{}/oauth/token", self.zoom_api_base_url.trim_end_matches("/v2")),
            zoom_webhook_secret_token: self.zoom_webhook_secret.clone(),
            google_calendar_base_url: format!("{}/calendar/v3", self.supabase_url),
            google_calendar_access_token: "test-google-token".to_string(),
            teams_graph_base_url: format!("{}/graph/v1.0", self.supabase_url),
            teams_access_token: "test-teams-token".to_string(),
            teams_organizer_id: "organizer-1".to_string(),
            whatsapp_business_number: "15550001111".to_string(),
            ledger_base_url: self.ledger_base_url.clone(),
            ledger_api_key: "test-ledger-key".to_string(),
            webhook_max_retries: 3,
            webhook_retry_interval_seconds: 300,
            webhook_timestamp_tolerance_seconds: 300,
            webhook_pending_grace_seconds: 120,
            settle_no_shows: false,
            follow_up_delay_seconds: 300,
            reminder_lead_minutes: 60,
            server_port: 0,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

pub struct WebhookTestUtils;

impl WebhookTestUtils {
    /// Returns `(signature, timestamp)` for a body signed right now.
    pub fn sign(secret: &str, body: &[u8]) -> (String, String) {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign_request(secret, &timestamp, body).expect("test secret must be non-empty");
        (signature, timestamp)
    }

    pub fn event_body(event: &str, object: serde_json::Value) -> Vec<u8> {
        json!({
            "event": event,
            "event_ts": Utc::now().timestamp_millis(),
            "payload": {
                "account_id": "test-account",
                "object": object
            }
        })
        .to_string()
        .into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::verify_request;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert_eq!(app_config.zoom_oauth_url, "http://localhost:9901/oauth/token");
        assert!(app_config.is_configured());
        assert!(app_config.is_zoom_configured());
        assert!(!app_config.uses_supabase_storage());
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::doctor("doc@example.com");
        let user_model = user.to_user();
        assert_eq!(user_model.email, Some(user.email.clone()));
        assert!(user_model.is_specialist());
        assert!(!user_model.is_admin());
    }

    #[test]
    fn test_webhook_signing_helper_matches_verifier() {
        let body = WebhookTestUtils::event_body("meeting.started", json!({"id": 123}));
        let (signature, timestamp) = WebhookTestUtils::sign("secret", &body);
        assert!(verify_request("secret", Some(&signature), Some(&timestamp), &body, 300).is_ok());
    }
}
