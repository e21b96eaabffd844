use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use uuid::Uuid;

use shared_config::{default_cabinets, AppConfig};
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub cabinets: Vec<String>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            cabinets: default_cabinets(),
        }
    }
}

impl TestConfig {
    /// Points the config at a mock Supabase server.
    pub fn with_supabase_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            cabinets: self.cabinets.clone(),
            clinic_utc_offset_minutes: 0,
            port: 0,
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
        Self::new("test@example.com", "patient")
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

    pub fn dentist(email: &str) -> Self {
        Self::new(email, "dentist")
    }

    pub fn receptionist(email: &str) -> Self {
        Self::new(email, "receptionist")
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

        Self::sign_claims(
            &json!({
                "sub": user.id,
                "email": user.email,
                "role": user.role,
                "iat": now.timestamp(),
                "exp": exp.timestamp()
            }),
            secret,
        )
    }

    pub fn sign_claims(claims: &Value, secret: &str) -> String {
        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(claims.to_string());
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
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn dentist_response(dentist_id: &str, full_name: &str) -> Value {
        json!({
            "id": dentist_id,
            "full_name": full_name,
            "email": "dentist@clinic.test",
            "is_active": true
        })
    }

    pub fn appointment_response(
        appointment_id: &str,
        patient_id: &str,
        dentist_id: &str,
        date: &str,
        time_slot: &str,
        cabinet: &str,
        status: &str,
    ) -> Value {
        json!({
            "id": appointment_id,
            "patient_id": patient_id,
            "dentist_id": dentist_id,
            "date": date,
            "time_slot": time_slot,
            "duration_minutes": 30,
            "cabinet": cabinet,
            "appointment_type": "checkup",
            "status": status,
            "notes": null,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        })
    }

    /// PostgREST body for a violated unique index.
    pub fn unique_violation_response(index_name: &str) -> Value {
        json!({
            "code": "23505",
            "details": "Key already exists.",
            "hint": null,
            "message": format!("duplicate key value violates unique constraint \"{}\"", index_name)
        })
    }

    pub fn error_response(message: &str, code: &str) -> Value {
        json!({
            "code": code,
            "details": null,
            "hint": null,
            "message": message
        })
    }
}
