use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

/// Postgres SQLSTATE for a unique constraint violation.
pub const UNIQUE_VIOLATION: &str = "23505";

#[derive(Error, Debug)]
pub enum SupabaseError {
    #[error("Supabase API error ({status}): {message}")]
    Api {
        status: StatusCode,
        code: Option<String>,
        message: String,
    },

    #[error("Invalid header value for {0}")]
    InvalidHeader(&'static str),

    #[error("Supabase request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl SupabaseError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            SupabaseError::Api { status, .. } => Some(*status),
            SupabaseError::Transport(e) => e.status(),
            SupabaseError::InvalidHeader(_) => None,
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, SupabaseError::Api { code: Some(code), .. } if code == UNIQUE_VIOLATION)
    }

    /// Name of the violated constraint, as quoted in the Postgres message.
    pub fn constraint_name(&self) -> Option<&str> {
        match self {
            SupabaseError::Api { message, .. } => {
                let start = message.find('"')? + 1;
                let len = message[start..].find('"')?;
                Some(&message[start..start + len])
            }
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorBody {
    code: Option<String>,
    message: Option<String>,
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap, SupabaseError> {
        let mut headers = HeaderMap::new();

        headers.insert(
            "apikey",
            HeaderValue::from_str(&self.anon_key).map_err(|_| SupabaseError::InvalidHeader("apikey"))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|_| SupabaseError::InvalidHeader("authorization"))?,
            );
        }

        Ok(headers)
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<T, SupabaseError>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, SupabaseError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            let parsed = serde_json::from_str::<PostgrestErrorBody>(&error_text).ok();
            let (code, message) = match parsed {
                Some(body) => (body.code, body.message.unwrap_or(error_text)),
                None => (None, error_text),
            };

            return Err(SupabaseError::Api { status, code, message });
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Headers asking PostgREST to echo the affected rows back.
    pub fn return_representation() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(url: &str) -> AppConfig {
        AppConfig {
            supabase_url: url.to_string(),
            supabase_anon_key: "anon".to_string(),
            supabase_jwt_secret: "secret".to_string(),
            cabinets: shared_config::default_cabinets(),
            clinic_utc_offset_minutes: 0,
            port: 0,
        }
    }

    #[tokio::test]
    async fn sends_apikey_and_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/dentists"))
            .and(header("apikey", "anon"))
            .and(header("authorization", "Bearer user-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "d1" }])))
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&config_for(&server.uri()));
        let rows: Vec<Value> = client
            .request(Method::GET, "/rest/v1/dentists", Some("user-token"), None)
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn surfaces_unique_violation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/appointments"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "code": "23505",
                "message": "duplicate key value violates unique constraint \"appointments_dentist_slot_active_idx\""
            })))
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&config_for(&server.uri()));
        let err = client
            .request::<Vec<Value>>(Method::POST, "/rest/v1/appointments", None, Some(json!({})))
            .await
            .unwrap_err();

        assert!(err.is_unique_violation());
        assert_eq!(err.status(), Some(StatusCode::CONFLICT));
        assert_eq!(err.constraint_name(), Some("appointments_dentist_slot_active_idx"));
    }

    #[tokio::test]
    async fn non_json_error_body_is_kept_as_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&config_for(&server.uri()));
        let err = client
            .request::<Vec<Value>>(Method::GET, "/rest/v1/appointments", None, None)
            .await
            .unwrap_err();

        assert_matches!(
            err,
            SupabaseError::Api { status, code: None, ref message } if status == StatusCode::BAD_GATEWAY && message == "bad gateway"
        );
    }
}
