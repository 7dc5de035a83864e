use crate::constants::network;
use crate::errors::{ApiError, ApiResponse};
use crate::services::logger::Logger;
use crate::services::retry::{RetryExecutor, RetryProfiles, API_PROFILE};
use crate::services::transport::{HttpRequest, HttpResponse, HttpTransport};
use reqwest::Method;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Thin REST client: URL/auth assembly, response decoding, and retry.
#[derive(Clone)]
pub struct CoolifyClient {
    logger: Logger,
    base_url: String,
    access_token: String,
    transport: Arc<dyn HttpTransport>,
    executor: RetryExecutor,
    profiles: Arc<RetryProfiles>,
}

fn string_code(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Turns a raw HTTP response into a payload or an `ApiError`.
pub fn decode_response(response: HttpResponse) -> Result<Value, ApiError> {
    let trimmed = response.body.trim();
    let parsed: Option<Value> = if trimmed.is_empty() {
        None
    } else {
        serde_json::from_str(trimmed).ok()
    };

    if response.is_success() {
        return Ok(match parsed {
            Some(value) => value,
            None if trimmed.is_empty() => Value::Null,
            None => Value::String(response.body),
        });
    }

    let retry_after = response.retry_after();
    let status = response.status;
    let status_text = response.status_text.clone();

    let Some(data) = parsed else {
        let text = if trimmed.is_empty() {
            status_text.clone()
        } else {
            trimmed.to_string()
        };
        let data = if trimmed.is_empty() {
            Value::Null
        } else {
            Value::String(trimmed.to_string())
        };
        return Err(ApiError::new(format!("HTTP {}: {}", status, text))
            .with_code(status.to_string())
            .with_response(
                ApiResponse::new(status, status_text, data).with_retry_after(retry_after),
            ));
    };

    let message = data
        .get("message")
        .and_then(|v| v.as_str())
        .filter(|m| !m.is_empty())
        .map(|m| m.to_string())
        .unwrap_or_else(|| format!("HTTP {}: {}", status, status_text));
    let code = string_code(data.get("code"))
        .or_else(|| string_code(data.get("error")))
        .unwrap_or_else(|| status.to_string());

    Err(ApiError::new(message)
        .with_code(code)
        .with_details(data.clone())
        .with_response(ApiResponse::new(status, status_text, data).with_retry_after(retry_after)))
}

impl CoolifyClient {
    pub fn new(
        logger: Logger,
        base_url: &str,
        access_token: &str,
        transport: Arc<dyn HttpTransport>,
        profiles: Arc<RetryProfiles>,
    ) -> Result<Self, ApiError> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(ApiError::invalid_params("Coolify base URL is required"));
        }
        if access_token.trim().is_empty() {
            return Err(ApiError::invalid_params("Coolify access token is required"));
        }
        Ok(Self {
            logger: logger.child("client"),
            base_url: base_url.to_string(),
            access_token: access_token.trim().to_string(),
            transport,
            executor: RetryExecutor::new(logger),
            profiles,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_request(&self, method: &Method, path: &str, body: Option<&str>) -> HttpRequest {
        let mut headers = BTreeMap::new();
        headers.insert("Accept".to_string(), "application/json".to_string());
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert(
            "Authorization".to_string(),
            format!("Bearer {}", self.access_token),
        );
        HttpRequest {
            method: method.clone(),
            url: format!("{}{}{}", self.base_url, network::API_PREFIX, path),
            headers,
            body: body.map(|b| b.to_string()),
        }
    }

    async fn request_once(
        &self,
        method: &Method,
        path: &str,
        body: Option<&str>,
    ) -> Result<Value, ApiError> {
        self.logger.debug(
            "Making request",
            Some(&serde_json::json!({"method": method.as_str(), "path": path})),
        );
        let response = self
            .transport
            .send(self.build_request(method, path, body))
            .await;
        let result = response.and_then(decode_response);
        match &result {
            Ok(_) => self.logger.debug(
                "Request successful",
                Some(&serde_json::json!({"method": method.as_str(), "path": path})),
            ),
            Err(err) => self.logger.debug(
                "Request failed",
                Some(&serde_json::json!({
                    "method": method.as_str(),
                    "path": path,
                    "status": err.http_status(),
                    "code": err.code(),
                    "message": err.message(),
                })),
            ),
        }
        result
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        self.request_with_profile(API_PROFILE, method, path, body)
            .await
    }

    /// Issues a request under the named retry profile. Unknown categories use
    /// the `api` profile.
    pub async fn request_with_profile(
        &self,
        category: &str,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        if self.profiles.get(category).is_none() {
            self.logger.warn(
                "Unknown retry profile, using api",
                Some(&serde_json::json!({"category": category})),
            );
        }
        let profile = self.profiles.resolve(category);
        let body = body.map(|b| b.to_string());
        self.executor
            .execute_with_retry(profile, || {
                self.request_once(&method, path, body.as_deref())
            })
            .await
    }

    pub async fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn patch(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        self.request(Method::PATCH, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value, ApiError> {
        self.request(Method::DELETE, path, None).await
    }

    pub async fn validate_connection(&self) -> Result<(), ApiError> {
        match self.get("/servers").await {
            Ok(_) => Ok(()),
            Err(err) => Err(ApiError::new(format!(
                "Failed to connect to Coolify server: {}",
                err.message()
            ))
            .with_code(err.code())),
        }
    }

    /// Looks a GitHub App up by uuid, then by numeric id.
    pub async fn find_github_app(&self, id_or_uuid: &str) -> Result<Option<Value>, ApiError> {
        let apps = self.get("/security/github-apps").await?;
        let Some(apps) = apps.as_array() else {
            return Ok(None);
        };
        if let Some(app) = apps
            .iter()
            .find(|app| app.get("uuid").and_then(|v| v.as_str()) == Some(id_or_uuid))
        {
            return Ok(Some(app.clone()));
        }
        let Ok(numeric) = id_or_uuid.trim().parse::<i64>() else {
            return Ok(None);
        };
        Ok(apps
            .iter()
            .find(|app| app.get("id").and_then(|v| v.as_i64()) == Some(numeric))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            status_text: "Status".to_string(),
            headers: BTreeMap::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn decodes_success_bodies() {
        assert_eq!(decode_response(response(200, r#"{"a":1}"#)).expect("ok"), json!({"a": 1}));
        assert_eq!(decode_response(response(200, "plain")).expect("ok"), json!("plain"));
        assert_eq!(decode_response(response(204, "")).expect("ok"), Value::Null);
    }

    #[test]
    fn json_errors_keep_body_and_code() {
        let err = decode_response(response(
            422,
            r#"{"message":"Validation failed.","errors":{"name":["required"]}}"#,
        ))
        .expect_err("error");
        assert_eq!(err.message(), "Validation failed.");
        assert_eq!(err.code(), "422");
        assert_eq!(err.http_status(), Some(422));
        assert_eq!(err.validation_errors(), Some(&json!({"name": ["required"]})));
        assert!(err.details.is_some());

        let err = decode_response(response(401, r#"{"error":"Unauthenticated"}"#)).expect_err("e");
        assert_eq!(err.code(), "Unauthenticated");
        assert_eq!(err.message(), "HTTP 401: Status");
    }

    #[test]
    fn text_errors_keep_status() {
        let err = decode_response(response(502, "Bad gateway from proxy")).expect_err("error");
        assert_eq!(err.message(), "HTTP 502: Bad gateway from proxy");
        assert_eq!(err.http_status(), Some(502));
        let err = decode_response(response(500, "")).expect_err("error");
        assert_eq!(err.message(), "HTTP 500: Status");
    }
}
