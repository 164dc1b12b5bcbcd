use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use crate::backend::{Backend, Filter, Query};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::session::Session;

/// 后端服务返回的错误体 (PostgREST / Storage / Auth)
#[derive(Debug, Default, Deserialize)]
struct BackendErrorBody {
    #[serde(default)]
    code: Option<Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<Value>,
}

impl BackendErrorBody {
    fn describe(self, fallback: &str) -> String {
        self.message
            .or(self.msg)
            .or(self.error_description)
            .or_else(|| self.error.and_then(|e| e.as_str().map(|s| s.to_string())))
            .unwrap_or_else(|| fallback.to_string())
    }
}

pub struct RestBackend {
    config: Config,
    http_client: Client,
    access_token: RwLock<Option<String>>,
}

impl RestBackend {
    pub fn new(config: &Config) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config: config.clone(),
            http_client,
            access_token: RwLock::new(None),
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self
            .access_token
            .read()
            .clone()
            .unwrap_or_else(|| self.config.backend_anon_key.clone());

        request
            .header("apikey", &self.config.backend_anon_key)
            .header(header::AUTHORIZATION, format!("Bearer {}", bearer))
    }

    fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
        filters.iter().map(|f| f.to_param()).collect()
    }

    /// 对象路径逐段编码，保留分隔符
    fn encode_path(path: &str) -> String {
        path.split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let body: BackendErrorBody = serde_json::from_str(&text).unwrap_or_default();
        let code = body
            .code
            .as_ref()
            .map(|c| c.as_str().map(|s| s.to_string()).unwrap_or_else(|| c.to_string()));
        let message = body.describe(status.canonical_reason().unwrap_or("Request failed"));

        warn!("Backend returned {} ({:?}): {}", status, code, message);
        Err(error_for_status(status, code.as_deref(), message))
    }

    async fn rows(response: Response) -> Result<Vec<Value>> {
        let response = Self::check(response).await?;
        let value: Value = response.json().await?;
        match value {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            other => Ok(vec![other]),
        }
    }

    async fn first_row(response: Response, table: &str) -> Result<Value> {
        Self::rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::internal(&format!("Write to {} returned no row", table)))
    }
}

/// HTTP 状态码映射为错误类型
pub(crate) fn error_for_status(status: StatusCode, code: Option<&str>, message: String) -> AppError {
    match status {
        StatusCode::NOT_FOUND | StatusCode::NOT_ACCEPTABLE => AppError::NotFound(message),
        StatusCode::UNAUTHORIZED => AppError::Authentication(message),
        StatusCode::FORBIDDEN => AppError::Authorization(message),
        StatusCode::CONFLICT => AppError::Conflict(message),
        StatusCode::PAYLOAD_TOO_LARGE => AppError::FileUpload(message),
        s if s.is_client_error() => {
            if code == Some("23505") {
                AppError::Conflict(message)
            } else {
                AppError::BadRequest(message)
            }
        }
        _ => AppError::ExternalService(message),
    }
}

/// Total from a `Content-Range` header such as `0-24/3573` or `*/0`.
pub(crate) fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit('/').next().and_then(|total| total.parse().ok())
}

#[async_trait]
impl Backend for RestBackend {
    async fn select(&self, query: &Query) -> Result<Vec<Value>> {
        debug!("GET {} {:?}", query.table, query.to_params());
        let response = self
            .authorize(self.http_client.get(self.config.rest_url(&query.table)))
            .query(&query.to_params())
            .send()
            .await?;
        Self::rows(response).await
    }

    async fn count(&self, table: &str, filters: &[Filter]) -> Result<u64> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(Self::filter_params(filters));

        let response = self
            .authorize(self.http_client.head(self.config.rest_url(table)))
            .header("Prefer", "count=exact")
            .query(&params)
            .send()
            .await?;
        let response = Self::check(response).await?;

        response
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| AppError::Parse(format!("Missing count for {}", table)))
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        debug!("POST {}", table);
        let response = self
            .authorize(self.http_client.post(self.config.rest_url(table)))
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;
        Self::first_row(response, table).await
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> Result<Vec<Value>> {
        if filters.is_empty() {
            return Err(AppError::bad_request("Refusing to update without a filter"));
        }
        debug!("PATCH {} {:?}", table, filters);
        let response = self
            .authorize(self.http_client.patch(self.config.rest_url(table)))
            .header("Prefer", "return=representation")
            .query(&Self::filter_params(filters))
            .json(&patch)
            .send()
            .await?;
        Self::rows(response).await
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<Vec<Value>> {
        if filters.is_empty() {
            return Err(AppError::bad_request("Refusing to delete without a filter"));
        }
        debug!("DELETE {} {:?}", table, filters);
        let response = self
            .authorize(self.http_client.delete(self.config.rest_url(table)))
            .header("Prefer", "return=representation")
            .query(&Self::filter_params(filters))
            .send()
            .await?;
        Self::rows(response).await
    }

    async fn upsert(&self, table: &str, row: Value, on_conflict: &str) -> Result<Value> {
        debug!("UPSERT {} on {}", table, on_conflict);
        let response = self
            .authorize(self.http_client.post(self.config.rest_url(table)))
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .query(&[("on_conflict", on_conflict)])
            .json(&row)
            .send()
            .await?;
        Self::first_row(response, table).await
    }

    async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<()> {
        if bytes.len() as u64 > self.config.max_upload_size {
            return Err(AppError::FileUpload(format!(
                "File exceeds the {} byte upload limit",
                self.config.max_upload_size
            )));
        }

        let url = self
            .config
            .storage_object_url(bucket, &Self::encode_path(path));
        debug!("Uploading {} bytes to {}", bytes.len(), url);

        let response = self
            .authorize(self.http_client.post(url))
            .header(header::CONTENT_TYPE, content_type)
            .header("x-upsert", if upsert { "true" } else { "false" })
            .body(bytes)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        self.config.public_object_url(bucket, &Self::encode_path(path))
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let response = self
            .http_client
            .post(self.config.auth_url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.config.backend_anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| {
                error!("Failed to reach auth endpoint: {}", e);
                AppError::ExternalService("Failed to reach the authentication service".to_string())
            })?;

        let response = match Self::check(response).await {
            // 认证服务对错误凭据返回 400
            Err(AppError::BadRequest(msg)) => return Err(AppError::Authentication(msg)),
            other => other?,
        };

        let session: Session = response.json().await.map_err(|e| {
            error!("Failed to parse auth response: {}", e);
            AppError::Authentication("Invalid response from the authentication service".to_string())
        })?;

        self.set_access_token(Some(session.access_token.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        let has_token = self.access_token.read().is_some();
        if has_token {
            let response = self
                .authorize(self.http_client.post(self.config.auth_url("logout")))
                .send()
                .await?;
            if let Err(e) = Self::check(response).await {
                warn!("Sign-out request failed, clearing local session anyway: {}", e);
            }
        }
        self.set_access_token(None);
        Ok(())
    }

    fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write() = token;
    }
}
