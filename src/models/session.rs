use serde::{Deserialize, Serialize};

/// 认证服务返回的用户身份
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

impl AuthUser {
    pub fn email_local_part(&self) -> Option<String> {
        self.email
            .as_deref()
            .and_then(|email| email.split('@').next())
            .filter(|part| !part.is_empty())
            .map(|part| part.to_string())
    }

    pub fn metadata_str(&self, key: &str) -> Option<String> {
        self.user_metadata
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}
