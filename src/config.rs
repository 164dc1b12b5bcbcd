use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub environment: String,
    pub log_level: String,

    // Backend configuration
    pub backend_url: String,
    pub backend_anon_key: String,
    pub request_timeout_secs: u64,

    // Authentication configuration
    pub jwt_secret: Option<String>,

    // Storage configuration
    pub avatar_bucket: String,
    pub max_upload_size: u64,

    // Content settings
    pub max_bio_length: usize,
    pub max_username_length: usize,
    pub max_post_title_length: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Config {
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            backend_url: env::var("BACKEND_URL")
                .unwrap_or_else(|_| "http://localhost:54321".to_string())
                .trim_end_matches('/')
                .to_string(),
            backend_anon_key: env::var("BACKEND_ANON_KEY").unwrap_or_default(),
            request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,

            jwt_secret: env::var("JWT_SECRET").ok().filter(|s| !s.is_empty()),

            avatar_bucket: env::var("AVATAR_BUCKET").unwrap_or_else(|_| "avatars".to_string()),
            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .unwrap_or_else(|_| "10485760".to_string())
                .parse()?,

            max_bio_length: env::var("MAX_BIO_LENGTH")
                .unwrap_or_else(|_| "160".to_string())
                .parse()?,
            max_username_length: env::var("MAX_USERNAME_LENGTH")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            max_post_title_length: env::var("MAX_POST_TITLE_LENGTH")
                .unwrap_or_else(|_| "150".to_string())
                .parse()?,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.backend_url, table)
    }

    pub fn storage_object_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.backend_url, bucket, path)
    }

    pub fn public_object_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.backend_url, bucket, path)
    }

    pub fn auth_url(&self, endpoint: &str) -> String {
        format!("{}/auth/v1/{}", self.backend_url, endpoint)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            log_level: "info".to_string(),
            backend_url: "http://localhost:54321".to_string(),
            backend_anon_key: String::new(),
            request_timeout_secs: 30,
            jwt_secret: None,
            avatar_bucket: "avatars".to_string(),
            max_upload_size: 10 * 1024 * 1024,
            max_bio_length: 160,
            max_username_length: 30,
            max_post_title_length: 150,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_urls() {
        let config = Config {
            backend_url: "https://abc.example.co".to_string(),
            ..Default::default()
        };

        assert_eq!(config.rest_url("posts"), "https://abc.example.co/rest/v1/posts");
        assert_eq!(
            config.public_object_url("avatars", "u1/avatar.png"),
            "https://abc.example.co/storage/v1/object/public/avatars/u1/avatar.png"
        );
        assert_eq!(
            config.auth_url("token?grant_type=password"),
            "https://abc.example.co/auth/v1/token?grant_type=password"
        );
        assert!(config.is_development());
    }
}
