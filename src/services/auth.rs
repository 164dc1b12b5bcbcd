use crate::{
    backend::Backend,
    config::Config,
    error::{AppError, Result},
    models::session::Session,
    state::AuthContext,
    utils::validation::validate_email_format,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct AuthService {
    backend: Arc<dyn Backend>,
    config: Config,
    context: AuthContext,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,        // 用户ID
    pub exp: i64,           // 过期时间
    #[serde(default)]
    pub iat: Option<i64>,   // 签发时间
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl AuthService {
    pub fn new(backend: Arc<dyn Backend>, config: &Config, context: AuthContext) -> Self {
        Self {
            backend,
            config: config.clone(),
            context,
        }
    }

    pub fn context(&self) -> &AuthContext {
        &self.context
    }

    /// 密码登录，成功后写入认证上下文
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let email = email.trim();
        validate_email_format(email)?;
        if password.is_empty() {
            return Err(AppError::validation("Password is required"));
        }

        debug!("Signing in: {}", email);
        let session = match self.backend.sign_in_with_password(email, password).await {
            Ok(session) => session,
            Err(e) => {
                warn!("Sign-in failed for {}: {}", email, e);
                return Err(e);
            }
        };

        self.backend.set_access_token(Some(session.access_token.clone()));
        self.context.set_session(session.clone());
        info!("User signed in: {}", session.user.id);
        Ok(session)
    }

    /// Local state is cleared even when the remote logout fails.
    pub async fn sign_out(&self) -> Result<()> {
        let result = self.backend.sign_out().await;
        self.backend.set_access_token(None);
        self.context.clear();

        match result {
            Ok(()) => {
                info!("User signed out");
                Ok(())
            }
            Err(e) => {
                warn!("Remote sign-out failed: {}", e);
                Err(e)
            }
        }
    }

    /// 解析访问令牌。配置了密钥时校验签名，否则只读取声明
    pub fn claims(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        let decoding_key = match &self.config.jwt_secret {
            Some(secret) => DecodingKey::from_secret(secret.as_bytes()),
            None => {
                validation.insecure_disable_signature_validation();
                DecodingKey::from_secret(&[])
            }
        };

        match decode::<Claims>(token, &decoding_key, &validation) {
            Ok(token_data) => {
                debug!("JWT token decoded for user: {}", token_data.claims.sub);
                Ok(token_data.claims)
            }
            Err(e) => {
                warn!("JWT verification failed: {}", e);
                Err(AppError::Authentication("Invalid token".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::models::session::AuthUser;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, sub: &str) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            exp: chrono::Utc::now().timestamp() + 3600,
            iat: Some(chrono::Utc::now().timestamp()),
            email: Some("amara@example.com".to_string()),
            role: Some("authenticated".to_string()),
            session_id: None,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn service(secret: Option<&str>) -> AuthService {
        let config = Config {
            jwt_secret: secret.map(|s| s.to_string()),
            ..Config::default()
        };
        AuthService::new(Arc::new(MemoryBackend::new()), &config, AuthContext::new())
    }

    #[test]
    fn test_claims_verified_with_secret() {
        let auth = service(Some("top-secret"));
        let claims = auth.claims(&token("top-secret", "u1")).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.role.as_deref(), Some("authenticated"));

        assert!(matches!(
            auth.claims(&token("other-secret", "u1")),
            Err(AppError::Authentication(_))
        ));
    }

    #[test]
    fn test_claims_without_secret_reads_payload() {
        let auth = service(None);
        let claims = auth.claims(&token("whatever", "u2")).unwrap();
        assert_eq!(claims.sub, "u2");
        assert!(auth.claims("not-a-jwt").is_err());
    }

    #[tokio::test]
    async fn test_sign_in_sets_context() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_account(
            "amara@example.com",
            "hunter22",
            AuthUser {
                id: "u1".to_string(),
                email: Some("amara@example.com".to_string()),
                user_metadata: serde_json::json!({}),
            },
        );
        let auth = AuthService::new(backend.clone(), &Config::default(), AuthContext::new());

        let session = auth.sign_in_with_password(" amara@example.com ", "hunter22").await.unwrap();
        assert_eq!(session.user.id, "u1");
        assert_eq!(auth.context().user_id().as_deref(), Some("u1"));
        assert_eq!(backend.access_token(), Some(session.access_token.clone()));

        auth.sign_out().await.unwrap();
        assert!(!auth.context().is_signed_in());
        assert_eq!(backend.access_token(), None);
    }

    #[tokio::test]
    async fn test_sign_in_rejects_bad_input() {
        let auth = service(None);
        assert!(matches!(
            auth.sign_in_with_password("not-an-email", "pw").await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            auth.sign_in_with_password("amara@example.com", "wrong").await,
            Err(AppError::Authentication(_))
        ));
        assert!(!auth.context().is_signed_in());
    }
}
