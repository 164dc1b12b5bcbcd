use std::sync::Arc;

use parking_lot::RwLock;

use crate::{
    backend::{Backend, RestBackend},
    config::Config,
    error::Result,
    models::session::{AuthUser, Session},
    services::{AuthService, BookmarkService, FollowService, PostService, ProfileService},
};

/// 当前登录会话，启动时创建，登录时写入，登出时清空
#[derive(Clone, Default)]
pub struct AuthContext {
    session: Arc<RwLock<Option<Session>>>,
}

impl AuthContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_session(&self, session: Session) {
        *self.session.write() = Some(session);
    }

    pub fn clear(&self) {
        *self.session.write() = None;
    }

    pub fn session(&self) -> Option<Session> {
        self.session.read().clone()
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.session.read().as_ref().map(|s| s.user.clone())
    }

    pub fn user_id(&self) -> Option<String> {
        self.session.read().as_ref().map(|s| s.user.id.clone())
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.read().is_some()
    }
}

/// 应用程序的共享状态
/// 包含所有服务和配置的引用，由各个界面 hook 注入使用
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Config,

    /// 存储与认证后端
    pub backend: Arc<dyn Backend>,

    /// 当前会话
    pub auth: AuthContext,

    pub auth_service: AuthService,

    pub profile_service: ProfileService,

    pub post_service: PostService,

    pub bookmark_service: BookmarkService,

    pub follow_service: FollowService,
}

impl AppState {
    pub fn new(config: Config, backend: Arc<dyn Backend>) -> Self {
        let auth = AuthContext::new();

        let post_service = PostService::new(backend.clone(), &config);
        let bookmark_service = BookmarkService::new(backend.clone());
        let follow_service = FollowService::new(backend.clone());
        let profile_service = ProfileService::new(
            backend.clone(),
            &config,
            post_service.clone(),
            bookmark_service.clone(),
        );
        let auth_service = AuthService::new(backend.clone(), &config, auth.clone());

        Self {
            config,
            backend,
            auth,
            auth_service,
            profile_service,
            post_service,
            bookmark_service,
            follow_service,
        }
    }

    /// 使用远程 REST 后端创建
    pub fn from_config(config: Config) -> Result<Self> {
        let backend: Arc<dyn Backend> = Arc::new(RestBackend::new(&config)?);
        Ok(Self::new(config, backend))
    }

    /// 检查是否为生产环境
    pub fn is_production(&self) -> bool {
        self.config.is_production()
    }

    /// 检查是否为开发环境
    pub fn is_development(&self) -> bool {
        self.config.is_development()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session(user_id: &str) -> Session {
        Session {
            access_token: "token".to_string(),
            refresh_token: None,
            token_type: Some("bearer".to_string()),
            expires_in: None,
            expires_at: None,
            user: AuthUser {
                id: user_id.to_string(),
                email: Some("nia@example.com".to_string()),
                user_metadata: json!({}),
            },
        }
    }

    #[test]
    fn test_auth_context_lifecycle() {
        let auth = AuthContext::new();
        assert!(!auth.is_signed_in());
        assert_eq!(auth.user_id(), None);

        // 克隆共享同一会话
        let shared = auth.clone();
        auth.set_session(session("u1"));
        assert_eq!(shared.user_id().as_deref(), Some("u1"));
        assert_eq!(
            shared.current_user().and_then(|u| u.email),
            Some("nia@example.com".to_string())
        );

        shared.clear();
        assert!(auth.session().is_none());
    }
}
