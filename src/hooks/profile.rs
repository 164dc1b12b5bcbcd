use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::{
    error::{AppError, Result},
    hooks::toggle::{FollowToggle, Toggle},
    models::{HairProfile, Profile},
    platform::{pick_photo, Device, PhotoSource, ShareContent, ShareOutcome},
    state::AppState,
};

/// 要展示的主页
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileTarget {
    /// 当前登录用户
    Own,
    Other { user_id: String, is_stylist: bool },
}

/// 主页头部：资料、头像更换、分享和关注
///
/// Serves both the own-profile and other-profile screens; the capabilities
/// available depend on `is_own_profile()`.
pub struct ProfileHeader {
    state: AppState,
    target: ProfileTarget,
    profile: Mutex<Option<Profile>>,
    follow: Mutex<Option<Arc<FollowToggle>>>,
    /// 每次加载递增；卸载后为 None
    generation: Mutex<Option<u64>>,
}

impl ProfileHeader {
    pub fn new(state: AppState, target: ProfileTarget) -> Self {
        Self {
            state,
            target,
            profile: Mutex::new(None),
            follow: Mutex::new(None),
            generation: Mutex::new(Some(0)),
        }
    }

    pub fn target(&self) -> &ProfileTarget {
        &self.target
    }

    fn target_user_id(&self) -> Option<String> {
        match &self.target {
            ProfileTarget::Own => self.state.auth.user_id(),
            ProfileTarget::Other { user_id, .. } => Some(user_id.clone()),
        }
    }

    pub fn is_own_profile(&self) -> bool {
        match &self.target {
            ProfileTarget::Own => true,
            ProfileTarget::Other { user_id, .. } => {
                self.state.auth.user_id().as_deref() == Some(user_id.as_str())
            }
        }
    }

    pub fn is_stylist(&self) -> bool {
        matches!(self.target, ProfileTarget::Other { is_stylist: true, .. })
    }

    pub fn profile(&self) -> Option<Profile> {
        self.profile.lock().clone()
    }

    /// 加载资料；失败时使用占位资料，不向界面抛出错误
    ///
    /// Returns `Cancelled` when the header was unmounted or a newer load
    /// started before this one finished; nothing is written in that case.
    pub async fn load(&self) -> Result<Profile> {
        let user_id = self
            .target_user_id()
            .ok_or_else(|| AppError::unauthorized("Not signed in"))?;
        let generation = self.begin_load()?;

        let profile = match self.state.profile_service.get_profile(&user_id).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!("Using fallback profile for {}: {}", user_id, e);
                match (&self.target, self.state.auth.current_user()) {
                    (ProfileTarget::Own, Some(user)) => Profile::fallback_for(&user),
                    _ => Profile::placeholder(&user_id),
                }
            }
        };
        self.ensure_current(generation)?;
        *self.profile.lock() = Some(profile.clone());

        if self.is_own_profile() {
            return Ok(profile);
        }
        match self.load_follow_state(&user_id, generation).await? {
            Some(followers) => {
                let mut guard = self.profile.lock();
                let loaded = guard.get_or_insert(profile);
                loaded.followers_count = followers;
                Ok(loaded.clone())
            }
            None => Ok(profile),
        }
    }

    /// Drops the results of loads still in flight and refuses new ones.
    pub fn unmount(&self) {
        *self.generation.lock() = None;
    }

    fn begin_load(&self) -> Result<u64> {
        let mut generation = self.generation.lock();
        match generation.as_mut() {
            Some(current) => {
                *current += 1;
                Ok(*current)
            }
            None => Err(AppError::Cancelled("Profile screen closed".to_string())),
        }
    }

    fn ensure_current(&self, generation: u64) -> Result<()> {
        if *self.generation.lock() == Some(generation) {
            Ok(())
        } else {
            debug!("Discarding stale profile load (generation {})", generation);
            Err(AppError::Cancelled("Superseded profile load".to_string()))
        }
    }

    /// 读取关注状态；返回远程统计的粉丝数
    async fn load_follow_state(&self, user_id: &str, generation: u64) -> Result<Option<i64>> {
        let Some(viewer_id) = self.state.auth.user_id() else {
            return Ok(None);
        };

        let toggle = Arc::new(FollowToggle::new(
            self.state.follow_service.clone(),
            &viewer_id,
            user_id,
            Toggle::default(),
        ));
        let followers = match toggle.load().await {
            Ok(state) => Some(state.count),
            Err(e) => {
                warn!("Could not load follow state for {}: {}", user_id, e);
                None
            }
        };
        self.ensure_current(generation)?;
        *self.follow.lock() = Some(toggle);
        Ok(followers)
    }

    pub fn display_name(&self) -> String {
        let profile = self.profile.lock();
        profile
            .as_ref()
            .and_then(|p| non_empty(&p.full_name))
            .or_else(|| self.email_local_part())
            .unwrap_or_else(|| "User".to_string())
    }

    pub fn display_username(&self) -> String {
        let profile = self.profile.lock();
        profile
            .as_ref()
            .and_then(|p| non_empty(&p.username))
            .or_else(|| self.email_local_part())
            .unwrap_or_else(|| "user".to_string())
    }

    fn email_local_part(&self) -> Option<String> {
        if !self.is_own_profile() {
            return None;
        }
        self.state
            .auth
            .current_user()
            .and_then(|user| user.email_local_part())
    }

    pub fn avatar_url(&self) -> Option<String> {
        self.profile.lock().as_ref().and_then(|p| non_empty(&p.avatar_url))
    }

    /// 选择新头像并上传；取消选择时返回 None
    pub async fn change_avatar(
        &self,
        device: &dyn Device,
        source: PhotoSource,
    ) -> Result<Option<String>> {
        if !self.is_own_profile() {
            return Err(AppError::forbidden("Only your own avatar can be changed"));
        }
        let user_id = self
            .target_user_id()
            .ok_or_else(|| AppError::unauthorized("Not signed in"))?;

        let Some(local_uri) = pick_photo(device, source).await? else {
            return Ok(None);
        };

        let url = self
            .state
            .profile_service
            .upload_avatar(&user_id, &local_uri)
            .await?;
        if let Some(profile) = self.profile.lock().as_mut() {
            profile.avatar_url = Some(url.clone());
        }
        info!("Avatar changed for {}", user_id);
        Ok(Some(url))
    }

    pub fn share_message(&self) -> String {
        format!(
            "Check out my CRWN profile! 👑\n\n@{}\n\nJoin CRWN - The community for natural hair care and styling.",
            self.display_username()
        )
    }

    pub async fn share(&self, device: &dyn Device) -> Result<ShareOutcome> {
        device
            .share(ShareContent {
                message: self.share_message(),
            })
            .await
    }

    pub fn follow_state(&self) -> Option<Toggle> {
        self.follow.lock().as_ref().map(|t| t.state())
    }

    pub async fn toggle_follow(&self) -> Result<Toggle> {
        let toggle = self
            .follow
            .lock()
            .clone()
            .ok_or_else(|| AppError::validation("Follow is not available for this profile"))?;
        let state = toggle.toggle().await?;

        if let Some(profile) = self.profile.lock().as_mut() {
            profile.followers_count = state.count;
        }
        Ok(state)
    }
}

/// 主页上的发质资料卡片
pub struct HairProfileCard {
    hair_profile: Option<HairProfile>,
}

impl HairProfileCard {
    /// Loading errors are swallowed; the card simply has nothing to show.
    pub async fn load(state: &AppState, user_id: &str) -> Self {
        let hair_profile = match state.profile_service.get_profile(user_id).await {
            Ok(profile) => profile.hair_profile().cloned(),
            Err(e) => {
                warn!("Hair profile unavailable for {}: {}", user_id, e);
                None
            }
        };
        Self { hair_profile }
    }

    pub fn hair_profile(&self) -> Option<&HairProfile> {
        self.hair_profile.as_ref()
    }

    pub fn traits(&self) -> Vec<(&'static str, &str)> {
        self.hair_profile.as_ref().map(|h| h.traits()).unwrap_or_default()
    }

    pub fn goals(&self) -> &[String] {
        self.hair_profile.as_ref().map(|h| h.goals.as_slice()).unwrap_or(&[])
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Backend, MemoryBackend};
    use crate::config::Config;
    use crate::models::session::{AuthUser, Session};
    use crate::platform::device::MockDevice;
    use crate::platform::{PermissionStatus, PickerOutcome};
    use serde_json::json;

    fn app(backend: &Arc<MemoryBackend>, user_id: Option<&str>) -> AppState {
        let dyn_backend: Arc<dyn Backend> = backend.clone();
        let state = AppState::new(Config::default(), dyn_backend);
        if let Some(id) = user_id {
            state.auth.set_session(Session {
                access_token: "t".to_string(),
                refresh_token: None,
                token_type: None,
                expires_in: None,
                expires_at: None,
                user: AuthUser {
                    id: id.to_string(),
                    email: Some("zuri@example.com".to_string()),
                    user_metadata: json!({}),
                },
            });
        }
        state
    }

    #[tokio::test]
    async fn test_own_profile_falls_back_to_identity() {
        let backend = Arc::new(MemoryBackend::with_app_schema());
        let header = ProfileHeader::new(app(&backend, Some("u1")), ProfileTarget::Own);

        let profile = header.load().await.unwrap();
        assert_eq!(profile.username.as_deref(), Some("zuri"));
        assert_eq!(header.display_name(), "zuri");
        assert!(header.is_own_profile());
        assert!(header.follow_state().is_none());
    }

    #[tokio::test]
    async fn test_other_profile_placeholder_and_follow() {
        let backend = Arc::new(MemoryBackend::with_app_schema());
        let header = ProfileHeader::new(
            app(&backend, Some("u1")),
            ProfileTarget::Other {
                user_id: "u2".to_string(),
                is_stylist: true,
            },
        );

        header.load().await.unwrap();
        assert_eq!(header.display_username(), "user");
        assert_eq!(header.display_name(), "User");
        assert!(header.is_stylist());
        assert_eq!(header.follow_state(), Some(Toggle::default()));

        let state = header.toggle_follow().await.unwrap();
        assert_eq!(state, Toggle { active: true, count: 1 });
        assert_eq!(header.profile().unwrap().followers_count, 1);
    }

    #[tokio::test]
    async fn test_follower_count_matches_follow_state() {
        let backend = Arc::new(MemoryBackend::with_app_schema());
        backend.seed("profiles", json!({ "id": "u2", "username": "coils", "followers_count": 40 }));
        backend.seed("follows", json!({ "follower_id": "u3", "following_id": "u2" }));
        let header = ProfileHeader::new(
            app(&backend, Some("u1")),
            ProfileTarget::Other {
                user_id: "u2".to_string(),
                is_stylist: false,
            },
        );

        let profile = header.load().await.unwrap();
        assert_eq!(profile.followers_count, 1);
        assert_eq!(header.profile().unwrap().followers_count, 1);
        assert_eq!(header.follow_state().unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_unmounted_header_ignores_load() {
        let backend = Arc::new(MemoryBackend::with_app_schema());
        backend.seed("profiles", json!({ "id": "u1", "username": "zuri" }));
        let header = ProfileHeader::new(app(&backend, Some("u1")), ProfileTarget::Own);

        let stale = header.begin_load().unwrap();
        header.load().await.unwrap();
        assert!(matches!(header.ensure_current(stale), Err(AppError::Cancelled(_))));

        header.unmount();
        let requests = backend.request_count();
        assert!(matches!(header.load().await, Err(AppError::Cancelled(_))));
        assert_eq!(backend.request_count(), requests);
        assert_eq!(header.display_username(), "zuri");
    }

    #[tokio::test]
    async fn test_share_message() {
        let backend = Arc::new(MemoryBackend::with_app_schema());
        backend.seed("profiles", json!({ "id": "u1", "username": "crownedcurls" }));
        let header = ProfileHeader::new(app(&backend, Some("u1")), ProfileTarget::Own);
        header.load().await.unwrap();

        assert_eq!(
            header.share_message(),
            "Check out my CRWN profile! 👑\n\n@crownedcurls\n\nJoin CRWN - The community for natural hair care and styling."
        );

        let mut device = MockDevice::new();
        device
            .expect_share()
            .withf(|content| content.message.contains("@crownedcurls"))
            .times(1)
            .returning(|_| Ok(ShareOutcome::Shared));
        assert_eq!(header.share(&device).await.unwrap(), ShareOutcome::Shared);
    }

    #[tokio::test]
    async fn test_change_avatar_cancelled_and_forbidden() {
        let backend = Arc::new(MemoryBackend::with_app_schema());
        let own = ProfileHeader::new(app(&backend, Some("u1")), ProfileTarget::Own);

        let mut device = MockDevice::new();
        device
            .expect_request_permission()
            .returning(|_| PermissionStatus::Granted);
        device
            .expect_launch_picker()
            .returning(|_, _| Ok(PickerOutcome::Cancelled));

        assert_eq!(own.change_avatar(&device, PhotoSource::Library).await.unwrap(), None);
        assert_eq!(backend.request_count(), 0);

        let other = ProfileHeader::new(
            app(&backend, Some("u1")),
            ProfileTarget::Other {
                user_id: "u2".to_string(),
                is_stylist: false,
            },
        );
        assert!(matches!(
            other.change_avatar(&device, PhotoSource::Camera).await,
            Err(AppError::Authorization(_))
        ));
    }

    #[tokio::test]
    async fn test_hair_profile_card() {
        let backend = Arc::new(MemoryBackend::with_app_schema());
        backend.seed("profiles", json!({ "id": "u1" }));
        backend.seed("hair_profiles", json!({ "user_id": "u1", "hair_type": "4A", "goals": ["length"] }));
        let state = app(&backend, None);

        let card = HairProfileCard::load(&state, "u1").await;
        assert_eq!(card.traits(), vec![("Type", "4A")]);
        assert_eq!(card.goals(), &["length".to_string()]);

        let missing = HairProfileCard::load(&state, "nobody").await;
        assert!(missing.hair_profile().is_none());
    }
}
