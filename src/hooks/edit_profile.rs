use tracing::{info, warn};

use crate::{
    config::Config,
    error::{AppError, Result},
    models::{ErrorInfo, HairProfileUpdate, Profile, ProfileUpdate},
    services::ProfileService,
    state::AppState,
    utils::validation::{
        join_goals, normalize_username, parse_goals, validate_full_name, validate_username,
    },
};

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved(Profile),
    /// 资料已保存，但发质资料保存失败
    PartialSuccess { profile: Profile, error: ErrorInfo },
}

/// 编辑资料表单，字段与界面输入框一一对应
#[derive(Clone)]
pub struct EditProfileForm {
    profile_service: ProfileService,
    config: Config,
    user_id: String,

    pub full_name: String,
    pub username: String,
    pub bio: String,
    pub location: String,
    pub phone: String,

    pub hair_type: String,
    pub porosity: String,
    pub density: String,
    pub texture: String,
    pub length: String,
    /// 逗号分隔的目标
    pub goals_input: String,
}

impl EditProfileForm {
    pub fn empty(state: &AppState, user_id: &str) -> Self {
        Self {
            profile_service: state.profile_service.clone(),
            config: state.config.clone(),
            user_id: user_id.to_string(),
            full_name: String::new(),
            username: String::new(),
            bio: String::new(),
            location: String::new(),
            phone: String::new(),
            hair_type: String::new(),
            porosity: String::new(),
            density: String::new(),
            texture: String::new(),
            length: String::new(),
            goals_input: String::new(),
        }
    }

    /// 用已有资料填充表单，缺失的值为空字符串
    pub async fn load(state: &AppState, user_id: &str) -> Result<Self> {
        let profile = state.profile_service.get_profile(user_id).await?;
        let mut form = Self::empty(state, user_id);
        form.fill(&profile);
        Ok(form)
    }

    fn fill(&mut self, profile: &Profile) {
        let text = |value: &Option<String>| value.clone().unwrap_or_default();

        self.full_name = text(&profile.full_name);
        self.username = text(&profile.username);
        self.bio = text(&profile.bio);
        self.location = text(&profile.location);
        self.phone = text(&profile.phone);

        if let Some(hair) = profile.hair_profile() {
            self.hair_type = text(&hair.hair_type);
            self.porosity = text(&hair.porosity);
            self.density = text(&hair.density);
            self.texture = text(&hair.texture);
            self.length = text(&hair.length);
            self.goals_input = join_goals(&hair.goals);
        }
    }

    /// 保存资料，然后保存发质资料
    ///
    /// A profile failure aborts the save. A hair profile failure after the
    /// profile was saved is reported as `PartialSuccess`.
    pub async fn save(&self) -> Result<SaveOutcome> {
        let full_name = self.full_name.trim();
        let username = normalize_username(&self.username);
        if full_name.is_empty() || username.is_empty() {
            return Err(AppError::validation("Name and username are required"));
        }
        validate_full_name(full_name)?;
        validate_username(&username, self.config.max_username_length)?;

        let update = ProfileUpdate {
            full_name: Some(full_name.to_string()),
            username: Some(username),
            bio: Some(self.bio.trim().to_string()),
            location: Some(self.location.trim().to_string()),
            phone: Some(self.phone.trim().to_string()),
            avatar_url: None,
        };
        let profile = self.profile_service.update_profile(&self.user_id, update).await?;

        let hair = HairProfileUpdate {
            hair_type: optional(&self.hair_type),
            porosity: optional(&self.porosity),
            density: optional(&self.density),
            texture: optional(&self.texture),
            length: optional(&self.length),
            goals: parse_goals(&self.goals_input),
        };
        match self.profile_service.update_hair_profile(&self.user_id, hair).await {
            Ok(_) => {
                info!("Profile saved for {}", self.user_id);
                Ok(SaveOutcome::Saved(profile))
            }
            Err(e) => {
                warn!("Profile saved but hair profile failed for {}: {}", self.user_id, e);
                Ok(SaveOutcome::PartialSuccess {
                    profile,
                    error: e.info(),
                })
            }
        }
    }
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{memory::Operation, Backend, MemoryBackend};
    use serde_json::json;
    use std::sync::Arc;

    fn app(backend: &Arc<MemoryBackend>) -> AppState {
        let dyn_backend: Arc<dyn Backend> = backend.clone();
        AppState::new(Config::default(), dyn_backend)
    }

    fn seeded() -> Arc<MemoryBackend> {
        let backend = Arc::new(MemoryBackend::with_app_schema());
        backend.seed("profiles", json!({ "id": "u1", "username": "amara", "full_name": "Amara O" }));
        backend.seed(
            "hair_profiles",
            json!({ "user_id": "u1", "hair_type": "4C", "goals": "[\"growth\",\"retention\"]" }),
        );
        backend
    }

    #[tokio::test]
    async fn test_load_populates_fields() {
        let backend = seeded();
        let form = EditProfileForm::load(&app(&backend), "u1").await.unwrap();

        assert_eq!(form.full_name, "Amara O");
        assert_eq!(form.bio, "");
        assert_eq!(form.hair_type, "4C");
        assert_eq!(form.porosity, "");
        assert_eq!(form.goals_input, "growth, retention");
    }

    #[tokio::test]
    async fn test_save_requires_name_and_username() {
        let backend = seeded();
        let mut form = EditProfileForm::load(&app(&backend), "u1").await.unwrap();
        form.username = "   ".to_string();

        let err = form.save().await.unwrap_err();
        assert_eq!(err.info().message, "Name and username are required");
    }

    #[tokio::test]
    async fn test_save_rejects_bad_name_and_username() {
        let backend = seeded();
        let mut form = EditProfileForm::load(&app(&backend), "u1").await.unwrap();
        form.full_name = "A".repeat(51);
        let err = form.save().await.unwrap_err();
        assert_eq!(err.info().message, "Name cannot be longer than 50 characters");

        // 由邮箱生成的用户名必须先改成合法格式
        form.full_name = "Jane".to_string();
        form.username = "jane+test".to_string();
        assert!(matches!(form.save().await, Err(AppError::Validation(_))));
        assert_eq!(backend.rows("profiles")[0]["username"], "amara");
    }

    #[tokio::test]
    async fn test_save_normalizes_and_upserts() {
        let backend = seeded();
        let mut form = EditProfileForm::load(&app(&backend), "u1").await.unwrap();
        form.username = "  Amara_Curls ".to_string();
        form.goals_input = " moisture, , edges ".to_string();

        let outcome = form.save().await.unwrap();
        let SaveOutcome::Saved(profile) = outcome else {
            panic!("expected a full save");
        };
        assert_eq!(profile.username.as_deref(), Some("amara_curls"));

        let hair = backend.rows("hair_profiles");
        assert_eq!(hair.len(), 1);
        assert_eq!(hair[0]["goals"], json!(["moisture", "edges"]));
    }

    #[tokio::test]
    async fn test_hair_failure_is_partial_success() {
        let backend = seeded();
        let form = EditProfileForm::load(&app(&backend), "u1").await.unwrap();
        backend.fail_next(Operation::Upsert, Some("hair_profiles"));

        match form.save().await.unwrap() {
            SaveOutcome::PartialSuccess { profile, error } => {
                assert_eq!(profile.id, "u1");
                assert_eq!(error.code, "EXTERNAL_SERVICE_ERROR");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_profile_failure_aborts() {
        let backend = seeded();
        let form = EditProfileForm::load(&app(&backend), "u1").await.unwrap();
        backend.fail_next(Operation::Update, Some("profiles"));

        assert!(form.save().await.is_err());
        assert_eq!(backend.rows("hair_profiles")[0]["hair_type"], "4C");
    }
}
