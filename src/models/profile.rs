use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::session::AuthUser;
use crate::utils::serde_helpers::{id_string, one_or_many, string_list};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(deserialize_with = "id_string::deserialize")]
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub followers_count: i64,
    #[serde(default)]
    pub following_count: i64,
    #[serde(default, deserialize_with = "one_or_many::deserialize", skip_serializing_if = "Vec::is_empty")]
    pub hair_profiles: Vec<HairProfile>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// 资料获取失败时，基于登录身份生成的占位资料
    pub fn fallback_for(user: &AuthUser) -> Self {
        let local_part = user.email_local_part();
        Self {
            id: user.id.clone(),
            username: Some(
                user.metadata_str("username")
                    .or_else(|| local_part.clone())
                    .unwrap_or_else(|| "user".to_string()),
            ),
            full_name: Some(
                user.metadata_str("name")
                    .or(local_part)
                    .unwrap_or_else(|| "User".to_string()),
            ),
            email: user.email.clone(),
            avatar_url: None,
            bio: None,
            location: None,
            phone: None,
            followers_count: 0,
            following_count: 0,
            hair_profiles: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Placeholder for someone else's profile that could not be loaded.
    pub fn placeholder(user_id: &str) -> Self {
        Self {
            id: user_id.to_string(),
            username: Some("user".to_string()),
            full_name: Some("User".to_string()),
            email: None,
            avatar_url: None,
            bio: None,
            location: None,
            phone: None,
            followers_count: 0,
            following_count: 0,
            hair_profiles: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }

    /// At most one hair profile exists per user.
    pub fn hair_profile(&self) -> Option<&HairProfile> {
        self.hair_profiles.first()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HairProfile {
    #[serde(default, deserialize_with = "id_string::deserialize_option")]
    pub id: Option<String>,
    #[serde(deserialize_with = "id_string::deserialize")]
    pub user_id: String,
    #[serde(default)]
    pub hair_type: Option<String>,
    #[serde(default)]
    pub porosity: Option<String>,
    #[serde(default)]
    pub density: Option<String>,
    #[serde(default)]
    pub texture: Option<String>,
    #[serde(default)]
    pub length: Option<String>,
    #[serde(default, deserialize_with = "string_list::deserialize")]
    pub goals: Vec<String>,
    #[serde(default, deserialize_with = "string_list::deserialize")]
    pub characteristics: Vec<String>,
}

impl HairProfile {
    /// 非空的属性标签 (标签名, 值)，按界面展示顺序
    pub fn traits(&self) -> Vec<(&'static str, &str)> {
        [
            ("Type", &self.hair_type),
            ("Porosity", &self.porosity),
            ("Texture", &self.texture),
            ("Length", &self.length),
            ("Density", &self.density),
        ]
        .into_iter()
        .filter_map(|(label, value)| {
            value
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .map(|v| (label, v))
        })
        .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 50))]
    pub full_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 3, max = 30))]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 160))]
    pub bio: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 100))]
    pub location: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 20))]
    pub phone: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(url)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct HairProfileUpdate {
    #[validate(length(max = 50))]
    pub hair_type: Option<String>,
    #[validate(length(max = 50))]
    pub porosity: Option<String>,
    #[validate(length(max = 50))]
    pub density: Option<String>,
    #[validate(length(max = 50))]
    pub texture: Option<String>,
    #[validate(length(max = 50))]
    pub length: Option<String>,
    pub goals: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_profile_with_embedded_hair_profile() {
        let profile: Profile = serde_json::from_value(json!({
            "id": "u1",
            "username": "laila_hunte",
            "full_name": "Laila Hunte",
            "followers_count": 12,
            "hair_profiles": [{
                "user_id": "u1",
                "hair_type": "4C",
                "goals": "[\"growth\",\"moisture\"]"
            }]
        }))
        .unwrap();

        let hair = profile.hair_profile().unwrap();
        assert_eq!(hair.hair_type.as_deref(), Some("4C"));
        assert_eq!(hair.goals, vec!["growth", "moisture"]);
        assert_eq!(profile.following_count, 0);
    }

    #[test]
    fn test_embedded_hair_profile_as_object() {
        let profile: Profile = serde_json::from_value(json!({
            "id": "u1",
            "hair_profiles": { "user_id": "u1", "porosity": "High" }
        }))
        .unwrap();
        assert_eq!(profile.hair_profiles.len(), 1);

        let profile: Profile =
            serde_json::from_value(json!({ "id": "u1", "hair_profiles": null })).unwrap();
        assert!(profile.hair_profile().is_none());
    }

    #[test]
    fn test_hair_traits_skip_blank_values() {
        let hair = HairProfile {
            id: None,
            user_id: "u1".to_string(),
            hair_type: Some("3B".to_string()),
            porosity: Some("  ".to_string()),
            density: Some("Medium".to_string()),
            texture: None,
            length: None,
            goals: vec![],
            characteristics: vec![],
        };
        assert_eq!(hair.traits(), vec![("Type", "3B"), ("Density", "Medium")]);
    }

    #[test]
    fn test_profile_update_skips_unset_fields() {
        let update = ProfileUpdate {
            bio: Some("Loc journey".to_string()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&update).unwrap(), json!({ "bio": "Loc journey" }));
    }

    #[test]
    fn test_profile_update_validation() {
        let update = ProfileUpdate {
            username: Some("ab".to_string()),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }
}
