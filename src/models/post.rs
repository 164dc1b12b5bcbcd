use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::utils::serde_helpers::id_string;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(deserialize_with = "id_string::deserialize")]
    pub id: String,
    #[serde(deserialize_with = "id_string::deserialize")]
    pub user_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub likes_count: i64,
    #[serde(default)]
    pub comments_count: i64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "id_string::deserialize_option")]
    pub stylist_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// 作者资料 (嵌入关系)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profiles: Option<PostAuthor>,
    /// 发型师资料 (嵌入关系)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stylists: Option<StylistRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_media: Vec<PostMedia>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostAuthor {
    #[serde(default, deserialize_with = "id_string::deserialize_option")]
    pub id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StylistRef {
    #[serde(deserialize_with = "id_string::deserialize")]
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub business_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostMedia {
    #[serde(default, deserialize_with = "id_string::deserialize_option")]
    pub id: Option<String>,
    #[serde(deserialize_with = "id_string::deserialize")]
    pub post_id: String,
    pub media_url: String,
    #[serde(default)]
    pub order: i32,
}

impl Post {
    pub fn author_id(&self) -> &str {
        self.profiles
            .as_ref()
            .and_then(|p| p.id.as_deref())
            .unwrap_or(&self.user_id)
    }

    pub fn author_name(&self) -> &str {
        self.profiles
            .as_ref()
            .and_then(|p| p.full_name.as_deref().or(p.username.as_deref()))
            .unwrap_or("Anonymous")
    }

    pub fn author_username(&self) -> &str {
        self.profiles
            .as_ref()
            .and_then(|p| p.username.as_deref())
            .unwrap_or("user")
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.author_id() == user_id || self.user_id == user_id
    }

    /// Media sorted by `order`; the first entry is the cover image.
    pub fn ordered_media(&self) -> Vec<&PostMedia> {
        let mut media: Vec<&PostMedia> = self.post_media.iter().collect();
        media.sort_by_key(|m| m.order);
        media
    }

    pub fn cover_url(&self) -> Option<&str> {
        self.post_media
            .iter()
            .min_by_key(|m| m.order)
            .map(|m| m.media_url.as_str())
    }

    /// 将更新后的行合并到本地副本
    ///
    /// The update response carries only the `posts` columns, so embedded
    /// relations are kept unless the response includes them.
    pub fn merge(&mut self, updated: Post) {
        let Post {
            id: _,
            user_id,
            title,
            description,
            rating,
            likes_count,
            comments_count,
            category,
            stylist_id,
            created_at,
            updated_at,
            profiles,
            stylists,
            post_media,
        } = updated;

        self.user_id = user_id;
        self.title = title;
        self.description = description;
        self.rating = rating;
        self.likes_count = likes_count;
        self.comments_count = comments_count;
        self.category = category;
        self.stylist_id = stylist_id;
        if created_at.is_some() {
            self.created_at = created_at;
        }
        if updated_at.is_some() {
            self.updated_at = updated_at;
        }
        if profiles.is_some() {
            self.profiles = profiles;
        }
        if stylists.is_some() {
            self.stylists = stylists;
        }
        if !post_media.is_empty() {
            self.post_media = post_media;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct NewPost {
    #[validate(length(min = 1))]
    pub title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2000))]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 50))]
    pub category: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, max = 5.0))]
    pub rating: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stylist_id: Option<String>,

    /// 已上传媒体的地址，按顺序保存
    #[serde(skip)]
    pub media_urls: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct PostUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1))]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2000))]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 50))]
    pub category: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, max = 5.0))]
    pub rating: Option<f64>,
}

impl PostUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.rating.is_none()
    }
}
