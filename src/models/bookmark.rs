use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::post::Post;
use crate::utils::serde_helpers::id_string;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    #[serde(default, deserialize_with = "id_string::deserialize_option")]
    pub id: Option<String>,
    #[serde(deserialize_with = "id_string::deserialize")]
    pub user_id: String,
    #[serde(deserialize_with = "id_string::deserialize")]
    pub post_id: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// 收藏的帖子 (嵌入关系)；帖子被删除后为 null
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posts: Option<Post>,
}

/// 提取收藏中仍然存在的帖子，保持原有顺序
pub fn bookmarked_posts(bookmarks: Vec<Bookmark>) -> Vec<Post> {
    bookmarks.into_iter().filter_map(|b| b.posts).collect()
}
