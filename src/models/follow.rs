use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::serde_helpers::id_string;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Follow {
    #[serde(default, deserialize_with = "id_string::deserialize_option")]
    pub id: Option<String>,
    #[serde(deserialize_with = "id_string::deserialize")]
    pub follower_id: String,
    #[serde(deserialize_with = "id_string::deserialize")]
    pub following_id: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Counts computed from the `follows` table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowCounts {
    #[serde(default)]
    pub followers_count: i64,
    #[serde(default)]
    pub following_count: i64,
}
