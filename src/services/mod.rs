pub mod auth;
pub mod bookmark;
pub mod follow;
pub mod post;
pub mod profile;

use tracing::{error, warn};

use crate::error::Result;

// 重新导出常用类型
pub use auth::{AuthService, Claims};
pub use bookmark::BookmarkService;
pub use follow::FollowService;
pub use post::PostService;
pub use profile::ProfileService;

/// 远程表名
pub mod tables {
    pub const PROFILES: &str = "profiles";
    pub const HAIR_PROFILES: &str = "hair_profiles";
    pub const POSTS: &str = "posts";
    pub const POST_MEDIA: &str = "post_media";
    pub const STYLISTS: &str = "stylists";
    pub const SAVED_POSTS: &str = "saved_posts";
    pub const FOLLOWS: &str = "follows";
}

/// Logs a failed gateway call; absent records are only a warning.
pub(crate) fn logged<T>(operation: &str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        if e.is_not_found() {
            warn!("Error {}: {}", operation, e);
        } else {
            error!("Error {}: {}", operation, e);
        }
    }
    result
}
