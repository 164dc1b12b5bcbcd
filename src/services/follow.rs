use crate::{
    backend::{Backend, Filter},
    error::{AppError, Result},
    models::follow::*,
    services::{logged, tables},
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct FollowService {
    backend: Arc<dyn Backend>,
}

impl FollowService {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub async fn follow_user(&self, follower_id: &str, following_id: &str) -> Result<Follow> {
        debug!("User {} following user {}", follower_id, following_id);

        // 防止自己关注自己
        if follower_id == following_id {
            return Err(AppError::validation("Cannot follow yourself"));
        }

        let result = async {
            let row = self
                .backend
                .insert(
                    tables::FOLLOWS,
                    json!({ "follower_id": follower_id, "following_id": following_id }),
                )
                .await?;
            Ok::<Follow, AppError>(serde_json::from_value(row)?)
        }
        .await;
        let follow = logged("following user", result)?;

        info!("User {} followed user {}", follower_id, following_id);
        Ok(follow)
    }

    pub async fn unfollow_user(&self, follower_id: &str, following_id: &str) -> Result<()> {
        debug!("User {} unfollowing user {}", follower_id, following_id);

        let filters = [
            Filter::eq("follower_id", follower_id),
            Filter::eq("following_id", following_id),
        ];
        let result = self.backend.delete(tables::FOLLOWS, &filters).await.map(|_| ());
        logged("unfollowing user", result)
    }

    pub async fn is_following(&self, follower_id: &str, following_id: &str) -> Result<bool> {
        let filters = [
            Filter::eq("follower_id", follower_id),
            Filter::eq("following_id", following_id),
        ];
        let count = logged(
            "checking follow",
            self.backend.count(tables::FOLLOWS, &filters).await,
        )?;
        Ok(count > 0)
    }

    /// 从关注关系表统计粉丝数与关注数
    pub async fn follow_counts(&self, user_id: &str) -> Result<FollowCounts> {
        let followers = [Filter::eq("following_id", user_id)];
        let following = [Filter::eq("follower_id", user_id)];

        let result = futures::try_join!(
            self.backend.count(tables::FOLLOWS, &followers),
            self.backend.count(tables::FOLLOWS, &following),
        );
        let (followers_count, following_count) = logged("counting follows", result)?;

        Ok(FollowCounts {
            followers_count: followers_count as i64,
            following_count: following_count as i64,
        })
    }
}
