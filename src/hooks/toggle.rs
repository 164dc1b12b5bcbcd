use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{
    error::{AppError, Result},
    services::{BookmarkService, FollowService},
};

/// 开关状态及其计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Toggle {
    pub active: bool,
    pub count: i64,
}

impl Toggle {
    pub fn new(active: bool, count: i64) -> Self {
        Self {
            active,
            count: count.max(0),
        }
    }

    /// Flips the flag and moves the count by exactly one, never below zero.
    pub fn flip(&mut self) {
        if self.active {
            self.active = false;
            self.count = (self.count - 1).max(0);
        } else {
            self.active = true;
            self.count += 1;
        }
    }
}

/// 点赞：仅在本次会话内有效的本地状态，不会写回远程
pub struct LikeToggle {
    state: Mutex<Toggle>,
}

impl LikeToggle {
    pub fn new(likes_count: i64) -> Self {
        Self {
            state: Mutex::new(Toggle::new(false, likes_count)),
        }
    }

    pub fn toggle(&self) -> Toggle {
        let mut state = self.state.lock();
        state.flip();
        *state
    }

    pub fn state(&self) -> Toggle {
        *self.state.lock()
    }
}

/// Clears the in-flight flag when the request finishes, whichever way.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// 关注按钮：先乐观更新，失败时回滚
pub struct FollowToggle {
    follow_service: FollowService,
    follower_id: String,
    following_id: String,
    state: Mutex<Toggle>,
    in_flight: AtomicBool,
}

impl FollowToggle {
    pub fn new(
        follow_service: FollowService,
        follower_id: &str,
        following_id: &str,
        initial: Toggle,
    ) -> Self {
        Self {
            follow_service,
            follower_id: follower_id.to_string(),
            following_id: following_id.to_string(),
            state: Mutex::new(initial),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> Toggle {
        *self.state.lock()
    }

    /// 从远程读取关注状态和粉丝数
    pub async fn load(&self) -> Result<Toggle> {
        let (following, counts) = futures::try_join!(
            self.follow_service.is_following(&self.follower_id, &self.following_id),
            self.follow_service.follow_counts(&self.following_id),
        )?;

        let mut state = self.state.lock();
        *state = Toggle::new(following, counts.followers_count);
        Ok(*state)
    }

    /// A tap while a request is pending is ignored and returns the current
    /// state.
    pub async fn toggle(&self) -> Result<Toggle> {
        if self.follower_id == self.following_id {
            return Err(AppError::validation("Cannot follow yourself"));
        }
        let Some(_guard) = InFlight::acquire(&self.in_flight) else {
            debug!("Follow request already in flight");
            return Ok(self.state());
        };

        let before = {
            let mut state = self.state.lock();
            let before = *state;
            state.flip();
            before
        };

        let result = if before.active {
            self.follow_service
                .unfollow_user(&self.follower_id, &self.following_id)
                .await
        } else {
            self.follow_service
                .follow_user(&self.follower_id, &self.following_id)
                .await
                .map(|_| ())
        };

        match result {
            // 已经关注过，视为成功
            Ok(()) | Err(AppError::Conflict(_)) => {}
            Err(e) => {
                warn!("Follow toggle failed, reverting: {}", e);
                *self.state.lock() = before;
                return Err(e);
            }
        }

        match self.follow_service.follow_counts(&self.following_id).await {
            Ok(counts) => self.state.lock().count = counts.followers_count,
            Err(e) => debug!("Keeping optimistic follower count: {}", e),
        }
        Ok(self.state())
    }
}

/// 收藏按钮，与关注按钮相同的乐观更新方式
pub struct BookmarkToggle {
    bookmark_service: BookmarkService,
    user_id: String,
    post_id: String,
    saved: Mutex<bool>,
    in_flight: AtomicBool,
}

impl BookmarkToggle {
    pub fn new(bookmark_service: BookmarkService, user_id: &str, post_id: &str, saved: bool) -> Self {
        Self {
            bookmark_service,
            user_id: user_id.to_string(),
            post_id: post_id.to_string(),
            saved: Mutex::new(saved),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_saved(&self) -> bool {
        *self.saved.lock()
    }

    pub async fn load(&self) -> Result<bool> {
        let saved = self
            .bookmark_service
            .is_bookmarked(&self.user_id, &self.post_id)
            .await?;
        *self.saved.lock() = saved;
        Ok(saved)
    }

    pub async fn toggle(&self) -> Result<bool> {
        let Some(_guard) = InFlight::acquire(&self.in_flight) else {
            return Ok(self.is_saved());
        };

        let was_saved = {
            let mut saved = self.saved.lock();
            let was = *saved;
            *saved = !was;
            was
        };

        let result = if was_saved {
            self.bookmark_service
                .remove_bookmark(&self.user_id, &self.post_id)
                .await
        } else {
            self.bookmark_service
                .add_bookmark(&self.user_id, &self.post_id)
                .await
                .map(|_| ())
        };

        match result {
            Ok(()) | Err(AppError::Conflict(_)) => Ok(!was_saved),
            Err(e) => {
                warn!("Bookmark toggle failed, reverting: {}", e);
                *self.saved.lock() = was_saved;
                Err(e)
            }
        }
    }
}
