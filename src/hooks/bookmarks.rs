use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{
    error::Result,
    hooks::LoadState,
    models::{bookmark::bookmarked_posts, post::Post, ErrorInfo, MutationOutcome},
    services::BookmarkService,
    utils::format::{category_label, ALL_CATEGORIES},
};

/// "all" 加上帖子中出现过的非空分类，按首次出现顺序
pub fn category_universe(posts: &[Post]) -> Vec<String> {
    let mut categories = vec![ALL_CATEGORIES.to_string()];
    for category in posts.iter().filter_map(|p| p.category.as_deref()) {
        if !category.is_empty() && !categories.iter().any(|c| c == category) {
            categories.push(category.to_string());
        }
    }
    categories
}

/// Order-preserving subsequence of posts in the selected category.
pub fn filter_by_category<'a>(posts: &'a [Post], selector: &str) -> Vec<&'a Post> {
    posts
        .iter()
        .filter(|p| selector == ALL_CATEGORIES || p.category.as_deref() == Some(selector))
        .collect()
}

struct Inner {
    posts: Vec<Post>,
    state: LoadState,
    error: Option<ErrorInfo>,
    selected: String,
    generation: u64,
    mounted: bool,
}

/// 收藏的造型及分类筛选
pub struct SavedLooks {
    bookmark_service: BookmarkService,
    user_id: String,
    inner: Mutex<Inner>,
}

impl SavedLooks {
    pub fn new(bookmark_service: BookmarkService, user_id: &str) -> Self {
        Self {
            bookmark_service,
            user_id: user_id.to_string(),
            inner: Mutex::new(Inner {
                posts: Vec::new(),
                state: LoadState::Loading,
                error: None,
                selected: ALL_CATEGORIES.to_string(),
                generation: 0,
                mounted: true,
            }),
        }
    }

    /// 拉取收藏列表；界面卸载后不再发送请求
    pub async fn load(&self) -> LoadState {
        let Some(generation) = self.begin_fetch() else {
            debug!("Saved looks unmounted, load skipped");
            return self.state();
        };
        let result = self.bookmark_service.get_bookmarked_posts(&self.user_id).await;
        self.apply_fetch(generation, result.map(bookmarked_posts))
    }

    /// Late responses from loads started before this call are dropped.
    pub fn unmount(&self) {
        let mut inner = self.inner.lock();
        inner.mounted = false;
        inner.generation += 1;
    }

    fn begin_fetch(&self) -> Option<u64> {
        let mut inner = self.inner.lock();
        if !inner.mounted {
            return None;
        }
        inner.generation += 1;
        inner.state = LoadState::Loading;
        Some(inner.generation)
    }

    fn apply_fetch(&self, generation: u64, result: Result<Vec<Post>>) -> LoadState {
        let mut inner = self.inner.lock();
        if !inner.mounted || inner.generation != generation {
            debug!("Discarding stale saved looks fetch (generation {})", generation);
            return inner.state;
        }

        match result {
            Ok(posts) => {
                inner.posts = posts;
                inner.error = None;
                inner.state = LoadState::Ready;

                // 选中的分类已不存在时回到 "all"
                if !category_universe(&inner.posts).contains(&inner.selected) {
                    inner.selected = ALL_CATEGORIES.to_string();
                }
                debug!("Loaded {} saved looks", inner.posts.len());
            }
            Err(e) => {
                warn!("Saved looks fetch failed, keeping {} cached", inner.posts.len());
                inner.error = Some(e.info());
                inner.state = LoadState::Errored;
            }
        }
        inner.state
    }

    pub async fn refresh(&self) -> LoadState {
        self.load().await
    }

    pub fn state(&self) -> LoadState {
        self.inner.lock().state
    }

    pub fn error(&self) -> Option<ErrorInfo> {
        self.inner.lock().error.clone()
    }

    pub fn posts(&self) -> Vec<Post> {
        self.inner.lock().posts.clone()
    }

    pub fn categories(&self) -> Vec<String> {
        category_universe(&self.inner.lock().posts)
    }

    /// 分类及其显示标签
    pub fn category_tabs(&self) -> Vec<(String, String)> {
        self.categories()
            .into_iter()
            .map(|c| {
                let label = category_label(&c);
                (c, label)
            })
            .collect()
    }

    pub fn selected_category(&self) -> String {
        self.inner.lock().selected.clone()
    }

    pub fn select_category(&self, category: &str) {
        self.inner.lock().selected = category.to_string();
    }

    pub fn visible(&self) -> Vec<Post> {
        let inner = self.inner.lock();
        filter_by_category(&inner.posts, &inner.selected)
            .into_iter()
            .cloned()
            .collect()
    }

    /// 取消收藏，成功后从本地列表移除
    pub async fn unsave(&self, post_id: &str) -> MutationOutcome<()> {
        match self.bookmark_service.remove_bookmark(&self.user_id, post_id).await {
            Ok(()) => {
                self.inner.lock().posts.retain(|p| p.id != post_id);
                MutationOutcome::success(())
            }
            Err(e) => MutationOutcome::failure(e.info()),
        }
    }
}
