use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    error::Result,
    models::{post::*, ErrorInfo, MutationOutcome},
    services::PostService,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Ready,
    Errored,
}

struct Inner {
    posts: Vec<Post>,
    state: LoadState,
    error: Option<ErrorInfo>,
    /// None 表示全局信息流
    scope: Option<String>,
    generation: u64,
    mounted: bool,
}

/// 帖子集合：全局信息流或单个用户的帖子
///
/// Each fetch captures the current generation; changing the scope or
/// unmounting bumps it, so late responses are dropped instead of overwriting
/// newer state.
pub struct PostCollection {
    post_service: PostService,
    inner: Mutex<Inner>,
}

impl PostCollection {
    pub fn new(post_service: PostService, scope: Option<String>) -> Self {
        Self {
            post_service,
            inner: Mutex::new(Inner {
                posts: Vec::new(),
                state: LoadState::Loading,
                error: None,
                scope,
                generation: 0,
                mounted: false,
            }),
        }
    }

    pub fn posts(&self) -> Vec<Post> {
        self.inner.lock().posts.clone()
    }

    pub fn state(&self) -> LoadState {
        self.inner.lock().state
    }

    pub fn error(&self) -> Option<ErrorInfo> {
        self.inner.lock().error.clone()
    }

    pub fn scope(&self) -> Option<String> {
        self.inner.lock().scope.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().posts.is_empty()
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.lock().mounted
    }

    pub async fn mount(&self) -> LoadState {
        self.inner.lock().mounted = true;
        self.refresh().await
    }

    /// 重新拉取当前范围的帖子
    ///
    /// An unmounted collection sends no request and keeps its state.
    pub async fn refresh(&self) -> LoadState {
        let Some((generation, scope)) = self.begin_fetch() else {
            debug!("Refresh skipped, post collection is not mounted");
            return self.state();
        };
        let result = Self::fetch(&self.post_service, scope.as_deref()).await;
        self.apply_fetch(generation, result)
    }

    /// Runs a refresh on the runtime. Only a weak handle is kept across the
    /// fetch, so dropping the collection discards the result.
    pub fn spawn_refresh(self: &Arc<Self>) -> JoinHandle<()> {
        let fetch = self.begin_fetch();
        let post_service = self.post_service.clone();
        let weak: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            let Some((generation, scope)) = fetch else {
                return;
            };
            let result = Self::fetch(&post_service, scope.as_deref()).await;
            match weak.upgrade() {
                Some(collection) => {
                    collection.apply_fetch(generation, result);
                }
                None => debug!("Post collection dropped before fetch completed"),
            }
        })
    }

    /// 切换范围：清空列表并从 Loading 重新开始。未挂载时只记录新范围
    pub async fn set_scope(&self, scope: Option<String>) -> LoadState {
        {
            let mut inner = self.inner.lock();
            if inner.scope != scope {
                inner.scope = scope;
                inner.posts.clear();
                inner.error = None;
            }
        }
        self.refresh().await
    }

    pub fn unmount(&self) {
        let mut inner = self.inner.lock();
        inner.mounted = false;
        inner.generation += 1;
    }

    pub async fn create(&self, user_id: &str, request: NewPost) -> MutationOutcome<Post> {
        match self.post_service.create_post(user_id, request).await {
            Ok(post) => {
                let mut inner = self.inner.lock();
                let in_scope = inner.scope.as_deref().map_or(true, |s| s == post.user_id);
                if inner.mounted && in_scope {
                    inner.posts.insert(0, post.clone());
                }
                MutationOutcome::success(post)
            }
            Err(e) => MutationOutcome::failure(e.info()),
        }
    }

    /// 更新成功后把返回的字段合并到本地条目
    pub async fn patch(
        &self,
        post_id: &str,
        requester_id: &str,
        request: PostUpdate,
    ) -> MutationOutcome<Post> {
        match self.post_service.update_post(post_id, requester_id, request).await {
            Ok(updated) => {
                let mut inner = self.inner.lock();
                if !inner.mounted {
                    return MutationOutcome::success(updated);
                }
                match inner.posts.iter_mut().find(|p| p.id == post_id) {
                    Some(local) => {
                        local.merge(updated);
                        MutationOutcome::success(local.clone())
                    }
                    None => MutationOutcome::success(updated),
                }
            }
            Err(e) => MutationOutcome::failure(e.info()),
        }
    }

    pub async fn remove(&self, post_id: &str, requester_id: &str) -> MutationOutcome<()> {
        match self.post_service.delete_post(post_id, requester_id).await {
            Ok(()) => {
                let mut inner = self.inner.lock();
                if inner.mounted {
                    inner.posts.retain(|p| p.id != post_id);
                }
                info!("Removed post {} from collection", post_id);
                MutationOutcome::success(())
            }
            Err(e) => MutationOutcome::failure(e.info()),
        }
    }

    fn begin_fetch(&self) -> Option<(u64, Option<String>)> {
        let mut inner = self.inner.lock();
        if !inner.mounted {
            return None;
        }
        inner.generation += 1;
        inner.state = LoadState::Loading;
        Some((inner.generation, inner.scope.clone()))
    }

    async fn fetch(post_service: &PostService, scope: Option<&str>) -> Result<Vec<Post>> {
        match scope {
            Some(user_id) => post_service.get_posts_by_user(user_id).await,
            None => post_service.get_posts().await,
        }
    }

    fn apply_fetch(&self, generation: u64, result: Result<Vec<Post>>) -> LoadState {
        let mut inner = self.inner.lock();
        if !inner.mounted || inner.generation != generation {
            debug!("Discarding stale post fetch (generation {})", generation);
            return inner.state;
        }

        match result {
            Ok(posts) => {
                debug!("Loaded {} posts", posts.len());
                inner.posts = posts;
                inner.error = None;
                inner.state = LoadState::Ready;
            }
            Err(e) => {
                // 保留之前的数据
                warn!("Post fetch failed, keeping {} cached posts", inner.posts.len());
                inner.error = Some(e.info());
                inner.state = LoadState::Errored;
            }
        }
        inner.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{memory::Operation, Backend, MemoryBackend};
    use crate::config::Config;
    use serde_json::json;

    fn seeded() -> Arc<MemoryBackend> {
        let backend = Arc::new(MemoryBackend::with_app_schema());
        backend.seed("profiles", json!({ "id": "u1", "username": "laila" }));
        backend.seed("profiles", json!({ "id": "u2", "username": "maria" }));
        backend.seed("posts", json!({ "id": "p1", "user_id": "u1", "title": "Wash day", "created_at": "2026-10-01T00:00:00Z" }));
        backend.seed("posts", json!({ "id": "p2", "user_id": "u2", "title": "Silk press", "created_at": "2026-10-02T00:00:00Z" }));
        backend
    }

    fn collection(backend: &Arc<MemoryBackend>, scope: Option<&str>) -> PostCollection {
        let backend: Arc<dyn Backend> = backend.clone();
        PostCollection::new(PostService::new(backend, &Config::default()), scope.map(|s| s.to_string()))
    }

    #[tokio::test]
    async fn test_mount_loads_scoped_posts() {
        let backend = seeded();
        let feed = collection(&backend, None);
        assert_eq!(feed.state(), LoadState::Loading);
        assert_eq!(feed.mount().await, LoadState::Ready);
        assert_eq!(
            feed.posts().iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
            vec!["p2", "p1"]
        );

        let mine = collection(&backend, Some("u1"));
        mine.mount().await;
        assert_eq!(mine.len(), 1);
        assert_eq!(mine.posts()[0].author_username(), "laila");
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_list() {
        let backend = seeded();
        let feed = collection(&backend, None);
        feed.mount().await;

        backend.fail_next(Operation::Select, Some("posts"));
        assert_eq!(feed.refresh().await, LoadState::Errored);
        assert_eq!(feed.len(), 2);
        assert_eq!(feed.error().unwrap().code, "EXTERNAL_SERVICE_ERROR");

        assert_eq!(feed.refresh().await, LoadState::Ready);
        assert!(feed.error().is_none());
    }

    #[tokio::test]
    async fn test_create_prepends_only_in_scope() {
        let backend = seeded();
        let mine = collection(&backend, Some("u1"));
        mine.mount().await;

        let request = NewPost {
            title: "Bantu knots".to_string(),
            ..Default::default()
        };
        let outcome = mine.create("u2", request.clone()).await;
        assert!(outcome.success);
        assert_eq!(mine.len(), 1);

        let outcome = mine.create("u1", request).await;
        assert!(outcome.success);
        assert_eq!(mine.posts()[0].title.as_deref(), Some("Bantu knots"));
        assert_eq!(mine.len(), 2);
    }

    #[tokio::test]
    async fn test_unmounted_fetch_is_discarded() {
        let backend = seeded();
        let feed = Arc::new(collection(&backend, None));
        feed.mount().await;
        backend.seed("posts", json!({ "id": "p3", "user_id": "u1", "created_at": "2026-10-03T00:00:00Z" }));

        let handle = feed.spawn_refresh();
        feed.unmount();
        handle.await.unwrap();

        assert_eq!(feed.len(), 2);
        assert!(!feed.is_mounted());
    }

    #[tokio::test]
    async fn test_refresh_before_mount_sends_nothing() {
        let backend = seeded();
        let posts = collection(&backend, None);

        assert_eq!(posts.refresh().await, LoadState::Loading);
        assert_eq!(posts.set_scope(Some("u1".to_string())).await, LoadState::Loading);
        assert_eq!(backend.request_count(), 0);

        assert_eq!(posts.mount().await, LoadState::Ready);
        assert_eq!(posts.posts().iter().map(|p| p.id.as_str()).collect::<Vec<_>>(), vec!["p1"]);
    }

    #[tokio::test]
    async fn test_set_scope_clears_list() {
        let backend = seeded();
        let posts = collection(&backend, Some("u1"));
        posts.mount().await;
        assert_eq!(posts.posts()[0].id, "p1");

        backend.fail_next(Operation::Select, Some("posts"));
        assert_eq!(posts.set_scope(Some("u2".to_string())).await, LoadState::Errored);
        assert!(posts.is_empty());
        assert_eq!(posts.scope().as_deref(), Some("u2"));

        assert_eq!(posts.refresh().await, LoadState::Ready);
        assert_eq!(posts.posts()[0].id, "p2");
    }
}
