use crate::{
    backend::{Backend, Embed, Filter, Query},
    config::Config,
    error::{AppError, Result},
    models::post::*,
    services::{logged, tables},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use validator::Validate;

#[derive(Clone)]
pub struct PostService {
    backend: Arc<dyn Backend>,
    max_title_length: usize,
}

impl PostService {
    pub fn new(backend: Arc<dyn Backend>, config: &Config) -> Self {
        Self {
            backend,
            max_title_length: config.max_post_title_length,
        }
    }

    fn check_title(&self, title: Option<&str>) -> Result<()> {
        match title {
            Some(title) if title.chars().count() > self.max_title_length => {
                Err(AppError::Validation(format!(
                    "Title cannot be longer than {} characters",
                    self.max_title_length
                )))
            }
            _ => Ok(()),
        }
    }

    /// 帖子查询：作者、发型师和媒体一并嵌入，按时间倒序
    pub(crate) fn post_embeds() -> Vec<Embed> {
        vec![
            Embed::one(tables::PROFILES, "user_id").columns("id,username,avatar_url,full_name"),
            Embed::one(tables::STYLISTS, "stylist_id").columns("id,username,business_name"),
            Embed::many(tables::POST_MEDIA, "post_id"),
        ]
    }

    fn feed_query() -> Query {
        Self::post_embeds()
            .into_iter()
            .fold(Query::from(tables::POSTS), |q, e| q.embed(e))
            .order("created_at", false)
    }

    fn parse_posts(rows: Vec<Value>) -> Result<Vec<Post>> {
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(AppError::from))
            .collect()
    }

    pub async fn get_posts(&self) -> Result<Vec<Post>> {
        debug!("Fetching all posts");
        let result = async {
            let rows = self.backend.select(&Self::feed_query()).await?;
            Self::parse_posts(rows)
        }
        .await;
        logged("fetching posts", result)
    }

    pub async fn get_posts_by_user(&self, user_id: &str) -> Result<Vec<Post>> {
        debug!("Fetching posts for user: {}", user_id);
        let result = async {
            let rows = self
                .backend
                .select(&Self::feed_query().eq("user_id", user_id))
                .await?;
            Self::parse_posts(rows)
        }
        .await;
        logged("fetching user posts", result)
    }

    pub async fn get_post(&self, post_id: &str) -> Result<Post> {
        let result = async {
            let row = self
                .backend
                .select(&Self::feed_query().eq("id", post_id).limit(1))
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| AppError::not_found("Post"))?;
            Ok::<Post, AppError>(serde_json::from_value(row)?)
        }
        .await;
        logged("fetching post", result)
    }

    /// 创建帖子，然后按顺序写入媒体
    pub async fn create_post(&self, user_id: &str, request: NewPost) -> Result<Post> {
        debug!("Creating post for user: {}", user_id);
        request.validate()?;
        self.check_title(Some(&request.title))?;

        let result = async {
            let mut row = serde_json::to_value(&request)?;
            row["user_id"] = json!(user_id);

            let created = self.backend.insert(tables::POSTS, row).await?;
            let mut post: Post = serde_json::from_value(created)?;

            for (order, media_url) in request.media_urls.iter().enumerate() {
                let media_row = json!({
                    "post_id": post.id,
                    "media_url": media_url,
                    "order": order,
                });
                match self.backend.insert(tables::POST_MEDIA, media_row).await {
                    Ok(media) => post.post_media.push(serde_json::from_value(media)?),
                    Err(e) => {
                        warn!("Post {} created but media {} failed: {}", post.id, order, e);
                        return Err(e);
                    }
                }
            }

            info!("User {} created post {}", user_id, post.id);
            Ok::<Post, AppError>(post)
        }
        .await;
        logged("creating post", result)
    }

    /// Ownership is passed as a filter; enforcement belongs to the remote
    /// access rules.
    pub async fn update_post(
        &self,
        post_id: &str,
        requester_id: &str,
        request: PostUpdate,
    ) -> Result<Post> {
        debug!("Updating post: {} by user: {}", post_id, requester_id);
        request.validate()?;
        self.check_title(request.title.as_deref())?;
        if request.is_empty() {
            return Err(AppError::validation("Nothing to update"));
        }

        let result = async {
            let filters = [Filter::eq("id", post_id), Filter::eq("user_id", requester_id)];
            let row = self
                .backend
                .update(tables::POSTS, &filters, serde_json::to_value(&request)?)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| AppError::not_found("Post"))?;
            Ok::<Post, AppError>(serde_json::from_value(row)?)
        }
        .await;
        logged("updating post", result)
    }

    pub async fn delete_post(&self, post_id: &str, requester_id: &str) -> Result<()> {
        debug!("Deleting post: {} by user: {}", post_id, requester_id);

        let result = async {
            let filters = [Filter::eq("id", post_id), Filter::eq("user_id", requester_id)];
            let removed = self.backend.delete(tables::POSTS, &filters).await?;
            if removed.is_empty() {
                return Err(AppError::not_found("Post"));
            }
            info!("User {} deleted post {}", requester_id, post_id);
            Ok::<(), AppError>(())
        }
        .await;
        logged("deleting post", result)
    }
}
