use crate::{
    backend::{Backend, Embed, Filter, Query},
    error::{AppError, Result},
    models::bookmark::*,
    services::{logged, tables, PostService},
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct BookmarkService {
    backend: Arc<dyn Backend>,
}

impl BookmarkService {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Bookmarks newest first, each with its post embedded.
    pub async fn get_bookmarked_posts(&self, user_id: &str) -> Result<Vec<Bookmark>> {
        debug!("Getting bookmarks for user: {}", user_id);

        let result = async {
            let post_embed = PostService::post_embeds()
                .into_iter()
                .fold(Embed::one(tables::POSTS, "post_id"), |e, nested| e.embed(nested));
            let query = Query::from(tables::SAVED_POSTS)
                .embed(post_embed)
                .eq("user_id", user_id)
                .order("created_at", false);

            self.backend
                .select(&query)
                .await?
                .into_iter()
                .map(|row| serde_json::from_value(row).map_err(AppError::from))
                .collect::<Result<Vec<Bookmark>>>()
        }
        .await;
        logged("fetching saved posts", result)
    }

    pub async fn add_bookmark(&self, user_id: &str, post_id: &str) -> Result<Bookmark> {
        debug!("Creating bookmark for post: {} by user: {}", post_id, user_id);

        let result = async {
            let row = self
                .backend
                .insert(
                    tables::SAVED_POSTS,
                    json!({ "user_id": user_id, "post_id": post_id }),
                )
                .await?;
            Ok::<Bookmark, AppError>(serde_json::from_value(row)?)
        }
        .await;
        let bookmark = logged("creating bookmark", result)?;
        info!("User {} bookmarked post {}", user_id, post_id);
        Ok(bookmark)
    }

    pub async fn remove_bookmark(&self, user_id: &str, post_id: &str) -> Result<()> {
        debug!("Deleting bookmark for post: {} by user: {}", post_id, user_id);

        let filters = [Filter::eq("user_id", user_id), Filter::eq("post_id", post_id)];
        let result = self.backend.delete(tables::SAVED_POSTS, &filters).await.map(|_| ());
        logged("deleting bookmark", result)
    }

    pub async fn is_bookmarked(&self, user_id: &str, post_id: &str) -> Result<bool> {
        let filters = [Filter::eq("user_id", user_id), Filter::eq("post_id", post_id)];
        let count = logged(
            "checking bookmark",
            self.backend.count(tables::SAVED_POSTS, &filters).await,
        )?;
        Ok(count > 0)
    }
}
