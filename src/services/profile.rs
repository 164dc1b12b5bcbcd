use crate::{
    backend::{Backend, Embed, Filter, Query},
    config::Config,
    error::{AppError, Result},
    models::{bookmark::Bookmark, post::Post, profile::*},
    services::{logged, tables, BookmarkService, PostService},
    utils::validation::validate_bio,
};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use validator::Validate;

/// 用户资料服务，处理资料、发质资料和头像
#[derive(Clone)]
pub struct ProfileService {
    backend: Arc<dyn Backend>,
    config: Config,
    post_service: PostService,
    bookmark_service: BookmarkService,
}

impl ProfileService {
    pub fn new(
        backend: Arc<dyn Backend>,
        config: &Config,
        post_service: PostService,
        bookmark_service: BookmarkService,
    ) -> Self {
        Self {
            backend,
            config: config.clone(),
            post_service,
            bookmark_service,
        }
    }

    /// 获取用户资料（含发质资料）
    pub async fn get_profile(&self, user_id: &str) -> Result<Profile> {
        debug!("Fetching profile for user: {}", user_id);

        let result = async {
            let query = Query::from(tables::PROFILES)
                .embed(Embed::many(tables::HAIR_PROFILES, "user_id"))
                .eq("id", user_id)
                .limit(1);

            let row = self
                .backend
                .select(&query)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| AppError::not_found("Profile"))?;
            Ok::<Profile, AppError>(serde_json::from_value(row)?)
        }
        .await;
        logged("fetching profile", result)
    }

    /// 更新用户资料
    pub async fn update_profile(&self, user_id: &str, request: ProfileUpdate) -> Result<Profile> {
        debug!("Updating profile for user: {}", user_id);

        request.validate()?;
        if let Some(bio) = &request.bio {
            validate_bio(bio, self.config.max_bio_length)?;
        }

        let result = async {
            let row = self
                .backend
                .update(
                    tables::PROFILES,
                    &[Filter::eq("id", user_id)],
                    serde_json::to_value(&request)?,
                )
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| AppError::not_found("Profile"))?;
            Ok::<Profile, AppError>(serde_json::from_value(row)?)
        }
        .await;
        logged("updating profile", result)
    }

    /// 上传头像并写回资料，返回公开地址
    ///
    /// The object is stored at `{user_id}/avatar.{ext}` and overwritten on
    /// every change. If the upload succeeds but the profile patch fails the
    /// upload is kept and the URL is still returned.
    pub async fn upload_avatar(&self, user_id: &str, local_uri: &str) -> Result<String> {
        let local_path = local_uri.strip_prefix("file://").unwrap_or(local_uri);
        let ext = avatar_extension(local_path);
        let file_name = format!("{}/avatar.{}", user_id, ext);
        let content_type = format!("image/{}", if ext == "jpg" { "jpeg" } else { ext.as_str() });

        let result = async {
            let bytes = tokio::fs::read(local_path).await?;
            if bytes.is_empty() {
                return Err(AppError::FileUpload("Selected image is empty".to_string()));
            }

            self.backend
                .upload_object(&self.config.avatar_bucket, &file_name, bytes, &content_type, true)
                .await?;
            Ok::<String, AppError>(self.backend.public_url(&self.config.avatar_bucket, &file_name))
        }
        .await;
        let public_url = logged("uploading avatar", result)?;

        let patch = self
            .backend
            .update(
                tables::PROFILES,
                &[Filter::eq("id", user_id)],
                json!({ "avatar_url": public_url }),
            )
            .await;
        match patch {
            Ok(rows) if rows.is_empty() => {
                warn!("Avatar uploaded for {} but no profile row was updated", user_id)
            }
            Ok(_) => info!("Avatar updated for user {}", user_id),
            Err(e) => warn!("Avatar uploaded for {} but profile update failed: {}", user_id, e),
        }

        Ok(public_url)
    }

    /// 创建或更新发质资料（按 user_id 原子写入）
    pub async fn update_hair_profile(
        &self,
        user_id: &str,
        request: HairProfileUpdate,
    ) -> Result<HairProfile> {
        debug!("Upserting hair profile for user: {}", user_id);
        request.validate()?;

        let result = async {
            let mut row = serde_json::to_value(&request)?;
            row["user_id"] = json!(user_id);

            let saved = self
                .backend
                .upsert(tables::HAIR_PROFILES, row, "user_id")
                .await?;
            Ok::<HairProfile, AppError>(serde_json::from_value(saved)?)
        }
        .await;
        logged("updating hair profile", result)
    }

    pub async fn get_user_posts(&self, user_id: &str) -> Result<Vec<Post>> {
        self.post_service.get_posts_by_user(user_id).await
    }

    pub async fn get_saved_posts(&self, user_id: &str) -> Result<Vec<Bookmark>> {
        self.bookmark_service.get_bookmarked_posts(user_id).await
    }
}

/// 文件扩展名（小写），缺失时为 jpg
fn avatar_extension(path: &str) -> String {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_else(|| "jpg".to_string())
}
