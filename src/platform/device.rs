use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Permission {
    Camera,
    MediaLibrary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhotoSource {
    Camera,
    Library,
}

impl PhotoSource {
    fn permission(self) -> Permission {
        match self {
            PhotoSource::Camera => Permission::Camera,
            PhotoSource::Library => Permission::MediaLibrary,
        }
    }

    fn denied_message(self) -> &'static str {
        match self {
            PhotoSource::Camera => "Please allow camera access to take a photo.",
            PhotoSource::Library => "Please allow access to your photo library.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickerOptions {
    pub allows_editing: bool,
    /// 裁剪比例 (宽, 高)
    pub aspect: (u32, u32),
    pub quality: f32,
}

impl PickerOptions {
    /// 头像：可编辑，1:1 裁剪，质量 0.8
    pub fn avatar() -> Self {
        Self {
            allows_editing: true,
            aspect: (1, 1),
            quality: 0.8,
        }
    }
}

impl Default for PickerOptions {
    fn default() -> Self {
        Self::avatar()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerOutcome {
    /// 本地文件引用
    Picked { uri: String },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareContent {
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareOutcome {
    Shared,
    Dismissed,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Device: Send + Sync {
    async fn request_permission(&self, permission: Permission) -> PermissionStatus;
    async fn launch_picker(&self, source: PhotoSource, options: PickerOptions) -> Result<PickerOutcome>;
    async fn share(&self, content: ShareContent) -> Result<ShareOutcome>;
}

/// 请求权限后选择照片
///
/// A denied permission aborts with `PermissionDenied` carrying the alert
/// text; a cancelled picker yields `Ok(None)`.
pub async fn pick_photo(device: &dyn Device, source: PhotoSource) -> Result<Option<String>> {
    let status = device.request_permission(source.permission()).await;
    if status != PermissionStatus::Granted {
        info!("{:?} permission denied", source.permission());
        return Err(AppError::permission_denied(
            "Permission needed",
            source.denied_message(),
        ));
    }

    match device.launch_picker(source, PickerOptions::avatar()).await? {
        PickerOutcome::Picked { uri } => {
            debug!("Picked photo: {}", uri);
            Ok(Some(uri))
        }
        PickerOutcome::Cancelled => Ok(None),
    }
}

pub fn post_share_message(title: &str, username: &str) -> String {
    format!("Check out this style: {}\n\nBy @{} on CRWN", title, username)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    #[tokio::test]
    async fn test_pick_photo_denied_camera() {
        let mut device = MockDevice::new();
        device
            .expect_request_permission()
            .with(eq(Permission::Camera))
            .returning(|_| PermissionStatus::Denied);
        device.expect_launch_picker().never();

        let err = pick_photo(&device, PhotoSource::Camera).await.unwrap_err();
        assert_eq!(
            err.alert(),
            (
                "Permission needed".to_string(),
                "Please allow camera access to take a photo.".to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_pick_photo_denied_library() {
        let mut device = MockDevice::new();
        device
            .expect_request_permission()
            .with(eq(Permission::MediaLibrary))
            .returning(|_| PermissionStatus::Denied);

        let err = pick_photo(&device, PhotoSource::Library).await.unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied { .. }));
        assert_eq!(err.alert().1, "Please allow access to your photo library.");
    }

    #[tokio::test]
    async fn test_pick_photo_picked_and_cancelled() {
        let mut device = MockDevice::new();
        device
            .expect_request_permission()
            .returning(|_| PermissionStatus::Granted);
        device
            .expect_launch_picker()
            .with(eq(PhotoSource::Library), eq(PickerOptions::avatar()))
            .times(1)
            .returning(|_, _| Ok(PickerOutcome::Picked { uri: "file:///tmp/a.png".to_string() }));
        device
            .expect_launch_picker()
            .with(eq(PhotoSource::Camera), eq(PickerOptions::avatar()))
            .times(1)
            .returning(|_, _| Ok(PickerOutcome::Cancelled));

        assert_eq!(
            pick_photo(&device, PhotoSource::Library).await.unwrap().as_deref(),
            Some("file:///tmp/a.png")
        );
        assert_eq!(pick_photo(&device, PhotoSource::Camera).await.unwrap(), None);
    }

    #[test]
    fn test_post_share_message() {
        assert_eq!(
            post_share_message("Twist out", "coilsbyday"),
            "Check out this style: Twist out\n\nBy @coilsbyday on CRWN"
        );
    }
}
