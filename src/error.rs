use serde_json::json;
use thiserror::Error;

use crate::models::response::ErrorInfo;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Permission denied: {title}")]
    PermissionDenied { title: String, message: String },

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("File upload error: {0}")]
    FileUpload(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation error: {0}")]
    ValidatorError(#[from] validator::ValidationErrors),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl AppError {
    /// 转换为可存储在界面状态中的错误信息
    pub fn info(&self) -> ErrorInfo {
        let (code, message) = match self {
            AppError::Authentication(msg) => ("AUTHENTICATION_ERROR", msg.clone()),
            AppError::Authorization(msg) => ("AUTHORIZATION_ERROR", msg.clone()),
            AppError::Validation(msg) => ("VALIDATION_ERROR", msg.clone()),
            AppError::NotFound(msg) => ("NOT_FOUND", msg.clone()),
            AppError::Conflict(msg) => ("CONFLICT", msg.clone()),
            AppError::BadRequest(msg) => ("BAD_REQUEST", msg.clone()),
            AppError::PermissionDenied { message, .. } => ("PERMISSION_DENIED", message.clone()),
            AppError::Cancelled(msg) => ("CANCELLED", msg.clone()),
            AppError::Internal(_) => ("INTERNAL_ERROR", "Internal error".to_string()),
            AppError::ExternalService(msg) => ("EXTERNAL_SERVICE_ERROR", msg.clone()),
            AppError::FileUpload(msg) => ("FILE_UPLOAD_ERROR", msg.clone()),
            AppError::Serialization(_) => ("SERIALIZATION_ERROR", "Unexpected response shape".to_string()),
            AppError::Request(e) => {
                if e.is_timeout() {
                    ("TIMEOUT", "The request timed out".to_string())
                } else {
                    ("REQUEST_ERROR", "Network request failed".to_string())
                }
            }
            AppError::Io(_) => ("IO_ERROR", "Could not read local file".to_string()),
            AppError::ValidatorError(e) => {
                let details = e
                    .field_errors()
                    .iter()
                    .map(|(field, errors)| {
                        (
                            field.to_string(),
                            errors
                                .iter()
                                .map(|e| {
                                    e.message
                                        .as_ref()
                                        .map(|m| m.to_string())
                                        .unwrap_or_else(|| e.code.to_string())
                                })
                                .collect::<Vec<_>>(),
                        )
                    })
                    .collect::<std::collections::HashMap<String, Vec<String>>>();

                return ErrorInfo::with_details(
                    "VALIDATION_ERROR",
                    "Validation failed",
                    json!(details),
                );
            }
            AppError::Parse(msg) => ("PARSE_ERROR", msg.clone()),
        };

        ErrorInfo::new(code, &message)
    }

    /// Absent-record errors are recoverable: callers render a fallback.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }

    /// 对话框标题与正文，用于界面提示
    pub fn alert(&self) -> (String, String) {
        match self {
            AppError::PermissionDenied { title, message } => (title.clone(), message.clone()),
            other => ("Error".to_string(), other.info().message),
        }
    }
}

// 便利函数，用于创建常见错误
impl AppError {
    pub fn not_found(resource: &str) -> Self {
        Self::NotFound(format!("{} not found", resource))
    }

    pub fn unauthorized(msg: &str) -> Self {
        Self::Authentication(msg.to_string())
    }

    pub fn forbidden(msg: &str) -> Self {
        Self::Authorization(msg.to_string())
    }

    pub fn bad_request(msg: &str) -> Self {
        Self::BadRequest(msg.to_string())
    }

    pub fn internal(msg: &str) -> Self {
        Self::Internal(msg.to_string())
    }

    pub fn conflict(msg: &str) -> Self {
        Self::Conflict(msg.to_string())
    }

    pub fn validation(msg: &str) -> Self {
        Self::Validation(msg.to_string())
    }

    pub fn permission_denied(title: &str, message: &str) -> Self {
        Self::PermissionDenied {
            title: title.to_string(),
            message: message.to_string(),
        }
    }
}
