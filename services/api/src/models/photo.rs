//! Photos, likes and comments
//!
//! Only metadata lives here; image bytes sit in object storage under `storage_key`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: i64,
    pub collection_id: i64,
    pub uploader_id: i64,
    pub storage_key: String,
    pub caption: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Photo with its like summary for the viewer
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PhotoView {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub photo: Photo,
    pub like_count: i64,
    pub liked_by_me: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPhoto {
    pub storage_key: String,
    #[serde(default)]
    pub caption: Option<String>,
}

impl NewPhoto {
    pub fn validate(&self) -> Result<(), String> {
        let key = self.storage_key.trim();
        if key.is_empty() {
            return Err("Storage key is required".to_string());
        }
        if key.len() > 512 {
            return Err("Storage key must be at most 512 characters long".to_string());
        }
        if key.starts_with('/') || key.split('/').any(|segment| segment == "..") {
            return Err("Storage key must be a relative path".to_string());
        }
        if let Some(caption) = &self.caption {
            if caption.chars().count() > 500 {
                return Err("Caption must be at most 500 characters long".to_string());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LikeState {
    pub liked: bool,
    pub like_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub photo_id: i64,
    pub author_id: i64,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewComment {
    pub body: String,
}

impl NewComment {
    pub fn validate(&self) -> Result<(), String> {
        let length = self.body.trim().chars().count();
        if length == 0 {
            return Err("Comment cannot be empty".to_string());
        }
        if length > 2000 {
            return Err("Comment must be at most 2000 characters long".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key_must_stay_relative() {
        let photo = |key: &str| NewPhoto {
            storage_key: key.to_string(),
            caption: None,
        };
        assert!(photo("2024/07/lake.jpg").validate().is_ok());
        assert!(photo("").validate().is_err());
        assert!(photo("/etc/passwd").validate().is_err());
        assert!(photo("2024/../../secret").validate().is_err());
    }

    #[test]
    fn test_comment_body() {
        assert!(NewComment { body: "lovely".into() }.validate().is_ok());
        assert!(NewComment { body: "   ".into() }.validate().is_err());
        assert!(NewComment { body: "x".repeat(2001) }.validate().is_err());
    }
}
