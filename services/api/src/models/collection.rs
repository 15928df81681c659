//! Collections ("date memories")

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    /// Day the memory is about, not when it was uploaded
    pub memory_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Collection as shown to a viewer
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionView {
    #[serde(flatten)]
    pub collection: Collection,
    pub is_owner: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCollection {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub memory_date: Option<NaiveDate>,
}

/// Partial update; absent fields are left alone and an empty description clears it
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCollection {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub memory_date: Option<NaiveDate>,
}

fn validate_title(title: &str) -> Result<(), String> {
    let length = title.trim().chars().count();
    if length == 0 {
        return Err("Title is required".to_string());
    }
    if length > 120 {
        return Err("Title must be at most 120 characters long".to_string());
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<(), String> {
    if description.chars().count() > 2000 {
        return Err("Description must be at most 2000 characters long".to_string());
    }
    Ok(())
}

impl NewCollection {
    pub fn validate(&self) -> Result<(), String> {
        validate_title(&self.title)?;
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        Ok(())
    }
}

impl UpdateCollection {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.memory_date.is_none()
    }

    /// Apply onto an existing collection.
    pub fn apply(&self, collection: &mut Collection, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            collection.title = title.trim().to_string();
        }
        if let Some(description) = &self.description {
            let description = description.trim();
            collection.description = (!description.is_empty()).then(|| description.to_string());
        }
        if let Some(date) = self.memory_date {
            collection.memory_date = Some(date);
        }
        collection.updated_at = now;
    }
}
