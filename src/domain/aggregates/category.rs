//! Category Aggregate

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_listed: bool,
    pub created_at: DateTime<Utc>,
}

impl Category {
    pub fn create(name: &str, description: Option<String>) -> Result<Self, CategoryError> {
        Ok(Self { id: Uuid::now_v7(), name: Self::clean_name(name)?, description, is_listed: true, created_at: Utc::now() })
    }

    pub fn rename(&mut self, name: &str, description: Option<String>) -> Result<(), CategoryError> {
        self.name = Self::clean_name(name)?;
        self.description = description;
        Ok(())
    }

    /// Key used for the case-insensitive uniqueness check.
    pub fn name_key(name: &str) -> String { name.trim().to_lowercase() }

    fn clean_name(name: &str) -> Result<String, CategoryError> {
        let name = name.trim();
        if name.is_empty() { return Err(CategoryError::MissingName); }
        Ok(name.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CategoryError {
    #[error("category name is required")]
    MissingName,
    #[error("a category named {0} already exists")]
    DuplicateName(String),
}
