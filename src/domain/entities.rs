//! Records rendered by the host site.

use serde::{Deserialize, Serialize};

use super::types::PostStatus;

pub type PostId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: PostId,
    pub title: String,
    pub body_html: String,
    pub status: PostStatus,
    #[serde(default)]
    pub password: Option<String>,
}

impl PostRecord {
    /// Public posts are published and not password protected.
    pub fn is_public(&self) -> bool {
        self.status.is_published() && self.password.as_deref().is_none_or(str::is_empty)
    }

    pub fn requires_password(&self) -> bool {
        self.password.as_deref().is_some_and(|value| !value.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItemRecord {
    pub label: String,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavMenuRecord {
    pub id: u64,
    pub location: String,
    #[serde(default)]
    pub items: Vec<MenuItemRecord>,
}
